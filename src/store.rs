// SPDX-License-Identifier: GPL-3.0-only

//! Persisted-override collaborators.
//!
//! The resolver only ever reads overrides; creating one is gated on the
//! manufacturing-mode oracle, and leaving that mode must re-zero any cached
//! write permission so a stale grant cannot survive the transition.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use log::debug;
use uguid::Guid;

use crate::varlist::{self, VarListEntry};
use crate::{Error, Result};

/// Read path of the persisted-variable store.
pub trait OverrideStore {
    /// The persisted override for `guid` + `name`, or `NotFound`. Platforms
    /// without a variable-list backing return `Unsupported`.
    fn read(&self, guid: &Guid, name: &str) -> Result<Vec<u8>>;
}

/// Platform oracle gating the override write path.
pub trait ManufacturingOracle {
    fn is_in_manufacturing_mode(&self) -> bool;
}

/// Stand-in for platforms that provide no variable-list backing.
pub struct NoStore;

impl OverrideStore for NoStore {
    fn read(&self, _guid: &Guid, _name: &str) -> Result<Vec<u8>> {
        Err(Error::Unsupported)
    }
}

/// In-memory override store, keyed like the persisted medium: vendor GUID
/// plus variable name.
pub struct RamOverrideStore {
    entries: BTreeMap<([u8; 16], String), VarListEntry>,
    write_permitted: bool,
}

impl RamOverrideStore {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            write_permitted: false,
        }
    }

    /// Build a store from entries already read back from the persisted
    /// medium. Loading persisted content is a read, not a write, and is not
    /// gated.
    pub fn with_entries(entries: Vec<VarListEntry>) -> Self {
        let mut store = Self::new();
        for entry in entries {
            store
                .entries
                .insert((entry.guid.to_bytes(), entry.name.clone()), entry);
        }
        store
    }

    /// Build a store from a serialized variable list region.
    pub fn from_varlist(data: &[u8]) -> Result<Self> {
        Ok(Self::with_entries(varlist::deserialize(data)?))
    }

    /// Re-read the oracle and cache the write permission. Call on entry to
    /// and exit from manufacturing mode; the cached grant is zeroed the
    /// moment the oracle reports the mode ended.
    pub fn update_permission(&mut self, oracle: &dyn ManufacturingOracle) {
        let permitted = oracle.is_in_manufacturing_mode();
        if self.write_permitted && !permitted {
            debug!("manufacturing mode ended, override writes revoked");
        }
        self.write_permitted = permitted;
    }

    /// Unconditionally drop the cached write permission.
    pub fn revoke_permission(&mut self) {
        self.write_permitted = false;
    }

    /// Create or replace an override. Honored only while a manufacturing
    /// permission is cached; otherwise the platform declines the write.
    pub fn set(&mut self, entry: VarListEntry) -> Result<()> {
        if !self.write_permitted {
            return Err(Error::Unsupported);
        }
        if entry.name.is_empty() || entry.data.is_empty() {
            return Err(Error::InvalidArgument);
        }
        self.entries
            .insert((entry.guid.to_bytes(), entry.name.clone()), entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &VarListEntry> {
        self.entries.values()
    }
}

impl Default for RamOverrideStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OverrideStore for RamOverrideStore {
    fn read(&self, guid: &Guid, name: &str) -> Result<Vec<u8>> {
        self.entries
            .get(&(guid.to_bytes(), String::from(name)))
            .map(|entry| entry.data.clone())
            .ok_or(Error::NotFound)
    }
}
