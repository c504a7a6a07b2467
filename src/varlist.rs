// SPDX-License-Identifier: GPL-3.0-only

//! Named projection of resolved knobs, plus the serialized variable-list
//! region exchanged with the persisted-variable collaborator.
//!
//! Region layout, one entry after another, 4-byte aligned:
//!
//! ```text
//! name_size: u32 | data_size: u32 | guid: 16 bytes | attributes: u32
//! name (UTF-8)   | data           | NUL            | 0xFF pad to 4
//! ```
//!
//! A `name_size` of 0 or 0xFFFF_FFFF terminates the region. Entry data is
//! validated against the region bound before any access.

use alloc::string::String;
use alloc::vec::Vec;
use bitflags::bitflags;
use uguid::Guid;

use crate::knob::{self, KnobSet};
use crate::profile::Profile;
use crate::store::OverrideStore;
use crate::{Error, Result};

bitflags! {
    /// Persistence and visibility flags carried by a variable-list entry.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct VarAttributes: u32 {
        const NON_VOLATILE = 0x0000_0001;
        const BOOTSERVICE_ACCESS = 0x0000_0002;
        const RUNTIME_ACCESS = 0x0000_0004;
    }
}

/// Attributes given to entries projected from the knob registry.
pub const DEFAULT_ATTRIBUTES: VarAttributes =
    VarAttributes::NON_VOLATILE.union(VarAttributes::BOOTSERVICE_ACCESS);

/// Externally visible, named projection of a resolved knob. Created fresh
/// per call and owned by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarListEntry {
    pub name: String,
    pub guid: Guid,
    pub attributes: VarAttributes,
    pub data: Vec<u8>,
}

impl VarListEntry {
    pub fn data_size(&self) -> u32 {
        self.data.len() as u32
    }
}

// Fixed-size prefix of a serialized entry.
const ENTRY_FIXED: usize = 4 + 4 + 16 + 4;

/// Marks the end of a serialized region, as does a name size of 0.
const END_MARKER: u32 = 0xFFFF_FFFF;

/// Entry-by-entry walker over a serialized region.
struct RawEntries<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> RawEntries<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }
}

impl Iterator for RawEntries<'_> {
    type Item = Result<VarListEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset + 8 > self.data.len() {
            return None;
        }

        let name_size = read_u32(self.data, self.offset) as usize;
        let data_size = read_u32(self.data, self.offset + 4) as usize;

        // No more entries
        if name_size == 0 || name_size == END_MARKER as usize {
            return None;
        }

        let body = self.offset + ENTRY_FIXED;
        // name + data + NUL must fit in the region; the sizes are untrusted,
        // so the sum must not wrap on 32-bit targets either
        let end = body
            .checked_add(name_size)
            .and_then(|end| end.checked_add(data_size))
            .and_then(|end| end.checked_add(1));
        match end {
            Some(end) if end <= self.data.len() => {}
            _ => return Some(Err(Error::Malformed)),
        }

        let mut guid_bytes = [0u8; 16];
        guid_bytes.copy_from_slice(&self.data[self.offset + 8..self.offset + 24]);
        let attributes = VarAttributes::from_bits_retain(read_u32(self.data, self.offset + 24));

        let name = match core::str::from_utf8(&self.data[body..body + name_size]) {
            Ok(name) => String::from(name),
            Err(_) => return Some(Err(Error::Malformed)),
        };
        let data = self.data[body + name_size..body + name_size + data_size].to_vec();

        // Check for NUL byte
        if self.data[body + name_size + data_size] != 0 {
            return Some(Err(Error::Malformed));
        }

        // Align to 4 bytes
        self.offset = (body + name_size + data_size + 1 + 3) & !3;

        Some(Ok(VarListEntry {
            name,
            guid: Guid::from_bytes(guid_bytes),
            attributes,
            data,
        }))
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Parse a serialized region. A corrupted entry refuses the whole region
/// with `Malformed`; use [`is_corrupted`] and [`used_size`] to inspect a
/// suspect region without failing.
pub fn deserialize(data: &[u8]) -> Result<Vec<VarListEntry>> {
    RawEntries::new(data).collect()
}

/// Check whether a region holds a corrupted entry.
pub fn is_corrupted(data: &[u8]) -> bool {
    RawEntries::new(data).any(|entry| entry.is_err())
}

/// Size in bytes of valid entries in a region. If an entry is corrupted,
/// reports the size up to, but not including, that entry.
pub fn used_size(data: &[u8]) -> usize {
    let mut used = 0;
    for entry in RawEntries::new(data) {
        match entry {
            Ok(entry) => {
                used += (ENTRY_FIXED + entry.name.len() + entry.data.len() + 1 + 3) & !3;
            }
            Err(_) => break,
        }
    }
    used
}

/// Serialize entries into a region. Nameless or empty entries are skipped.
pub fn serialize(entries: &[VarListEntry]) -> Vec<u8> {
    let mut raw = Vec::new();

    for entry in entries {
        if entry.name.is_empty() || entry.data.is_empty() {
            continue;
        }

        raw.extend_from_slice(&(entry.name.len() as u32).to_le_bytes());
        raw.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
        raw.extend_from_slice(&entry.guid.to_bytes());
        raw.extend_from_slice(&entry.attributes.bits().to_le_bytes());
        raw.extend_from_slice(entry.name.as_bytes());
        raw.extend_from_slice(&entry.data);

        // NUL byte
        raw.push(0);

        // Align to 32 bits
        while raw.len() % 4 != 0 {
            raw.push(0xFF);
        }
    }

    raw
}

/// Projects the knobs active under the current boot's selection as resolved
/// variable-list entries.
pub struct VarListProjector<'a> {
    knobs: Option<&'a KnobSet<'a>>,
    profile: Option<&'a Profile<'a>>,
    platform_id: u32,
}

impl<'a> VarListProjector<'a> {
    /// `knobs` is `None` on platforms that compile in no knob registry;
    /// every query then answers `Unsupported`. `profile` is the outcome of
    /// this boot's selection, `None` for the generic profile.
    pub fn new(
        knobs: Option<&'a KnobSet<'a>>,
        profile: Option<&'a Profile<'a>>,
        platform_id: u32,
    ) -> Self {
        Self { knobs, profile, platform_id }
    }

    /// Materialize every active knob with its resolved value. One-shot, not
    /// a cursor.
    pub fn enumerate_active(&self, store: &dyn OverrideStore) -> Result<Vec<VarListEntry>> {
        let knobs = self.knobs.ok_or(Error::Unsupported)?;

        let mut entries = Vec::with_capacity(knobs.len());
        for knob in knobs.iter() {
            entries.push(self.project(knob, store)?);
        }
        Ok(entries)
    }

    /// A single knob by name. `NotFound` means the registry exists but the
    /// name is absent.
    pub fn query_single(&self, name: &str, store: &dyn OverrideStore) -> Result<VarListEntry> {
        let knobs = self.knobs.ok_or(Error::Unsupported)?;
        let knob = knobs.find(name).ok_or(Error::NotFound)?;
        self.project(knob, store)
    }

    fn project(
        &self,
        knob: &knob::KnobDescriptor<'_>,
        store: &dyn OverrideStore,
    ) -> Result<VarListEntry> {
        let data = knob::resolve(knob, self.platform_id, self.profile, store)?;
        Ok(VarListEntry {
            name: String::from(knob.name),
            guid: knob.guid,
            attributes: DEFAULT_ATTRIBUTES,
            data,
        })
    }
}
