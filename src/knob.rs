// SPDX-License-Identifier: GPL-3.0-only

//! Layered resolution of a single knob.
//!
//! Precedence, highest first: a persisted runtime override of exactly the
//! default's size, then the active profile's override blob, then the
//! compiled default. The output always carries the full expected size from
//! exactly one layer; there are no partial writes.

use alloc::vec::Vec;
use log::{debug, warn};
use uguid::Guid;

use crate::blob;
use crate::profile::Profile;
use crate::store::OverrideStore;
use crate::{Error, Result};

/// Compiled description of one knob. One descriptor exists per knob,
/// globally, independent of profile.
#[derive(Copy, Clone, Debug)]
pub struct KnobDescriptor<'a> {
    pub guid: Guid,
    pub name: &'a str,
    /// The knob's identity inside profile override blobs.
    pub tag: u32,
    pub default: &'a [u8],
}

/// The compiled knob registry.
#[derive(Copy, Clone, Debug)]
pub struct KnobSet<'a> {
    knobs: &'a [KnobDescriptor<'a>],
}

impl<'a> KnobSet<'a> {
    pub const fn new(knobs: &'a [KnobDescriptor<'a>]) -> Self {
        Self { knobs }
    }

    pub fn len(&self) -> usize {
        self.knobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knobs.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'a, KnobDescriptor<'a>> {
        self.knobs.iter()
    }

    pub fn find(&self, name: &str) -> Option<&KnobDescriptor<'a>> {
        self.knobs.iter().find(|knob| knob.name == name)
    }
}

/// Resolve a knob's effective value.
///
/// `profile` is the outcome of this boot's selection (`None` for the generic
/// profile). A runtime override whose size differs from the default is no
/// override at all and falls through; a profile payload whose size differs
/// is `Malformed`, since build-time data must not be silently tolerated.
/// `NotFound` and `Unsupported` from the store fall through to the next
/// layer; every other failure propagates.
pub fn resolve(
    knob: &KnobDescriptor<'_>,
    platform_id: u32,
    profile: Option<&Profile<'_>>,
    store: &dyn OverrideStore,
) -> Result<Vec<u8>> {
    if knob.default.is_empty() {
        return Err(Error::InvalidArgument);
    }

    match store.read(&knob.guid, knob.name) {
        Ok(data) => {
            if data.len() == knob.default.len() {
                return Ok(data);
            }
            warn!(
                "runtime override for {} is {} bytes, expected {}; ignoring",
                knob.name,
                data.len(),
                knob.default.len()
            );
        }
        Err(Error::NotFound) | Err(Error::Unsupported) => {}
        Err(err) => return Err(err),
    }

    if let Some(profile) = profile {
        if !profile.overrides.is_empty() {
            match blob::find_data_by_tag(profile.overrides, platform_id, knob.tag) {
                Ok(data) => {
                    if data.len() != knob.default.len() {
                        let tag = knob.tag;
                        warn!(
                            "profile {} carries a {} byte payload for tag {:#x}, expected {}",
                            profile.flavor,
                            data.len(),
                            tag,
                            knob.default.len()
                        );
                        return Err(Error::Malformed);
                    }
                    return Ok(data.to_vec());
                }
                Err(Error::NotFound) => {
                    debug!("no profile override for {}", knob.name);
                }
                Err(err) => return Err(err),
            }
        }
    }

    Ok(knob.default.to_vec())
}
