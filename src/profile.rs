// SPDX-License-Identifier: GPL-3.0-only

//! Per-boot profile selection.
//!
//! A profile is a compiled bundle of knob overrides, typically one per
//! hardware SKU. The generic profile has no table entry; its data is the
//! compiled default knob set. Selection consults the platform's source of
//! truth exactly once per boot and validates the answer here, so callers
//! never re-check it against the table.

use log::warn;
use uguid::Guid;

use crate::{Error, Result};

/// Wire sentinel used by profile sources to report "no specific profile".
/// Inside the crate the selection is always an [`ActiveSelection`].
pub const GENERIC_PROFILE: u32 = 0xFFFF_FFFF;

/// Compiled per-SKU override bundle. Read-only for the life of the boot.
#[derive(Copy, Clone, Debug)]
pub struct Profile<'a> {
    pub guid: Guid,
    /// Short human-readable label, e.g. the SKU flavor name.
    pub flavor: &'a str,
    /// Config blob holding this profile's knob overrides.
    pub overrides: &'a [u8],
}

/// Validated outcome of profile selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ActiveSelection {
    /// No specific profile; resolution uses compiled defaults only.
    Generic,
    /// A concrete profile, already range-checked against the table.
    Profile { index: u32, guid: Guid },
}

impl ActiveSelection {
    pub fn index(&self) -> Option<u32> {
        match self {
            ActiveSelection::Generic => None,
            ActiveSelection::Profile { index, .. } => Some(*index),
        }
    }

    pub fn guid(&self) -> Option<Guid> {
        match self {
            ActiveSelection::Generic => None,
            ActiveSelection::Profile { guid, .. } => Some(*guid),
        }
    }

    /// Index form for wire or protocol boundaries, where the generic
    /// selection is [`GENERIC_PROFILE`].
    pub fn raw_index(&self) -> u32 {
        self.index().unwrap_or(GENERIC_PROFILE)
    }
}

/// Platform source of truth for the active profile. Expected to answer (or
/// fail) within a single call; this crate never retries.
pub trait ProfileSource {
    /// Raw profile index, or [`GENERIC_PROFILE`] for none.
    fn active_profile(&self) -> Result<u32>;
}

/// The compiled profile table.
#[derive(Copy, Clone, Debug)]
pub struct ProfileTable<'a> {
    profiles: &'a [Profile<'a>],
}

impl<'a> ProfileTable<'a> {
    pub const fn new(profiles: &'a [Profile<'a>]) -> Self {
        Self { profiles }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Determine the active profile for this boot.
    ///
    /// A non-error return is always internally consistent: either the
    /// generic selection or an index/GUID pair present in the table. An
    /// unreachable source or an out-of-range answer is `SourceUnavailable`;
    /// it is never mapped to the generic profile, which would mask a
    /// platform fault as a deliberate choice.
    ///
    /// Selection inputs may not be idempotent across the early-boot window,
    /// so callers query once and treat the result as immutable for the rest
    /// of the boot.
    pub fn select(&self, source: &dyn ProfileSource) -> Result<ActiveSelection> {
        let raw = source.active_profile().map_err(|err| {
            warn!("profile source of truth failed: {:?}", err);
            Error::SourceUnavailable
        })?;

        if raw == GENERIC_PROFILE {
            return Ok(ActiveSelection::Generic);
        }

        match self.profiles.get(raw as usize) {
            Some(profile) => Ok(ActiveSelection::Profile {
                index: raw,
                guid: profile.guid,
            }),
            None => {
                warn!(
                    "profile source returned index {} but only {} profiles are compiled",
                    raw,
                    self.profiles.len()
                );
                Err(Error::SourceUnavailable)
            }
        }
    }

    /// GUID form of [`select`](Self::select). Returns the GUID by value; the
    /// generic selection has no table entry and yields `NotFound`. Nothing
    /// is allocated on failure.
    pub fn active_profile_guid(&self, source: &dyn ProfileSource) -> Result<Guid> {
        match self.select(source)? {
            ActiveSelection::Profile { guid, .. } => Ok(guid),
            ActiveSelection::Generic => Err(Error::NotFound),
        }
    }

    /// The profile a selection refers to, if any.
    pub fn get(&self, selection: &ActiveSelection) -> Option<&Profile<'a>> {
        match selection {
            ActiveSelection::Generic => None,
            ActiveSelection::Profile { index, .. } => self.profiles.get(*index as usize),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uguid::guid;

    const GUID_A: Guid = guid!("11111111-2222-3333-4444-555555555555");
    const GUID_B: Guid = guid!("aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee");
    const GUID_C: Guid = guid!("01234567-89ab-cdef-0123-456789abcdef");

    struct FixedSource(Result<u32>);

    impl ProfileSource for FixedSource {
        fn active_profile(&self) -> Result<u32> {
            self.0
        }
    }

    fn table() -> ProfileTable<'static> {
        static PROFILES: [Profile<'static>; 3] = [
            Profile { guid: GUID_A, flavor: "alpha", overrides: &[] },
            Profile { guid: GUID_B, flavor: "bravo", overrides: &[] },
            Profile { guid: GUID_C, flavor: "charlie", overrides: &[] },
        ];
        ProfileTable::new(&PROFILES)
    }

    #[test]
    fn test_select_valid_index() {
        let selection = table().select(&FixedSource(Ok(1))).unwrap();

        assert_eq!(selection, ActiveSelection::Profile { index: 1, guid: GUID_B });
        assert_eq!(selection.raw_index(), 1);
        assert_eq!(table().get(&selection).unwrap().flavor, "bravo");
    }

    #[test]
    fn test_select_generic_sentinel_is_not_an_error() {
        let selection = table().select(&FixedSource(Ok(GENERIC_PROFILE))).unwrap();

        assert_eq!(selection, ActiveSelection::Generic);
        assert_eq!(selection.index(), None);
        assert_eq!(selection.raw_index(), GENERIC_PROFILE);
        assert!(table().get(&selection).is_none());
    }

    #[test]
    fn test_out_of_range_index_is_source_unavailable() {
        assert_eq!(
            table().select(&FixedSource(Ok(9999))),
            Err(Error::SourceUnavailable)
        );
    }

    #[test]
    fn test_source_failure_is_source_unavailable() {
        assert_eq!(
            table().select(&FixedSource(Err(Error::NotFound))),
            Err(Error::SourceUnavailable)
        );
    }

    #[test]
    fn test_selection_is_idempotent_within_a_boot() {
        let table = table();
        let source = FixedSource(Ok(2));

        assert_eq!(table.select(&source), table.select(&source));
    }

    #[test]
    fn test_guid_form() {
        assert_eq!(table().active_profile_guid(&FixedSource(Ok(0))), Ok(GUID_A));
        assert_eq!(
            table().active_profile_guid(&FixedSource(Ok(GENERIC_PROFILE))),
            Err(Error::NotFound)
        );
        assert_eq!(
            table().active_profile_guid(&FixedSource(Ok(3))),
            Err(Error::SourceUnavailable)
        );
    }
}
