// SPDX-License-Identifier: GPL-3.0-only

//! Resolution of early-boot platform configuration knobs.
//!
//! A knob's effective value is produced by layering up to four inputs:
//! compiled-in defaults, a per-device profile override blob, a per-boot
//! profile selection, and persisted runtime overrides. The crate walks the
//! tagged binary config blob ([`blob`]), selects the active profile once per
//! boot ([`profile`]), merges the layers ([`knob`]) and projects the result
//! as named variable-list entries ([`varlist`]).
//!
//! Raw byte retrieval (USB, firmware variable store) and driver entry-point
//! plumbing live outside this crate; they appear here only as the traits in
//! [`store`] and [`profile`].

#![no_std]

#[macro_use]
extern crate alloc;

pub mod blob;
pub mod knob;
pub mod profile;
pub mod store;
pub mod varlist;

/// Failure classes shared by every operation in this crate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A required input was missing or zero-sized.
    InvalidArgument,
    /// Well-formed query, absent result. Always recoverable; callers fall
    /// through to the next layer or the compiled default.
    NotFound,
    /// Blob or variable-list data is self-inconsistent. Never silently
    /// tolerated; the offending record is refused.
    Malformed,
    /// The platform declines to implement a capability. Distinct from
    /// failure.
    Unsupported,
    /// The profile source of truth was unreachable or answered with an
    /// out-of-range value. Never mapped to the generic profile.
    SourceUnavailable,
}

pub type Result<T> = core::result::Result<T, Error>;
