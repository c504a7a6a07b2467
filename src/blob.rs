// SPDX-License-Identifier: GPL-3.0-only

//! Reader for the tagged binary configuration blob.
//!
//! A blob is a caller-owned byte region holding a sequence of [`ConfHeader`]
//! records, each followed by `length` payload bytes. A tag with
//! [`TAG_CONTAINER`] set marks a container whose payload is itself a header
//! sequence. Lookups borrow from the blob and never copy or retain it.

use alloc::vec::Vec;
use log::warn;

use crate::{Error, Result};

/// Tags with this bit set denote containers; their payload is a nested
/// header sequence.
pub const TAG_CONTAINER: u32 = 0x8000_0000;

/// Containers are descended into at most this many levels when a lookup
/// does not say otherwise. Depth 0 scans the top level only.
pub const DEFAULT_MAX_NESTING: u32 = 4;

/// On-blob record header. Little-endian, unaligned, 13 bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct ConfHeader {
    pub tag: u32,
    pub platform_id_mask: u32,
    pub is_internal: u8,
    pub length: u32,
}

unsafe impl plain::Plain for ConfHeader {}

pub const HEADER_SIZE: usize = core::mem::size_of::<ConfHeader>();

/// A header mask of 0 applies to every platform; likewise a query mask of 0
/// matches every header.
fn mask_matches(header_mask: u32, query_mask: u32) -> bool {
    header_mask == 0 || query_mask == 0 || header_mask & query_mask != 0
}

/// Locate a header by tag, filtered by platform mask and, when
/// `internal_only` is set, restricted to internal entries.
///
/// The scan is an explicit worklist over byte ranges so the nesting bound
/// and termination on malformed input hold regardless of call-stack limits.
/// Containers are descended into in place, so with duplicate tags the first
/// match in blob order wins. Every scanned header is bounds-checked; a
/// declared length overrunning its range yields `Malformed` even if a match
/// was already seen. A tag that only exists below `max_depth` yields
/// `NotFound`.
pub fn find_header_by_tag(
    blob: &[u8],
    platform_id_mask: u32,
    tag: u32,
    internal_only: bool,
    max_depth: u32,
) -> Result<&ConfHeader> {
    scan(blob, platform_id_mask, tag, internal_only, max_depth).map(|(header, _)| header)
}

/// Resolve a concrete platform ID to its singleton mask and return the
/// payload of the matching header.
pub fn find_data_by_tag(blob: &[u8], platform_id: u32, tag: u32) -> Result<&[u8]> {
    if platform_id >= 32 {
        return Err(Error::InvalidArgument);
    }
    scan(blob, 1 << platform_id, tag, false, DEFAULT_MAX_NESTING).map(|(_, payload)| payload)
}

/// Validated size in bytes of all top-level records in the blob.
pub fn total_size(blob: &[u8]) -> Result<u32> {
    if blob.is_empty() {
        return Err(Error::InvalidArgument);
    }

    let mut total: u64 = 0;
    let mut offset = 0;
    while offset < blob.len() {
        let (_, payload) = read_header(blob, offset)?;
        offset += HEADER_SIZE + payload.len();
        total += (HEADER_SIZE + payload.len()) as u64;
    }

    u32::try_from(total).map_err(|_| Error::Malformed)
}

fn scan<'a>(
    blob: &'a [u8],
    query_mask: u32,
    tag: u32,
    internal_only: bool,
    max_depth: u32,
) -> Result<(&'a ConfHeader, &'a [u8])> {
    if blob.is_empty() {
        return Err(Error::InvalidArgument);
    }

    let mut found = None;
    let mut worklist: Vec<(&[u8], u32)> = vec![(blob, max_depth)];

    while let Some((range, depth)) = worklist.pop() {
        let mut offset = 0;
        while offset < range.len() {
            let (header, payload) = read_header(range, offset)?;
            offset += HEADER_SIZE + payload.len();

            if found.is_none()
                && header.tag == tag
                && mask_matches(header.platform_id_mask, query_mask)
                && (!internal_only || header.is_internal != 0)
            {
                found = Some((header, payload));
            }

            if header.tag & TAG_CONTAINER != 0 && depth > 0 {
                // Descend before the rest of this level; the remainder is
                // queued behind the container body so matches follow blob
                // order.
                worklist.push((&range[offset..], depth));
                worklist.push((payload, depth - 1));
                break;
            }
        }
    }

    found.ok_or(Error::NotFound)
}

/// Parse the header at `offset` and bounds-check its payload. Checked before
/// any payload access; truncated or zero-length records are `Malformed`.
fn read_header(range: &[u8], offset: usize) -> Result<(&ConfHeader, &[u8])> {
    if range.len() - offset < HEADER_SIZE {
        warn!("truncated config header at offset {}", offset);
        return Err(Error::Malformed);
    }

    let header =
        plain::from_bytes::<ConfHeader>(&range[offset..]).map_err(|_| Error::Malformed)?;

    let length = header.length as usize;
    let start = offset + HEADER_SIZE;
    let end = match start.checked_add(length) {
        Some(end) if length > 0 && end <= range.len() => end,
        _ => {
            let tag = header.tag;
            warn!("config header {:#x} declares length {} past blob bound", tag, length);
            return Err(Error::Malformed);
        }
    };

    Ok((header, &range[start..end]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn record(tag: u32, mask: u32, internal: u8, payload: &[u8]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&tag.to_le_bytes());
        raw.extend_from_slice(&mask.to_le_bytes());
        raw.push(internal);
        raw.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        raw.extend_from_slice(payload);
        raw
    }

    #[test]
    fn test_find_by_platform_id() {
        let blob = record(7, 0b0011, 0, &[0x2A, 0x00, 0x00, 0x00]);

        assert_eq!(find_data_by_tag(&blob, 1, 7), Ok(&[0x2A, 0x00, 0x00, 0x00][..]));
        assert_eq!(find_data_by_tag(&blob, 4, 7), Err(Error::NotFound));
        assert_eq!(find_data_by_tag(&blob, 1, 8), Err(Error::NotFound));
    }

    #[test]
    fn test_zero_mask_matches_every_platform() {
        let blob = record(3, 0, 0, &[0xAB]);

        assert_eq!(find_data_by_tag(&blob, 0, 3), Ok(&[0xAB][..]));
        assert_eq!(find_data_by_tag(&blob, 31, 3), Ok(&[0xAB][..]));
    }

    #[test]
    fn test_populated_mask_matches_only_its_bits() {
        let blob = record(3, 1 << 5, 0, &[0xAB]);

        assert_eq!(find_data_by_tag(&blob, 5, 3), Ok(&[0xAB][..]));
        assert_eq!(find_data_by_tag(&blob, 6, 3), Err(Error::NotFound));
    }

    #[test]
    fn test_overrun_length_is_malformed() {
        let mut blob = record(7, 0, 0, &[0x01, 0x02]);
        // Declared length exceeds remaining bytes
        blob[9..13].copy_from_slice(&16u32.to_le_bytes());

        assert_eq!(find_data_by_tag(&blob, 0, 7), Err(Error::Malformed));
        assert_eq!(total_size(&blob), Err(Error::Malformed));
    }

    #[test]
    fn test_overrun_after_match_is_still_malformed() {
        let mut blob = record(7, 0, 0, &[0x2A]);
        let mut bad = record(8, 0, 0, &[0x01]);
        // Second record declares more payload than it carries
        bad[9..13].copy_from_slice(&100u32.to_le_bytes());
        blob.extend_from_slice(&bad);

        assert_eq!(find_data_by_tag(&blob, 0, 7), Err(Error::Malformed));
    }

    #[test]
    fn test_zero_length_is_malformed() {
        let blob = record(7, 0, 0, &[]);

        assert_eq!(find_data_by_tag(&blob, 0, 7), Err(Error::Malformed));
    }

    #[test]
    fn test_empty_blob_is_invalid_argument() {
        assert_eq!(find_data_by_tag(&[], 0, 7), Err(Error::InvalidArgument));
        assert_eq!(total_size(&[]), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_nested_lookup_and_depth_bound() {
        let leaf = record(9, 0, 0, &[0x55, 0x66]);
        let blob = record(TAG_CONTAINER | 1, 0, 0, &leaf);

        assert_eq!(find_data_by_tag(&blob, 0, 9), Ok(&[0x55, 0x66][..]));

        // Depth 0 scans the top level only; the nested tag is absent, not an
        // error.
        assert_eq!(
            find_header_by_tag(&blob, 0, 9, false, 0),
            Err(Error::NotFound)
        );
        assert!(find_header_by_tag(&blob, 0, 9, false, 1).is_ok());

        // The container itself is matchable.
        let header = find_header_by_tag(&blob, 0, TAG_CONTAINER | 1, false, 0).unwrap();
        let tag = header.tag;
        assert_eq!(tag, TAG_CONTAINER | 1);
    }

    #[test]
    fn test_match_follows_blob_order_across_nesting() {
        let nested = record(7, 0, 0, &[0xAA]);
        let mut blob = record(TAG_CONTAINER | 1, 0, 0, &nested);
        blob.extend_from_slice(&record(7, 0, 0, &[0xBB]));

        // The container body precedes the second top-level record in blob
        // order, so the nested match wins.
        assert_eq!(find_data_by_tag(&blob, 0, 7), Ok(&[0xAA][..]));

        let mut blob = record(7, 0, 0, &[0xBB]);
        blob.extend_from_slice(&record(TAG_CONTAINER | 1, 0, 0, &nested));
        assert_eq!(find_data_by_tag(&blob, 0, 7), Ok(&[0xBB][..]));
    }

    #[test]
    fn test_deep_nesting_terminates_cleanly() {
        let mut blob = record(9, 0, 0, &[0x01]);
        for level in 0..8 {
            blob = record(TAG_CONTAINER | (0x100 + level), 0, 0, &blob);
        }

        // Tag 9 sits below DEFAULT_MAX_NESTING levels of containers.
        assert_eq!(find_data_by_tag(&blob, 0, 9), Err(Error::NotFound));
        assert!(find_header_by_tag(&blob, 0, 9, false, 8).is_ok());
    }

    #[test]
    fn test_internal_only_filter() {
        let mut blob = record(7, 0, 0, &[0x01]);
        blob.extend_from_slice(&record(7, 0, 1, &[0x02]));

        let header = find_header_by_tag(&blob, 0, 7, true, 0).unwrap();
        assert_eq!(header.is_internal, 1);

        let header = find_header_by_tag(&blob, 0, 7, false, 0).unwrap();
        assert_eq!(header.is_internal, 0);
    }

    #[test]
    fn test_total_size() {
        let mut blob = record(1, 0, 0, &[0x01, 0x02]);
        blob.extend_from_slice(&record(2, 0, 0, &[0x03]));

        assert_eq!(total_size(&blob), Ok(blob.len() as u32));
    }
}
