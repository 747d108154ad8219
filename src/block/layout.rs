//! Block geometry reconstruction.
//!
//! Given a candidate header address, recover the block's header, body, and
//! trailer extents from shadow classification plus the raw header size
//! fields. Nothing here follows block-internal pointers: every derived
//! extent is checked against the tracked span before it is used, and any
//! inconsistency is a [`ParseError`], never a panic.

use thiserror::Error;

use crate::shadow::model::{GranuleState, ShadowSource, GRANULE_SIZE};
use crate::util::layout::is_aligned;
use crate::util::span::HeapSpan;

use super::header::{HeaderView, BLOCK_HEADER_SIZE, BLOCK_TRAILER_SIZE};

/// Why a candidate address could not be parsed as a block.
///
/// The walker treats every variant as "not a header here" and keeps
/// scanning; none of them escalates to a scan failure.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// The shadow does not mark this address as the start of a header.
    #[error("no block header starts at {address:#x}")]
    NotAHeader {
        /// Candidate address.
        address: usize,
    },

    /// The candidate address, or a region boundary derived from the size
    /// fields, is not granule-aligned.
    #[error("block layout at {address:#x} is not granule-aligned")]
    Misaligned {
        /// Candidate address.
        address: usize,
    },

    /// The header bytes, or an extent derived from them, leave the tracked
    /// span (or overflow the address space).
    #[error("block metadata at {address:#x} extends outside the tracked span")]
    OutOfBounds {
        /// Candidate address.
        address: usize,
    },

    /// The extents derived from the header's size fields disagree with the
    /// shadow's classification of the granules they cover.
    #[error("shadow markers contradict the block layout claimed at {address:#x}")]
    InconsistentShadow {
        /// Candidate address.
        address: usize,
    },

    /// The allocation-state byte has no recognizable value, so checksum
    /// coverage cannot be determined.
    #[error("block at {address:#x} carries an unknown allocation state")]
    UnknownBlockState {
        /// Block header address.
        address: usize,
    },
}

/// Derived view of one block's extents.
///
/// Non-owning and transient: recomputed on every scan, never stored across
/// calls. All addresses are absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Address of the block header.
    pub header_addr: usize,
    /// Padding between header and body, in bytes.
    pub header_padding: usize,
    /// Address of the body (user data).
    pub body_addr: usize,
    /// Body size in bytes.
    pub body_size: usize,
    /// Padding between body and trailer, in bytes.
    pub trailer_padding: usize,
    /// Address of the trailer.
    pub trailer_addr: usize,
}

impl BlockInfo {
    /// One past the last byte of the trailer.
    #[inline]
    pub fn end(&self) -> usize {
        self.trailer_addr + BLOCK_TRAILER_SIZE
    }

    /// Total bytes from header through trailer.
    #[inline]
    pub fn total_size(&self) -> usize {
        self.end() - self.header_addr
    }
}

/// Decode the block whose header is claimed to start at `address`.
///
/// Succeeds only when the shadow marks `address` as a header start, the
/// whole block (header through trailer) fits inside `heap`, and the shadow
/// classifies every covered granule the way the header's size fields
/// predict. That cross-check is what lets the walker step over stray
/// header-start markers sitting on top of unrelated memory. The magic,
/// checksum, and state fields are *not* validated here; that is the
/// checker's job, so that a block with tampered fields is reported as
/// corrupt rather than silently skipped.
pub fn parse_block<S: ShadowSource>(
    heap: &HeapSpan<'_>,
    shadow: &S,
    address: usize,
) -> Result<BlockInfo, ParseError> {
    if !is_aligned(address, GRANULE_SIZE) {
        return Err(ParseError::Misaligned { address });
    }
    if shadow.granule_state(address) != GranuleState::HeaderStart {
        return Err(ParseError::NotAHeader { address });
    }
    if !heap.contains_range(address, BLOCK_HEADER_SIZE) {
        return Err(ParseError::OutOfBounds { address });
    }

    let header = HeaderView::new(*heap, address);
    // The header is fully in-span, so the size fields are readable.
    let body_size = header.body_size().ok_or(ParseError::OutOfBounds { address })?;
    let header_padding = header
        .header_padding()
        .ok_or(ParseError::OutOfBounds { address })?;
    let trailer_padding = header
        .trailer_padding()
        .ok_or(ParseError::OutOfBounds { address })?;

    let body_addr = address
        .checked_add(BLOCK_HEADER_SIZE)
        .and_then(|a| a.checked_add(header_padding))
        .ok_or(ParseError::OutOfBounds { address })?;
    let trailer_addr = body_addr
        .checked_add(body_size)
        .and_then(|a| a.checked_add(trailer_padding))
        .ok_or(ParseError::OutOfBounds { address })?;

    // The allocator keeps every region boundary granule-aligned; size
    // fields that break that cannot describe a real block.
    if !is_aligned(body_addr, GRANULE_SIZE) || !is_aligned(trailer_addr, GRANULE_SIZE) {
        return Err(ParseError::Misaligned { address });
    }

    let total = trailer_addr
        .checked_add(BLOCK_TRAILER_SIZE)
        .and_then(|end| end.checked_sub(address))
        .ok_or(ParseError::OutOfBounds { address })?;
    if !heap.contains_range(address, total) {
        return Err(ParseError::OutOfBounds { address });
    }

    let info = BlockInfo {
        header_addr: address,
        header_padding,
        body_addr,
        body_size,
        trailer_padding,
        trailer_addr,
    };
    check_shadow_agreement(shadow, &info)?;
    Ok(info)
}

/// Verify that the shadow classifies each granule of the block the way its
/// derived extents predict.
fn check_shadow_agreement<S: ShadowSource>(
    shadow: &S,
    info: &BlockInfo,
) -> Result<(), ParseError> {
    let address = info.header_addr;
    let mismatch = Err(ParseError::InconsistentShadow { address });

    // Header continuation and header padding granules.
    let mut at = address + GRANULE_SIZE;
    while at < info.body_addr {
        if shadow.granule_state(at) != GranuleState::Header {
            return mismatch;
        }
        at += GRANULE_SIZE;
    }

    // Granules containing body bytes; live and quarantined bodies differ
    // only in marker.
    while at < info.body_addr + info.body_size {
        match shadow.granule_state(at) {
            GranuleState::Body | GranuleState::FreedBody => {}
            _ => return mismatch,
        }
        at += GRANULE_SIZE;
    }

    // Pure trailer-padding granules and the trailer itself.
    let block_end = info.trailer_addr + BLOCK_TRAILER_SIZE;
    let mut at = crate::util::layout::align_up(info.body_addr + info.body_size, GRANULE_SIZE);
    while at < block_end {
        if shadow.granule_state(at) != GranuleState::Trailer {
            return mismatch;
        }
        at += GRANULE_SIZE;
    }

    Ok(())
}
