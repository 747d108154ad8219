//! Whole-heap corruption checking.

use crate::block::checksum;
use crate::block::header::{HeaderView, BLOCK_HEADER_MAGIC};
use crate::block::layout::BlockInfo;
use crate::shadow::model::ShadowSource;
use crate::shadow::walker::{ScanDirection, ShadowWalker};
use crate::util::span::HeapSpan;

use super::report::{CorruptBlockRange, RangeBuilder};

/// Walks the tracked heap and reports contiguous runs of corrupted blocks.
///
/// The checker is constructed over read-only views of the heap and its
/// shadow; it never mutates either, never allocates heap blocks of its own,
/// and runs each check to completion on the calling thread. Callers are
/// expected to have quiesced mutators (a fault path already has).
///
/// The checker owns its range output: the slice borrowed from
/// [`corrupt_ranges`](Self::corrupt_ranges) is replaced — not appended — by
/// the next [`is_heap_corrupt`](Self::is_heap_corrupt) call. Clone the
/// records (`to_vec`) to retain a snapshot.
pub struct HeapChecker<'a, S: ShadowSource> {
    heap: HeapSpan<'a>,
    shadow: &'a S,
    ranges: Vec<CorruptBlockRange>,
}

impl<'a, S: ShadowSource> HeapChecker<'a, S> {
    /// Create a checker over the tracked heap span and its shadow.
    pub fn new(heap: HeapSpan<'a>, shadow: &'a S) -> Self {
        Self {
            heap,
            shadow,
            ranges: Vec::new(),
        }
    }

    /// Scan the whole tracked heap for corrupted blocks.
    ///
    /// Every block is visited in ascending address order regardless of its
    /// allocation/quarantine state; a block fails validation when its magic
    /// sentinel or its checksum does not match (the two causes are reported
    /// uniformly). Adjacent failures merge into one
    /// [`CorruptBlockRange`]. Returns true iff any corruption was found.
    ///
    /// Deterministic: an unchanged heap produces an identical range
    /// sequence on every call.
    pub fn is_heap_corrupt(&mut self) -> bool {
        let mut builder = RangeBuilder::new();
        let walker = ShadowWalker::new(
            self.heap,
            self.shadow,
            self.heap.begin(),
            self.heap.end(),
            ScanDirection::Forward,
        );

        let mut blocks_seen = 0usize;
        let mut corrupt_seen = 0usize;
        for block in walker {
            blocks_seen += 1;
            if self.block_is_valid(&block) {
                builder.record_valid();
            } else {
                corrupt_seen += 1;
                builder.record_corrupt(block.header_addr, block.end());
            }
        }

        self.ranges = builder.finish();
        log::debug!(
            "heap check: {} blocks scanned, {} corrupt in {} range(s)",
            blocks_seen,
            corrupt_seen,
            self.ranges.len()
        );
        for range in &self.ranges {
            log::warn!("{}", range);
        }
        !self.ranges.is_empty()
    }

    /// Ranges found by the most recent check, in ascending address order.
    pub fn corrupt_ranges(&self) -> &[CorruptBlockRange] {
        &self.ranges
    }

    /// Validate one block's integrity fields.
    fn block_is_valid(&self, block: &BlockInfo) -> bool {
        let header = HeaderView::new(self.heap, block.header_addr);
        match header.magic() {
            Some(BLOCK_HEADER_MAGIC) => {}
            _ => return false,
        }
        checksum::verify(&self.heap, block)
    }
}
