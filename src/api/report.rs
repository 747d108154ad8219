//! Corruption diagnostic records and range aggregation.

use std::fmt;

/// One contiguous run of corrupted blocks.
///
/// Produced by the heap checker, which owns the containing sequence until
/// the next check call; clone (or `to_vec` the borrowed slice) to keep a
/// snapshot past that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptBlockRange {
    /// Header address of the first corrupted block in the run.
    pub address: usize,
    /// Bytes from `address` through the end of the last corrupted block.
    pub length: usize,
    /// Number of corrupted blocks merged into the run.
    pub block_count: usize,
}

impl fmt::Display for CorruptBlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "corrupt range at {:#x}: {} bytes, {} block(s)",
            self.address, self.length, self.block_count
        )
    }
}

/// State of the adjacency merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeState {
    NoOpenRange,
    OpenRange {
        start: usize,
        end: usize,
        count: usize,
    },
}

/// Two-state machine merging address-adjacent corrupt blocks into ranges.
///
/// Knows nothing about shadow memory or block layout; it only sees the
/// `[start, end)` extents the caller observed, in walk order. A corrupt
/// extent starting exactly at the open range's end extends it; anything
/// else (a gap, or a valid block in between) closes the open range and
/// starts a new one.
#[derive(Debug)]
pub(crate) struct RangeBuilder {
    state: MergeState,
    ranges: Vec<CorruptBlockRange>,
}

impl RangeBuilder {
    pub(crate) fn new() -> Self {
        Self {
            state: MergeState::NoOpenRange,
            ranges: Vec::new(),
        }
    }

    /// Record a corrupted block spanning `[start, end)`.
    pub(crate) fn record_corrupt(&mut self, start: usize, end: usize) {
        match self.state {
            MergeState::OpenRange {
                start: open_start,
                end: open_end,
                count,
            } if start == open_end => {
                self.state = MergeState::OpenRange {
                    start: open_start,
                    end,
                    count: count + 1,
                };
            }
            _ => {
                self.close();
                self.state = MergeState::OpenRange {
                    start,
                    end,
                    count: 1,
                };
            }
        }
    }

    /// Record a valid block, which terminates any open range.
    pub(crate) fn record_valid(&mut self) {
        self.close();
    }

    /// Close any open range and return the collected sequence.
    pub(crate) fn finish(mut self) -> Vec<CorruptBlockRange> {
        self.close();
        self.ranges
    }

    fn close(&mut self) {
        if let MergeState::OpenRange { start, end, count } = self.state {
            self.ranges.push(CorruptBlockRange {
                address: start,
                length: end - start,
                block_count: count,
            });
            self.state = MergeState::NoOpenRange;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_observations_no_ranges() {
        assert!(RangeBuilder::new().finish().is_empty());
    }

    #[test]
    fn test_valid_blocks_only() {
        let mut builder = RangeBuilder::new();
        builder.record_valid();
        builder.record_valid();
        assert!(builder.finish().is_empty());
    }

    #[test]
    fn test_adjacent_corrupt_blocks_merge() {
        let mut builder = RangeBuilder::new();
        builder.record_corrupt(0x1000, 0x1100);
        builder.record_corrupt(0x1100, 0x1200);
        assert_eq!(
            builder.finish(),
            [CorruptBlockRange {
                address: 0x1000,
                length: 0x200,
                block_count: 2
            }]
        );
    }

    #[test]
    fn test_valid_block_splits_ranges() {
        let mut builder = RangeBuilder::new();
        builder.record_corrupt(0x1000, 0x1100);
        builder.record_valid();
        builder.record_corrupt(0x1200, 0x1300);
        assert_eq!(
            builder.finish(),
            [
                CorruptBlockRange {
                    address: 0x1000,
                    length: 0x100,
                    block_count: 1
                },
                CorruptBlockRange {
                    address: 0x1200,
                    length: 0x100,
                    block_count: 1
                },
            ]
        );
    }

    #[test]
    fn test_address_gap_splits_ranges() {
        let mut builder = RangeBuilder::new();
        builder.record_corrupt(0x1000, 0x1100);
        // Next corrupt block is not byte-adjacent; no valid block was seen,
        // but the run is still broken.
        builder.record_corrupt(0x1180, 0x1280);
        let ranges = builder.finish();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].block_count, 1);
        assert_eq!(ranges[1].address, 0x1180);
    }

    #[test]
    fn test_open_range_closed_on_finish() {
        let mut builder = RangeBuilder::new();
        builder.record_valid();
        builder.record_corrupt(0x2000, 0x2040);
        assert_eq!(
            builder.finish(),
            [CorruptBlockRange {
                address: 0x2000,
                length: 0x40,
                block_count: 1
            }]
        );
    }
}
