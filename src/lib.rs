//! # shadowcheck
//!
//! Heap-corruption detection over shadow memory, for in-process
//! memory-safety runtimes.
//!
//! The surrounding runtime intercepts allocations, brackets each one with a
//! sealed header and trailer, and keeps a shadow marker array describing
//! every granule of tracked memory. This crate is the diagnosis half: given
//! read-only views of the heap and its shadow, it reconstructs allocation
//! structure purely from metadata bytes — tolerating a heap that may be
//! mid-corruption — and reports the contiguous regions that violate
//! integrity invariants.
//!
//! ## Features
//!
//! - Whole-heap corruption scan with deterministic, minimal output
//!   (contiguous corrupt ranges, not a flat block list)
//! - Shadow-granule classification behind an injectable accessor trait
//! - Bounds-checked block parsing that never trusts unchecked pointers
//! - Forward and reverse lazy block walking over any address range
//! - XXH3-sealed block metadata with state-aware body coverage
//! - Synthetic heap fixtures for tests and benches
//!
//! ## Quick Start
//!
//! ```rust
//! use shadowcheck::HeapChecker;
//! use shadowcheck::testing::FakeHeap;
//!
//! // Stand in for the external allocator: two tracked blocks, one tampered.
//! let mut heap = FakeHeap::new(4096);
//! let ok = heap.alloc_block(128);
//! let bad = heap.alloc_block(128);
//! heap.flip_magic(&bad);
//!
//! let span = heap.span();
//! let shadow = heap.shadow();
//! let mut checker = HeapChecker::new(span, &shadow);
//! assert!(checker.is_heap_corrupt());
//! assert_eq!(checker.corrupt_ranges().len(), 1);
//! # let _ = ok;
//! ```
//!
//! The checker assumes mutators are quiesced for the duration of a call
//! (a fault path already is) and performs no locking of its own.

pub mod api;
pub mod block;
pub mod shadow;
pub mod testing;
pub mod util;

// Re-export the public API at crate root for convenience
pub use api::checker::HeapChecker;
pub use api::report::CorruptBlockRange;

pub use block::checksum::{compute as compute_block_checksum, verify as verify_block_checksum};
pub use block::header::{
    BlockState, HeaderView, TrailerView, BLOCK_HEADER_MAGIC, BLOCK_HEADER_SIZE,
    BLOCK_TRAILER_SIZE,
};
pub use block::layout::{parse_block, BlockInfo, ParseError};

pub use shadow::model::{GranuleState, ShadowMemory, ShadowSource, GRANULE_SIZE, SHADOW_RATIO_LOG};
pub use shadow::walker::{ScanDirection, ShadowWalker};

pub use util::span::HeapSpan;
