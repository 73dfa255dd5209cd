//! Thread-safe block-based bump arena over the dsmem allocator.
//!
//! An [`Arena`] amortises many small allocations that share a lifetime into
//! a few large heap blocks, and lets callers recycle all of them at once
//! with [`Arena::clear`].
//!
//! # Architecture
//!
//! ```text
//! Arena (Mutex, one critical section per call)
//! └── DynArray<Block> (first-fit scan in insertion order)
//!     └── Block (256 KiB default, bump offset, owns one HeapBlock)
//! ```
//!
//! Blocks are created lazily, never split an allocation across a boundary,
//! and are only freed when the arena is released or dropped.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod arena;
pub mod block;
pub mod config;

pub use arena::{Arena, ArenaStats, BlockInfo};
pub use block::Block;
pub use config::{ArenaConfig, Placement};
