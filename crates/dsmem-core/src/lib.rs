//! Heap allocator and error taxonomy for the dsmem memory substrate.
//!
//! This is the leaf crate of the workspace. Every byte handed out by the
//! dynamic array and the arena originates here, through [`Allocator`].
//!
//! # Architecture
//!
//! ```text
//! Allocator (shared via Arc, no locking of its own)
//! └── Arc<dyn Heap> (ProcessHeap in production, fault-injecting heaps in tests)
//!     └── HeapBlock (owned region: base pointer + size, 16-byte aligned)
//! ```
//!
//! `unsafe` is confined to [`heap`] and the private `raw` module; the rest of
//! the crate is safe code layered over them.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod allocator;
pub mod error;
pub mod heap;
mod raw;

pub use allocator::{Allocator, AllocatorStats, HeapBlock, HEAP_ALIGNMENT};
pub use error::{ErrorKind, MemError};
pub use heap::{Heap, ProcessHeap};
