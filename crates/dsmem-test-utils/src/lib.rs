//! Test utilities for dsmem development.
//!
//! Provides [`FailingHeap`], a [`Heap`](dsmem_core::Heap) that fails
//! allocations, reallocations, or frees on demand, and small fixtures for
//! building allocators over it.

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{failing_allocator, process_allocator, FailingHeap};
