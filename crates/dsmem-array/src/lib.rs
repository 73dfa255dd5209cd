//! Thread-safe growable arrays over the dsmem allocator.
//!
//! [`DynArray`] is an insertion-ordered, index-addressable sequence whose
//! buffer comes from a shared [`Allocator`](dsmem_core::Allocator). Every
//! operation is a single critical section on the array's own mutex.
//!
//! [`LockRegionList`] specialises the array for fixed-size
//! [`LockRegion`] records stored by value, the bookkeeping behind
//! buffer-lock collections.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod config;
pub mod dyn_array;
pub mod lock_region;
mod raw;

pub use config::ArrayConfig;
pub use dyn_array::DynArray;
pub use lock_region::{LockRegion, LockRegionList};
