//! dsmem: a thread-safe memory substrate.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the dsmem sub-crates and adds [`MemContext`], the application-wide
//! handle that owns the shared allocator and default configurations.
//!
//! # Quick start
//!
//! ```rust
//! use dsmem::prelude::*;
//!
//! let ctx = MemContext::new().unwrap();
//!
//! let handles = ctx.array::<u64>().unwrap();
//! handles.add_item(7).unwrap();
//! handles.add_item(9).unwrap();
//! assert_eq!(handles.remove_item(0).unwrap(), 7);
//! assert_eq!(handles.get_count(), 1);
//!
//! let arena = ctx.arena().unwrap();
//! arena.allocate(100).unwrap();
//! arena.allocate(100).unwrap();
//! assert_eq!(arena.block_count(), 1);
//! arena.clear().unwrap();
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`allocator`] | `dsmem-core` | `Allocator`, `Heap`, `HeapBlock`, `MemError` |
//! | [`array`] | `dsmem-array` | `DynArray`, `LockRegionList` |
//! | [`arena`] | `dsmem-arena` | `Arena`, `Block`, `Placement` |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod context;

pub use context::{ContextConfig, MemContext};

/// Allocator, heap abstraction, and errors (`dsmem-core`).
pub use dsmem_core as allocator;

/// Thread-safe growable arrays and lock-region lists (`dsmem-array`).
pub use dsmem_array as array;

/// Block-based bump arena (`dsmem-arena`).
pub use dsmem_arena as arena;

/// Common imports for typical dsmem usage.
///
/// ```rust
/// use dsmem::prelude::*;
/// ```
pub mod prelude {
    // Context
    pub use crate::context::{ContextConfig, MemContext};

    // Allocator and errors
    pub use dsmem_core::{Allocator, ErrorKind, HeapBlock, MemError};

    // Arrays
    pub use dsmem_array::{ArrayConfig, DynArray, LockRegion, LockRegionList};

    // Arena
    pub use dsmem_arena::{Arena, ArenaConfig, Placement};
}
