//! The heap seam underneath [`Allocator`](crate::Allocator).
//!
//! Production code uses [`ProcessHeap`], which forwards to the system
//! allocator. Tests swap in heaps that fail on demand to exercise the
//! out-of-memory and free-failure paths of the layers above.

#![allow(unsafe_code)]

use std::alloc::{GlobalAlloc, Layout, System};
use std::ptr::NonNull;

/// A thread-safe source of raw memory.
///
/// Implementations must be safe to call from any thread without external
/// locking; the allocator adds none.
pub trait Heap: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// Allocate a zero-filled region described by `layout`.
    ///
    /// `layout.size()` is never zero. Returns `None` when the request
    /// cannot be satisfied.
    fn alloc_zeroed(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Resize the region at `ptr` to `new_size` bytes, preserving the
    /// common prefix. The grown tail is not zeroed.
    ///
    /// On `None` the original region is untouched and still owned by the
    /// caller.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this heap for `layout` and not yet
    /// freed. `new_size` must be non-zero and, rounded up to
    /// `layout.align()`, must not overflow `isize`.
    unsafe fn realloc(
        &self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>>;

    /// Release the region at `ptr`. Returns `false` if the heap reports
    /// failure.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this heap for `layout` and not yet
    /// freed. It must not be used afterwards.
    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout) -> bool;
}

/// The process-wide heap, backed by [`std::alloc::System`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessHeap;

impl Heap for ProcessHeap {
    fn name(&self) -> &str {
        "process"
    }

    fn alloc_zeroed(&self, layout: Layout) -> Option<NonNull<u8>> {
        debug_assert!(layout.size() != 0);
        // SAFETY: callers never pass a zero-sized layout (checked above in
        // debug builds and by `Allocator`, which short-circuits zero bytes).
        NonNull::new(unsafe { System.alloc_zeroed(layout) })
    }

    unsafe fn realloc(
        &self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        // SAFETY: forwarded verbatim from this method's contract, which
        // matches `GlobalAlloc::realloc`.
        NonNull::new(unsafe { System.realloc(ptr.as_ptr(), layout, new_size) })
    }

    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout) -> bool {
        // SAFETY: forwarded verbatim from this method's contract, which
        // matches `GlobalAlloc::dealloc`.
        unsafe { System.dealloc(ptr.as_ptr(), layout) };
        true
    }
}
