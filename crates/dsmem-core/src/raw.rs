//! Unsafe heap calls behind [`Allocator`](crate::Allocator).
//!
//! Every `unsafe` operation in the allocator path lives here. Each relies
//! on the [`HeapBlock`] invariant: a non-empty block's pointer was returned
//! by the heap stamped in its owner field, with layout
//! `(size, HEAP_ALIGNMENT)`, and has not been freed.

#![allow(unsafe_code)]

use std::ptr::NonNull;

use crate::allocator::{layout_for, Allocator, HeapBlock};
use crate::heap::Heap;

// SAFETY: a HeapBlock is the unique owner of its region, like `Box<[u8]>`.
// It exposes no shared interior state.
unsafe impl Send for HeapBlock {}
// SAFETY: `&HeapBlock` only exposes the base pointer and size, both plain
// values; dereferencing the pointer is already `unsafe` for the caller.
unsafe impl Sync for HeapBlock {}

impl HeapBlock {
    /// Rebuild a block from parts obtained through
    /// [`HeapBlock::into_raw_parts`].
    ///
    /// # Safety
    ///
    /// `ptr` and `size` must come from `into_raw_parts` on a block produced
    /// by an allocator sharing `owner`'s heap, and that block must not have
    /// been rebuilt already.
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, size: usize, owner: &Allocator) -> Self {
        if size == 0 {
            Self::dangling()
        } else {
            Self::new(ptr, size, owner.identity())
        }
    }
}

/// Resize a non-empty block. `block` is only read; the caller replaces it
/// on success.
pub(crate) fn heap_realloc(heap: &dyn Heap, block: &HeapBlock, new_size: usize) -> Option<NonNull<u8>> {
    debug_assert!(!block.is_empty() && new_size != 0);
    let layout = layout_for(block.size()).ok()?;
    // SAFETY: the block invariant guarantees `ptr` came from `heap` with
    // `layout`; `Allocator::reallocate` checked ownership and validated
    // `new_size` through `layout_for` before calling.
    unsafe { heap.realloc(block.as_non_null(), layout, new_size) }
}

/// Free a non-empty block, consuming it.
pub(crate) fn heap_free(heap: &dyn Heap, block: HeapBlock) -> bool {
    debug_assert!(!block.is_empty());
    let Ok(layout) = layout_for(block.size()) else {
        return false;
    };
    let (ptr, _) = block.into_raw_parts();
    // SAFETY: the block invariant guarantees `ptr` came from `heap` with
    // `layout`; the block is consumed so the pointer cannot be reused.
    unsafe { heap.free(ptr, layout) }
}
