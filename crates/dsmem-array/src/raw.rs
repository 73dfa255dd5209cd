//! Typed slot storage over a [`HeapBlock`].
//!
//! [`SlotBuffer`] is the only place the array crate touches raw memory.
//! It tracks how many leading slots are initialised, so every method can
//! stay safe: slots `0..len` hold live values, slots `len..capacity` are
//! uninitialised.

#![allow(unsafe_code)]

use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};
use std::slice;

use dsmem_core::{Allocator, HeapBlock, MemError};

pub(crate) struct SlotBuffer<T> {
    block: HeapBlock,
    capacity: usize,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T> SlotBuffer<T> {
    /// Allocate room for `capacity` elements.
    ///
    /// The caller guarantees `align_of::<T>() <= HEAP_ALIGNMENT`.
    pub fn with_capacity(allocator: &Allocator, capacity: usize) -> Result<Self, MemError> {
        let block = allocator.allocate(bytes_for::<T>(capacity)?)?;
        Ok(Self {
            block,
            capacity,
            len: 0,
            _marker: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grow to `new_capacity` slots. On error nothing changes.
    pub fn grow(&mut self, allocator: &Allocator, new_capacity: usize) -> Result<(), MemError> {
        debug_assert!(new_capacity > self.capacity);
        allocator.reallocate(&mut self.block, bytes_for::<T>(new_capacity)?)?;
        self.capacity = new_capacity;
        Ok(())
    }

    /// Append `item`.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is full; callers grow first.
    pub fn push(&mut self, item: T) {
        assert!(self.len < self.capacity, "push into a full SlotBuffer");
        // SAFETY: `len < capacity`, so the slot lies inside the block and
        // is uninitialised; the block is aligned for `T`.
        unsafe { self.base().add(self.len).write(item) };
        self.len += 1;
    }

    pub fn as_slice(&self) -> &[T] {
        // SAFETY: slots `0..len` are initialised and the base pointer is
        // non-null and aligned even when the block is empty.
        unsafe { slice::from_raw_parts(self.base(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as for `as_slice`; `&mut self` gives exclusive access.
        unsafe { slice::from_raw_parts_mut(self.base(), self.len) }
    }

    /// Address of the live element at `index`.
    pub fn ptr_at(&mut self, index: usize) -> Option<NonNull<T>> {
        self.as_mut_slice().get_mut(index).map(NonNull::from)
    }

    /// Move out the element at `index`, shifting the suffix left one slot.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }
        let tail = self.len - index - 1;
        // SAFETY: `index < len`, so the slot is initialised. After the read
        // the slot is logically vacated and immediately overwritten by the
        // suffix move (`ptr::copy` tolerates the overlap), then `len`
        // shrinks so the stale last slot is no longer considered live.
        unsafe {
            let hole = self.base().add(index);
            let item = ptr::read(hole);
            if tail > 0 {
                ptr::copy(hole.add(1), hole, tail);
            }
            self.len -= 1;
            Some(item)
        }
    }

    /// Drop every element and return the block to `allocator`.
    ///
    /// Leaves an empty, zero-capacity buffer, so calling it again is a
    /// no-op.
    pub fn release(&mut self, allocator: &Allocator) -> Result<(), MemError> {
        let live = self.len;
        // Elements are forgotten before dropping so a panicking destructor
        // cannot cause a double drop.
        self.len = 0;
        // SAFETY: slots `0..live` were initialised and are no longer
        // reachable through `self`.
        unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.base(), live)) };
        let block = mem::replace(&mut self.block, HeapBlock::dangling());
        self.capacity = 0;
        allocator.free(block)
    }

    fn base(&self) -> *mut T {
        self.block.as_ptr().cast::<T>()
    }
}

fn bytes_for<T>(capacity: usize) -> Result<usize, MemError> {
    mem::size_of::<T>()
        .checked_mul(capacity)
        .filter(|&bytes| bytes <= isize::MAX as usize)
        .ok_or(MemError::CapacityOverflow {
            requested: capacity,
        })
}
