//! The thread-safe growable array.
//!
//! [`DynArray`] keeps elements in insertion order in one contiguous buffer.
//! Appends are amortised O(1): when the buffer is full it is reallocated at
//! `capacity * growth_factor` slots. Removal keeps order by shifting the
//! suffix left, so it costs O(n) for interior indices and O(1) at the tail.
//! The buffer never shrinks.
//!
//! Each public method takes the array's mutex for its whole duration and
//! releases it on every exit path. The mutex is not reentrant: closures
//! passed to [`DynArray::with_item`] and friends must not call back into the
//! same array.

use std::fmt;
use std::mem;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};

use dsmem_core::{Allocator, MemError, HEAP_ALIGNMENT};

use crate::config::ArrayConfig;
use crate::raw::SlotBuffer;

/// A thread-safe, insertion-ordered, resizable sequence of `T`.
///
/// The backing buffer is allocated from a shared [`Allocator`]; the array
/// holds a reference to it, not exclusive ownership. The array is `Sync`
/// whenever `T: Send`.
pub struct DynArray<T> {
    allocator: Arc<Allocator>,
    config: ArrayConfig,
    slots: Mutex<SlotBuffer<T>>,
}

impl<T> DynArray<T> {
    /// Create an array with the default configuration (8 slots, doubling).
    pub fn new(allocator: Arc<Allocator>) -> Result<Self, MemError> {
        Self::with_config(allocator, ArrayConfig::default())
    }

    /// Create an array with an explicit configuration.
    ///
    /// Fails with [`MemError::InvalidConfig`] for an out-of-range config,
    /// [`MemError::UnsupportedAlignment`] if `T` needs more than
    /// [`HEAP_ALIGNMENT`], or whatever the allocator reports for the
    /// initial buffer.
    pub fn with_config(allocator: Arc<Allocator>, config: ArrayConfig) -> Result<Self, MemError> {
        config.validate()?;
        if mem::align_of::<T>() > HEAP_ALIGNMENT {
            return Err(MemError::UnsupportedAlignment {
                align: mem::align_of::<T>(),
                max: HEAP_ALIGNMENT,
            });
        }
        let slots = SlotBuffer::with_capacity(&allocator, config.initial_capacity)?;
        Ok(Self {
            allocator,
            config,
            slots: Mutex::new(slots),
        })
    }

    /// Append `item` at the tail, growing the buffer if it is full.
    ///
    /// If growing fails the error is returned, the count is unchanged, and
    /// `item` is dropped.
    pub fn add_item(&self, item: T) -> Result<(), MemError> {
        let mut slots = self.slots.lock()?;
        if slots.len() + 1 > slots.capacity() {
            let grown = self.config.grown_capacity(slots.capacity())?;
            tracing::debug!(
                from = slots.capacity(),
                to = grown,
                elem_bytes = mem::size_of::<T>(),
                "growing array buffer"
            );
            slots.grow(&self.allocator, grown)?;
        }
        slots.push(item);
        Ok(())
    }

    /// Clone of the element at `index`.
    pub fn get_item(&self, index: usize) -> Result<T, MemError>
    where
        T: Clone,
    {
        self.with_item(index, T::clone)
    }

    /// Run `f` on the element at `index` while holding the lock.
    pub fn with_item<R>(&self, index: usize, f: impl FnOnce(&T) -> R) -> Result<R, MemError> {
        let slots = self.slots.lock()?;
        let count = slots.len();
        slots
            .as_slice()
            .get(index)
            .map(f)
            .ok_or(MemError::IndexOutOfRange { index, count })
    }

    /// Run `f` on the element at `index` mutably while holding the lock.
    pub fn with_item_mut<R>(
        &self,
        index: usize,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, MemError> {
        let mut slots = self.slots.lock()?;
        let count = slots.len();
        slots
            .as_mut_slice()
            .get_mut(index)
            .map(f)
            .ok_or(MemError::IndexOutOfRange { index, count })
    }

    /// Address of the element at `index` inside the backing buffer.
    ///
    /// The pointer is a live alias: it is valid until the element is
    /// removed or the buffer grows, and access through it is not protected
    /// by the array's lock. Dereferencing it is the caller's `unsafe`
    /// responsibility.
    pub fn item_ptr(&self, index: usize) -> Result<NonNull<T>, MemError> {
        let mut slots = self.slots.lock()?;
        let count = slots.len();
        slots
            .ptr_at(index)
            .ok_or(MemError::IndexOutOfRange { index, count })
    }

    /// Remove and return the element at `index`, preserving the order of
    /// the remaining elements.
    pub fn remove_item(&self, index: usize) -> Result<T, MemError> {
        let mut slots = self.slots.lock()?;
        let count = slots.len();
        slots
            .remove(index)
            .ok_or(MemError::IndexOutOfRange { index, count })
    }

    /// Number of elements.
    ///
    /// Never fails: a poisoned lock still reports the count it guards.
    pub fn get_count(&self) -> usize {
        match self.slots.lock() {
            Ok(slots) => slots.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Whether the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.get_count() == 0
    }

    /// Number of slots in the backing buffer.
    pub fn capacity(&self) -> usize {
        match self.slots.lock() {
            Ok(slots) => slots.capacity(),
            Err(poisoned) => poisoned.into_inner().capacity(),
        }
    }

    /// The configuration the array was created with.
    pub fn config(&self) -> &ArrayConfig {
        &self.config
    }

    /// The allocator backing this array.
    pub fn allocator(&self) -> &Arc<Allocator> {
        &self.allocator
    }

    /// Index of the first element matching `pred`.
    pub fn position(&self, pred: impl FnMut(&T) -> bool) -> Result<Option<usize>, MemError> {
        let slots = self.slots.lock()?;
        Ok(slots.as_slice().iter().position(pred))
    }

    /// Visit elements in order, mutably, stopping at the first `Some`.
    ///
    /// The whole scan is one critical section.
    pub fn find_map_mut<R>(
        &self,
        mut f: impl FnMut(usize, &mut T) -> Option<R>,
    ) -> Result<Option<R>, MemError> {
        let mut slots = self.slots.lock()?;
        Ok(slots
            .as_mut_slice()
            .iter_mut()
            .enumerate()
            .find_map(|(index, item)| f(index, item)))
    }

    /// Visit every element in order, mutably, in one critical section.
    pub fn for_each_mut(&self, mut f: impl FnMut(&mut T)) -> Result<(), MemError> {
        let mut slots = self.slots.lock()?;
        slots.as_mut_slice().iter_mut().for_each(|item| f(item));
        Ok(())
    }

    /// Fold over the elements in order in one critical section.
    pub fn fold<B>(&self, init: B, f: impl FnMut(B, &T) -> B) -> Result<B, MemError> {
        let slots = self.slots.lock()?;
        Ok(slots.as_slice().iter().fold(init, f))
    }

    /// Snapshot of the elements in order.
    pub fn to_vec(&self) -> Result<Vec<T>, MemError>
    where
        T: Clone,
    {
        let slots = self.slots.lock()?;
        Ok(slots.as_slice().to_vec())
    }

    /// Drop every element and free the buffer, reporting free failures.
    ///
    /// Dropping the array does the same but can only log a failure.
    pub fn release(mut self) -> Result<(), MemError> {
        self.teardown()
    }

    /// Drop every element and free the buffer in place.
    ///
    /// The array stays usable with zero capacity; the next add allocates a
    /// fresh buffer. Used by owners that hold the array behind their own
    /// lock and cannot move it out.
    pub fn free_storage(&mut self) -> Result<(), MemError> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), MemError> {
        let slots = match self.slots.get_mut() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.release(&self.allocator)
    }
}

impl<T> Drop for DynArray<T> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            tracing::warn!(error = %e, "failed to free array buffer on drop");
        }
    }
}

impl<T> fmt::Debug for DynArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynArray")
            .field("count", &self.get_count())
            .field("capacity", &self.capacity())
            .field("config", &self.config)
            .finish()
    }
}
