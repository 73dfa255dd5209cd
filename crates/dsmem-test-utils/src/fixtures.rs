//! Reusable heap fixtures.
//!
//! - [`FailingHeap`]: delegates to the process heap until a configured
//!   budget runs out, then fails deterministically.
//! - [`process_allocator`] / [`failing_allocator`]: shared allocators for
//!   tests that just need one.

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dsmem_core::{Allocator, Heap, ProcessHeap};

/// A heap that succeeds a fixed number of times per operation, then fails.
///
/// Budgets are independent: `fail_allocs_after(2)` lets two allocations
/// through and refuses every later one, regardless of reallocations.
/// Frees that "fail" leak the region, which is acceptable in tests.
pub struct FailingHeap {
    alloc_budget: AtomicUsize,
    realloc_budget: AtomicUsize,
    fail_frees: bool,
    allocs: AtomicUsize,
    reallocs: AtomicUsize,
    frees: AtomicUsize,
}

impl FailingHeap {
    /// A heap with unlimited budgets (behaves like the process heap).
    pub fn new() -> Self {
        Self {
            alloc_budget: AtomicUsize::new(usize::MAX),
            realloc_budget: AtomicUsize::new(usize::MAX),
            fail_frees: false,
            allocs: AtomicUsize::new(0),
            reallocs: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
        }
    }

    /// Allow `n` successful allocations, then fail.
    pub fn fail_allocs_after(self, n: usize) -> Self {
        self.alloc_budget.store(n, Ordering::SeqCst);
        self
    }

    /// Allow `n` successful reallocations, then fail.
    pub fn fail_reallocs_after(self, n: usize) -> Self {
        self.realloc_budget.store(n, Ordering::SeqCst);
        self
    }

    /// Report failure on every free.
    pub fn fail_frees(mut self) -> Self {
        self.fail_frees = true;
        self
    }

    /// Allocation attempts seen so far, successful or not.
    pub fn alloc_attempts(&self) -> usize {
        self.allocs.load(Ordering::SeqCst)
    }

    /// Reallocation attempts seen so far, successful or not.
    pub fn realloc_attempts(&self) -> usize {
        self.reallocs.load(Ordering::SeqCst)
    }

    /// Free attempts seen so far, successful or not.
    pub fn free_attempts(&self) -> usize {
        self.frees.load(Ordering::SeqCst)
    }

    fn take(budget: &AtomicUsize) -> bool {
        budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok()
    }
}

impl Default for FailingHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap for FailingHeap {
    fn name(&self) -> &str {
        "failing"
    }

    fn alloc_zeroed(&self, layout: Layout) -> Option<NonNull<u8>> {
        self.allocs.fetch_add(1, Ordering::SeqCst);
        if !Self::take(&self.alloc_budget) {
            return None;
        }
        ProcessHeap.alloc_zeroed(layout)
    }

    #[allow(unsafe_code)]
    unsafe fn realloc(
        &self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        self.reallocs.fetch_add(1, Ordering::SeqCst);
        if !Self::take(&self.realloc_budget) {
            return None;
        }
        // SAFETY: every region this heap hands out comes from ProcessHeap,
        // and the caller upholds the rest of the contract.
        unsafe { ProcessHeap.realloc(ptr, layout, new_size) }
    }

    #[allow(unsafe_code)]
    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout) -> bool {
        self.frees.fetch_add(1, Ordering::SeqCst);
        if self.fail_frees {
            return false;
        }
        // SAFETY: as for `realloc`.
        unsafe { ProcessHeap.free(ptr, layout) }
    }
}

/// A fresh allocator over the process heap.
pub fn process_allocator() -> Arc<Allocator> {
    Arc::new(Allocator::new())
}

/// An allocator over `heap`, returning both so tests can inspect the heap.
pub fn failing_allocator(heap: FailingHeap) -> (Arc<Allocator>, Arc<FailingHeap>) {
    let heap = Arc::new(heap);
    let allocator = Arc::new(Allocator::with_heap(heap.clone()));
    (allocator, heap)
}
