//! Zero-initialising allocator over a [`Heap`].
//!
//! [`Allocator`] is the single origin of memory for every other dsmem
//! component. It validates arguments, converts byte counts to layouts at
//! [`HEAP_ALIGNMENT`], and reports failures as [`MemError`] values. It takes
//! no locks: concurrent callers rely on the heap's own thread safety.

use std::alloc::Layout;
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::MemError;
use crate::heap::{Heap, ProcessHeap};
use crate::raw;

/// Alignment of every region handed out by [`Allocator`], in bytes.
///
/// Matches the allocation granularity of the process heap on 64-bit
/// targets.
pub const HEAP_ALIGNMENT: usize = 16;

#[repr(align(16))]
struct HeapAligned;

const _: () = assert!(std::mem::align_of::<HeapAligned>() == HEAP_ALIGNMENT);

/// An owned region of heap memory.
///
/// A block does not free itself: it must be handed back to the
/// [`Allocator`] that produced it. Zero-sized blocks are dangling and never
/// touch the heap.
#[must_use = "a HeapBlock leaks unless it is passed to Allocator::free"]
pub struct HeapBlock {
    ptr: NonNull<u8>,
    size: usize,
    /// Identity of the heap that produced this block; zero for dangling
    /// blocks, which any allocator may free.
    owner: usize,
}

impl HeapBlock {
    /// A zero-sized block aligned to [`HEAP_ALIGNMENT`].
    pub fn dangling() -> Self {
        Self {
            ptr: NonNull::<HeapAligned>::dangling().cast(),
            size: 0,
            owner: 0,
        }
    }

    pub(crate) fn new(ptr: NonNull<u8>, size: usize, owner: usize) -> Self {
        Self { ptr, size, owner }
    }

    /// Base address of the region.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Base address of the region as a `NonNull`.
    pub fn as_non_null(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Size of the region in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the region is zero-sized.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub(crate) fn owner(&self) -> usize {
        self.owner
    }

    /// Split the block into its base pointer and size, giving up ownership.
    ///
    /// Rebuild it with [`HeapBlock::from_raw_parts`] before freeing.
    pub fn into_raw_parts(self) -> (NonNull<u8>, usize) {
        (self.ptr, self.size)
    }
}

impl fmt::Debug for HeapBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapBlock")
            .field("ptr", &self.ptr)
            .field("size", &self.size)
            .finish()
    }
}

/// Snapshot of an allocator's operation counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Successful allocations, including zero-byte ones.
    pub allocations: u64,
    /// Successful reallocations.
    pub reallocations: u64,
    /// Successful frees of non-empty blocks.
    pub frees: u64,
    /// Allocations, reallocations, or frees the heap refused.
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    allocations: AtomicU64,
    reallocations: AtomicU64,
    frees: AtomicU64,
    failures: AtomicU64,
}

/// Zero-initialising heap allocator shared by arrays, arenas, and blocks.
pub struct Allocator {
    heap: Arc<dyn Heap>,
    counters: Counters,
}

impl Allocator {
    /// Create an allocator over the process heap.
    pub fn new() -> Self {
        Self::with_heap(Arc::new(ProcessHeap))
    }

    /// Create an allocator over an arbitrary heap.
    pub fn with_heap(heap: Arc<dyn Heap>) -> Self {
        Self {
            heap,
            counters: Counters::default(),
        }
    }

    /// Name of the underlying heap.
    pub fn heap_name(&self) -> &str {
        self.heap.name()
    }

    /// Allocate `bytes` of zero-filled memory.
    ///
    /// Zero bytes yields a dangling block without calling the heap.
    pub fn allocate(&self, bytes: usize) -> Result<HeapBlock, MemError> {
        if bytes == 0 {
            self.counters.allocations.fetch_add(1, Ordering::Relaxed);
            return Ok(HeapBlock::dangling());
        }
        let layout = layout_for(bytes)?;
        match self.heap.alloc_zeroed(layout) {
            Some(ptr) => {
                self.counters.allocations.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(heap = self.heap.name(), bytes, "allocated");
                Ok(HeapBlock::new(ptr, bytes, self.identity()))
            }
            None => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                Err(MemError::OutOfMemory { requested: bytes })
            }
        }
    }

    /// Resize `block` to `bytes`, preserving its common prefix.
    ///
    /// The grown tail is not zeroed. On error `block` is left exactly as it
    /// was and remains owned by the caller. Resizing an empty block is a
    /// fresh (zeroed) allocation; resizing to zero frees the region and
    /// leaves a dangling block behind.
    pub fn reallocate(&self, block: &mut HeapBlock, bytes: usize) -> Result<(), MemError> {
        self.check_owner(block)?;
        if block.is_empty() {
            *block = self.allocate(bytes)?;
            return Ok(());
        }
        if bytes == 0 {
            let old = std::mem::replace(block, HeapBlock::dangling());
            return self.free(old);
        }
        layout_for(bytes)?;
        match raw::heap_realloc(self.heap.as_ref(), block, bytes) {
            Some(ptr) => {
                self.counters.reallocations.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(
                    heap = self.heap.name(),
                    from = block.size,
                    to = bytes,
                    "reallocated"
                );
                *block = HeapBlock::new(ptr, bytes, self.identity());
                Ok(())
            }
            None => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                Err(MemError::OutOfMemory { requested: bytes })
            }
        }
    }

    /// Return `block` to the heap.
    ///
    /// Empty blocks are a successful no-op. A heap-reported failure surfaces
    /// as [`MemError::HeapFreeFailed`]; the region is considered lost.
    pub fn free(&self, block: HeapBlock) -> Result<(), MemError> {
        self.check_owner(&block)?;
        if block.is_empty() {
            return Ok(());
        }
        let size = block.size;
        if raw::heap_free(self.heap.as_ref(), block) {
            self.counters.frees.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(heap = self.heap.name(), bytes = size, "freed");
            Ok(())
        } else {
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
            Err(MemError::HeapFreeFailed { size })
        }
    }

    /// Current operation counters.
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            allocations: self.counters.allocations.load(Ordering::Relaxed),
            reallocations: self.counters.reallocations.load(Ordering::Relaxed),
            frees: self.counters.frees.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Identity stamped on blocks from this allocator's heap. Allocators
    /// sharing one heap share an identity.
    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.heap) as *const () as usize
    }

    fn check_owner(&self, block: &HeapBlock) -> Result<(), MemError> {
        if block.is_empty() || block.owner() == self.identity() {
            Ok(())
        } else {
            Err(MemError::InvalidArgument {
                reason: "block was allocated from a different heap",
            })
        }
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Allocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocator")
            .field("heap", &self.heap.name())
            .field("stats", &self.stats())
            .finish()
    }
}

pub(crate) fn layout_for(bytes: usize) -> Result<Layout, MemError> {
    Layout::from_size_align(bytes, HEAP_ALIGNMENT)
        .map_err(|_| MemError::CapacityOverflow { requested: bytes })
}
