//! Contiguous arena blocks with bump allocation.
//!
//! A [`Block`] is one heap region plus a cursor (`used`) that only moves
//! forward until the arena resets it. Blocks are never freed while the
//! arena is live.

use std::fmt;
use std::mem;
use std::ptr::NonNull;
use std::sync::Arc;

use dsmem_core::{Allocator, HeapBlock, MemError};

use crate::config::Placement;

/// A single contiguous region subdivided by bump allocation.
///
/// Invariant: `used() <= capacity()`.
pub struct Block {
    allocator: Arc<Allocator>,
    region: HeapBlock,
    used: usize,
}

impl Block {
    /// Allocate a zeroed block of `capacity` bytes.
    pub fn new(allocator: Arc<Allocator>, capacity: usize) -> Result<Self, MemError> {
        let region = allocator.allocate(capacity)?;
        Ok(Self {
            allocator,
            region,
            used: 0,
        })
    }

    /// Total size of the block in bytes.
    pub fn capacity(&self) -> usize {
        self.region.size()
    }

    /// Bytes handed out since creation or the last reset.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Bytes not yet handed out.
    pub fn remaining(&self) -> usize {
        self.capacity() - self.used
    }

    /// Base address of the block.
    pub fn base(&self) -> NonNull<u8> {
        self.region.as_non_null()
    }

    /// Whether a `bytes` request is served from this block.
    ///
    /// The remaining room must strictly exceed the request, so a block is
    /// never bumped to exactly full.
    pub fn fits(&self, bytes: usize) -> bool {
        self.remaining() > bytes
    }

    /// Reserve `bytes` if they fit, returning the address chosen by
    /// `placement`.
    pub fn bump(&mut self, bytes: usize, placement: Placement) -> Option<NonNull<u8>> {
        if !self.fits(bytes) {
            return None;
        }
        let start = self.used;
        self.used += bytes;
        let offset = match placement {
            Placement::RegionEnd => self.used,
            Placement::RegionStart => start,
        };
        Some(self.address_at(offset))
    }

    /// Reserve the first `bytes` of a fresh block and return its base.
    ///
    /// Used when a request opens a new block, which may be sized exactly to
    /// the request.
    pub fn claim_front(&mut self, bytes: usize) -> NonNull<u8> {
        debug_assert!(self.used == 0 && bytes <= self.capacity());
        self.used = bytes.min(self.capacity());
        self.base()
    }

    /// Rewind the cursor to zero without freeing or zeroing memory.
    ///
    /// Every address handed out from this block becomes logically invalid.
    pub fn reset(&mut self) {
        self.used = 0;
    }

    /// Free the block's region, reporting a heap failure.
    ///
    /// Dropping a block does the same but can only log the failure.
    pub fn release(mut self) -> Result<(), MemError> {
        self.free_region()
    }

    fn free_region(&mut self) -> Result<(), MemError> {
        let region = mem::replace(&mut self.region, HeapBlock::dangling());
        self.used = 0;
        self.allocator.free(region)
    }

    fn address_at(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset <= self.capacity());
        // `offset <= capacity`, so the address stays within (or one past)
        // the region and cannot wrap to null.
        NonNull::new(self.region.as_ptr().wrapping_add(offset)).unwrap_or(self.base())
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        if let Err(e) = self.free_region() {
            tracing::warn!(error = %e, "failed to free arena block on drop");
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("capacity", &self.capacity())
            .field("used", &self.used)
            .finish()
    }
}
