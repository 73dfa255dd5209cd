//! The thread-safe bump arena.
//!
//! [`Arena::allocate`] scans blocks first-fit in creation order and bumps
//! the first one with room; if none fits it opens a new block of
//! `max(bytes, block_size)` and serves the request from its start.
//! [`Arena::clear`] rewinds every block at once so the same address space
//! is reused on the next pass.
//!
//! The arena's mutex is held for the whole of each call, including the
//! calls it makes into its block list (which takes its own lock). The list
//! never calls back into the arena, so the two locks always nest in the
//! same order.

use std::fmt;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};

use dsmem_array::DynArray;
use dsmem_core::{Allocator, MemError};

use crate::block::Block;
use crate::config::ArenaConfig;

/// Aggregate usage across all blocks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Number of blocks.
    pub blocks: usize,
    /// Sum of block capacities in bytes.
    pub reserved_bytes: usize,
    /// Sum of bytes handed out since the last clear.
    pub used_bytes: usize,
}

/// Capacity and cursor of one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Block size in bytes.
    pub capacity: usize,
    /// Bytes handed out from the block since the last clear.
    pub used: usize,
}

/// A thread-safe bump allocator over lazily created blocks.
///
/// Addresses returned by [`allocate`](Arena::allocate) stay valid until the
/// next [`clear`](Arena::clear) or until the arena is released; access
/// through them is not synchronised by the arena. No alignment is
/// guaranteed beyond that of each block's base.
pub struct Arena {
    allocator: Arc<Allocator>,
    config: ArenaConfig,
    blocks: Mutex<DynArray<Block>>,
}

impl Arena {
    /// Create an empty arena with the default configuration.
    pub fn new(allocator: Arc<Allocator>) -> Result<Self, MemError> {
        Self::with_config(allocator, ArenaConfig::default())
    }

    /// Create an empty arena. No blocks are allocated until the first
    /// request.
    pub fn with_config(allocator: Arc<Allocator>, config: ArenaConfig) -> Result<Self, MemError> {
        config.validate()?;
        let blocks = DynArray::with_config(allocator.clone(), config.block_list)?;
        Ok(Self {
            allocator,
            config,
            blocks: Mutex::new(blocks),
        })
    }

    /// Reserve `bytes` and return an address for them.
    ///
    /// The address is placed according to
    /// [`ArenaConfig::placement`]. Fails with whatever the allocator or the
    /// block list reports when a new block is needed; in that case no
    /// block is added.
    pub fn allocate(&self, bytes: usize) -> Result<NonNull<u8>, MemError> {
        let blocks = self.blocks.lock()?;
        let placement = self.config.placement;
        if let Some(ptr) = blocks.find_map_mut(|_, block| block.bump(bytes, placement))? {
            return Ok(ptr);
        }

        let capacity = self.config.block_capacity_for(bytes);
        let mut block = Block::new(self.allocator.clone(), capacity)?;
        let ptr = block.claim_front(bytes);
        blocks.add_item(block)?;
        tracing::debug!(
            capacity,
            requested = bytes,
            blocks = blocks.get_count(),
            "created arena block"
        );
        Ok(ptr)
    }

    /// Rewind every block to empty without freeing memory.
    ///
    /// All addresses previously returned become logically invalid.
    pub fn clear(&self) -> Result<(), MemError> {
        let blocks = self.blocks.lock()?;
        blocks.for_each_mut(Block::reset)?;
        tracing::trace!(blocks = blocks.get_count(), "cleared arena");
        Ok(())
    }

    /// Number of blocks. Never fails.
    pub fn block_count(&self) -> usize {
        match self.blocks.lock() {
            Ok(blocks) => blocks.get_count(),
            Err(poisoned) => poisoned.into_inner().get_count(),
        }
    }

    /// Aggregate usage across blocks.
    pub fn stats(&self) -> Result<ArenaStats, MemError> {
        let blocks = self.blocks.lock()?;
        blocks.fold(ArenaStats::default(), |stats, block| ArenaStats {
            blocks: stats.blocks + 1,
            reserved_bytes: stats.reserved_bytes + block.capacity(),
            used_bytes: stats.used_bytes + block.used(),
        })
    }

    /// Per-block capacity and usage, in block order.
    pub fn blocks(&self) -> Result<Vec<BlockInfo>, MemError> {
        let blocks = self.blocks.lock()?;
        blocks.fold(Vec::new(), |mut infos, block| {
            infos.push(BlockInfo {
                capacity: block.capacity(),
                used: block.used(),
            });
            infos
        })
    }

    /// The configuration the arena was created with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// The allocator backing this arena.
    pub fn allocator(&self) -> &Arc<Allocator> {
        &self.allocator
    }

    /// Free every block and the block list.
    ///
    /// Every block is attempted even if an earlier free fails; the first
    /// failure is returned. Dropping the arena does the same but can only
    /// log failures.
    pub fn release(mut self) -> Result<(), MemError> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), MemError> {
        let blocks = match self.blocks.get_mut() {
            Ok(blocks) => blocks,
            Err(poisoned) => poisoned.into_inner(),
        };
        let count = blocks.get_count();
        let mut first_error = None;
        // Tail first, so every removal is a plain decrement.
        for index in (0..count).rev() {
            if let Err(e) = blocks.remove_item(index).and_then(Block::release) {
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = blocks.free_storage() {
            first_error.get_or_insert(e);
        }
        if count > 0 {
            tracing::debug!(blocks = count, "released arena");
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            tracing::warn!(error = %e, "failed to release arena on drop");
        }
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("blocks", &self.block_count())
            .field("config", &self.config)
            .finish()
    }
}
