//! Arena configuration parameters.

use dsmem_array::ArrayConfig;
use dsmem_core::MemError;

/// Where [`Arena::allocate`](crate::Arena::allocate) points the returned
/// address when it bumps an existing block.
///
/// Allocations that open a fresh block always return the block's base.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Placement {
    /// `block_base + new_offset`: the address just past the reserved bytes.
    ///
    /// This is the historical behaviour that existing callers depend on.
    /// The returned address is not the start of the reservation, and
    /// writing `bytes` through it may run past the block.
    #[default]
    RegionEnd,
    /// `block_base + old_offset`: the start of the reserved bytes.
    RegionStart,
}

/// Configuration for an [`Arena`](crate::Arena).
///
/// Validated at construction; immutable afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Minimum size of each block in bytes.
    ///
    /// Default: 262_144 (256 KiB). Requests larger than this get a block
    /// of exactly their own size. Must be non-zero.
    pub block_size: usize,

    /// Address placement for bump allocations. Default:
    /// [`Placement::RegionEnd`].
    pub placement: Placement,

    /// Sizing of the list that tracks blocks.
    pub block_list: ArrayConfig,
}

impl ArenaConfig {
    /// Default block size: 256 KiB.
    pub const DEFAULT_BLOCK_SIZE: usize = 256 * 1024;

    /// Create a config with the given block size and default placement.
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            block_size,
            ..Self::default()
        }
    }

    /// Check that every value is in range.
    pub fn validate(&self) -> Result<(), MemError> {
        if self.block_size == 0 {
            return Err(MemError::InvalidConfig {
                reason: "block_size must be non-zero".into(),
            });
        }
        self.block_list.validate()
    }

    /// Capacity of the block created for a `bytes` request that fits
    /// nowhere else.
    pub fn block_capacity_for(&self, bytes: usize) -> usize {
        bytes.max(self.block_size)
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            block_size: Self::DEFAULT_BLOCK_SIZE,
            placement: Placement::default(),
            block_list: ArrayConfig::default(),
        }
    }
}
