//! Array sizing parameters.

use dsmem_core::MemError;

/// Configuration for a [`DynArray`](crate::DynArray).
///
/// Validated at construction; immutable afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArrayConfig {
    /// Number of slots allocated when the array is created.
    ///
    /// Default: 8. Zero is allowed and defers the first allocation to the
    /// first add.
    pub initial_capacity: usize,

    /// Multiplier applied to the capacity when the buffer is full.
    ///
    /// Default: 2. Must be at least 2. The grown capacity is never below
    /// the factor itself, so empty and single-slot buffers still grow.
    pub growth_factor: usize,
}

impl ArrayConfig {
    /// Default initial slot count.
    pub const DEFAULT_INITIAL_CAPACITY: usize = 8;

    /// Default growth multiplier.
    pub const DEFAULT_GROWTH_FACTOR: usize = 2;

    /// Create a config with the given initial capacity and the default
    /// growth factor.
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            ..Self::default()
        }
    }

    /// Check that every value is in range.
    pub fn validate(&self) -> Result<(), MemError> {
        if self.growth_factor < 2 {
            return Err(MemError::InvalidConfig {
                reason: format!("growth_factor must be at least 2, got {}", self.growth_factor),
            });
        }
        Ok(())
    }

    /// Capacity after one growth step from `capacity`.
    pub fn grown_capacity(&self, capacity: usize) -> Result<usize, MemError> {
        capacity
            .checked_mul(self.growth_factor)
            .map(|grown| grown.max(self.growth_factor))
            .ok_or(MemError::CapacityOverflow {
                requested: capacity,
            })
    }
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            initial_capacity: Self::DEFAULT_INITIAL_CAPACITY,
            growth_factor: Self::DEFAULT_GROWTH_FACTOR,
        }
    }
}
