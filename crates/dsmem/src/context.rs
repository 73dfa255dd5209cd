//! The application-wide memory context.
//!
//! A [`MemContext`] is built once at startup and passed by reference to
//! whatever creates arrays and arenas. It owns the shared [`Allocator`] and
//! the default configurations, so components never reach for a global.

use std::sync::Arc;

use dsmem_arena::{Arena, ArenaConfig};
use dsmem_array::{ArrayConfig, DynArray, LockRegionList};
use dsmem_core::{Allocator, Heap, MemError};

/// Default configurations applied by a [`MemContext`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContextConfig {
    /// Configuration for arrays and lock-region lists.
    pub array: ArrayConfig,
    /// Configuration for arenas.
    pub arena: ArenaConfig,
}

impl ContextConfig {
    /// Check both nested configurations.
    pub fn validate(&self) -> Result<(), MemError> {
        self.array.validate()?;
        self.arena.validate()
    }
}

/// Shared allocator plus default configuration for creating containers.
#[derive(Clone, Debug)]
pub struct MemContext {
    allocator: Arc<Allocator>,
    config: ContextConfig,
}

impl MemContext {
    /// A context over the process heap with default configuration.
    pub fn new() -> Result<Self, MemError> {
        Self::with_config(ContextConfig::default())
    }

    /// A context over the process heap.
    pub fn with_config(config: ContextConfig) -> Result<Self, MemError> {
        Self::with_allocator(Arc::new(Allocator::new()), config)
    }

    /// A context over an arbitrary heap.
    pub fn with_heap(heap: Arc<dyn Heap>, config: ContextConfig) -> Result<Self, MemError> {
        Self::with_allocator(Arc::new(Allocator::with_heap(heap)), config)
    }

    /// A context sharing an existing allocator.
    pub fn with_allocator(allocator: Arc<Allocator>, config: ContextConfig) -> Result<Self, MemError> {
        config.validate()?;
        tracing::debug!(heap = allocator.heap_name(), ?config, "created memory context");
        Ok(Self { allocator, config })
    }

    /// The shared allocator.
    pub fn allocator(&self) -> &Arc<Allocator> {
        &self.allocator
    }

    /// The default configurations.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// A new array using the context's array configuration.
    pub fn array<T>(&self) -> Result<DynArray<T>, MemError> {
        DynArray::with_config(self.allocator.clone(), self.config.array)
    }

    /// A new lock-region list using the context's array configuration.
    pub fn lock_regions(&self) -> Result<LockRegionList, MemError> {
        LockRegionList::with_config(self.allocator.clone(), self.config.array)
    }

    /// A new arena using the context's arena configuration.
    pub fn arena(&self) -> Result<Arena, MemError> {
        Arena::with_config(self.allocator.clone(), self.config.arena)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsmem_array::LockRegion;
    use dsmem_test_utils::FailingHeap;

    #[test]
    fn containers_share_one_allocator() {
        let ctx = MemContext::new().unwrap();
        let arr = ctx.array::<u32>().unwrap();
        let arena = ctx.arena().unwrap();
        assert!(Arc::ptr_eq(arr.allocator(), ctx.allocator()));
        assert!(Arc::ptr_eq(arena.allocator(), ctx.allocator()));
    }

    #[test]
    fn configuration_flows_to_containers() {
        let config = ContextConfig {
            array: ArrayConfig::with_capacity(3),
            arena: ArenaConfig::with_block_size(1024),
        };
        let ctx = MemContext::with_config(config).unwrap();
        assert_eq!(ctx.array::<u8>().unwrap().capacity(), 3);
        let regions = ctx.lock_regions().unwrap();
        regions.add_region(LockRegion::new(0, 4, 1)).unwrap();
        assert_eq!(regions.count(), 1);
        let arena = ctx.arena().unwrap();
        arena.allocate(10).unwrap();
        assert_eq!(arena.stats().unwrap().reserved_bytes, 1024);
    }

    #[test]
    fn invalid_config_rejected() {
        let config = ContextConfig {
            arena: ArenaConfig::with_block_size(0),
            ..ContextConfig::default()
        };
        assert!(matches!(
            MemContext::with_config(config),
            Err(MemError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn heap_failures_reach_callers() {
        let ctx = MemContext::with_heap(
            Arc::new(FailingHeap::new().fail_allocs_after(0)),
            ContextConfig::default(),
        )
        .unwrap();
        assert!(matches!(
            ctx.array::<u64>(),
            Err(MemError::OutOfMemory { .. })
        ));
    }
}
