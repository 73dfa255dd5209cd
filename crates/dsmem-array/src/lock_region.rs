//! Fixed-size lock-region records and the collection that tracks them.
//!
//! When a client locks part of a sound buffer it receives a pointer into
//! the buffer's memory; the buffer records `(offset, size, address)` for
//! every outstanding lock so it can validate and undo them on unlock. The
//! records are stored by value in a [`DynArray`], so the C surface can hand
//! out the address of a record in place.

use std::ptr::NonNull;
use std::sync::Arc;

use dsmem_core::{Allocator, MemError};

use crate::config::ArrayConfig;
use crate::dyn_array::DynArray;

/// One locked byte range of a buffer.
///
/// `#[repr(C)]` so C callers can read records in place.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LockRegion {
    /// Byte offset of the range within the buffer.
    pub offset: u32,
    /// Length of the range in bytes.
    pub size: u32,
    /// Address handed to the client for this range.
    pub addr: usize,
}

impl LockRegion {
    /// Create a record.
    pub fn new(offset: u32, size: u32, addr: usize) -> Self {
        Self { offset, size, addr }
    }

    /// One past the last byte offset covered.
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.size)
    }

    /// Whether `[offset, offset + size)` intersects this range. Empty
    /// ranges intersect nothing.
    pub fn overlaps(&self, offset: u32, size: u32) -> bool {
        if size == 0 || self.size == 0 {
            return false;
        }
        let other_end = u64::from(offset) + u64::from(size);
        u64::from(self.offset) < other_end && u64::from(offset) < self.end()
    }
}

/// Insertion-ordered collection of outstanding [`LockRegion`]s.
#[derive(Debug)]
pub struct LockRegionList {
    regions: DynArray<LockRegion>,
}

impl LockRegionList {
    /// Create an empty list with the default array configuration.
    pub fn new(allocator: Arc<Allocator>) -> Result<Self, MemError> {
        Self::with_config(allocator, ArrayConfig::default())
    }

    /// Create an empty list with an explicit array configuration.
    pub fn with_config(allocator: Arc<Allocator>, config: ArrayConfig) -> Result<Self, MemError> {
        Ok(Self {
            regions: DynArray::with_config(allocator, config)?,
        })
    }

    /// Record a region, copying it into the list.
    pub fn add_region(&self, region: LockRegion) -> Result<(), MemError> {
        self.regions.add_item(region)
    }

    /// Copy of the region at `index`.
    pub fn region(&self, index: usize) -> Result<LockRegion, MemError> {
        self.regions.get_item(index)
    }

    /// Address of the record at `index` inside the backing buffer.
    ///
    /// Invalidated by the next add that grows the list or by removing the
    /// record.
    pub fn region_ptr(&self, index: usize) -> Result<NonNull<LockRegion>, MemError> {
        self.regions.item_ptr(index)
    }

    /// Remove and return the region at `index`.
    pub fn remove_region(&self, index: usize) -> Result<LockRegion, MemError> {
        self.regions.remove_item(index)
    }

    /// Number of outstanding regions.
    pub fn count(&self) -> usize {
        self.regions.get_count()
    }

    /// Index of the region whose client address is `addr`.
    pub fn find_by_addr(&self, addr: usize) -> Result<Option<usize>, MemError> {
        self.regions.position(|region| region.addr == addr)
    }

    /// Index of the first region intersecting `[offset, offset + size)`.
    pub fn overlapping(&self, offset: u32, size: u32) -> Result<Option<usize>, MemError> {
        self.regions.position(|region| region.overlaps(offset, size))
    }

    /// Total bytes covered by outstanding regions.
    pub fn locked_bytes(&self) -> Result<u64, MemError> {
        self.regions
            .fold(0, |total, region| total + u64::from(region.size))
    }

    /// Free the list, reporting free failures.
    pub fn release(self) -> Result<(), MemError> {
        self.regions.release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> LockRegionList {
        LockRegionList::new(Arc::new(Allocator::new())).unwrap()
    }

    #[test]
    fn regions_are_copied_by_value() {
        let regions = list();
        let mut region = LockRegion::new(0, 128, 0x1000);
        regions.add_region(region).unwrap();
        region.size = 1;
        assert_eq!(regions.region(0).unwrap().size, 128);
    }

    #[test]
    fn region_ptr_aliases_stored_record() {
        let regions = list();
        regions.add_region(LockRegion::new(64, 32, 0x2000)).unwrap();
        let ptr = regions.region_ptr(0).unwrap();
        #[allow(unsafe_code)]
        let seen = unsafe { *ptr.as_ptr() };
        assert_eq!(seen, LockRegion::new(64, 32, 0x2000));
    }

    #[test]
    fn find_and_remove_by_address() {
        let regions = list();
        regions.add_region(LockRegion::new(0, 100, 0xA000)).unwrap();
        regions.add_region(LockRegion::new(100, 50, 0xB000)).unwrap();
        regions.add_region(LockRegion::new(150, 10, 0xC000)).unwrap();
        let index = regions.find_by_addr(0xB000).unwrap().unwrap();
        assert_eq!(index, 1);
        regions.remove_region(index).unwrap();
        assert_eq!(regions.count(), 2);
        assert_eq!(regions.region(1).unwrap().addr, 0xC000);
        assert_eq!(regions.find_by_addr(0xB000).unwrap(), None);
    }

    #[test]
    fn overlap_detection() {
        let region = LockRegion::new(100, 50, 0);
        assert!(region.overlaps(120, 10));
        assert!(region.overlaps(90, 20));
        assert!(!region.overlaps(150, 10));
        assert!(!region.overlaps(0, 100));
        assert!(!region.overlaps(120, 0));

        let regions = list();
        regions.add_region(region).unwrap();
        assert_eq!(regions.overlapping(149, 1).unwrap(), Some(0));
        assert_eq!(regions.overlapping(150, 1).unwrap(), None);
    }

    #[test]
    fn end_does_not_overflow() {
        let region = LockRegion::new(u32::MAX, u32::MAX, 0);
        assert_eq!(region.end(), 2 * u64::from(u32::MAX));
    }

    #[test]
    fn locked_bytes_sums_sizes() {
        let regions = list();
        regions.add_region(LockRegion::new(0, 10, 1)).unwrap();
        regions.add_region(LockRegion::new(10, 20, 2)).unwrap();
        assert_eq!(regions.locked_bytes().unwrap(), 30);
        regions.release().unwrap();
    }
}
