//! Lock-region list FFI.
//!
//! Records are copied in by value and handed back as the address of the
//! stored record, which stays valid until the record is removed or a later
//! add grows the list.

use std::sync::{Arc, Mutex};

use dsmem_array::{LockRegion, LockRegionList};

use crate::allocator::get_allocator;
use crate::handle::HandleTable;
use crate::status::DsStatus;

static LOCK_REGIONS: Mutex<HandleTable<Arc<LockRegionList>>> = Mutex::new(HandleTable::new());

fn get_list(handle: u64) -> Option<Arc<LockRegionList>> {
    LOCK_REGIONS.lock().ok()?.get(handle).cloned()
}

/// Create an empty lock-region list over `alloc`. Returns its handle via
/// `out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_lock_regions_create(alloc: u64, out: *mut u64) -> i32 {
    ffi_guard!({
        if out.is_null() {
            return DsStatus::InvalidArgument as i32;
        }
        let Some(allocator) = get_allocator(alloc) else {
            return DsStatus::InvalidArgument as i32;
        };
        let list = match LockRegionList::new(allocator) {
            Ok(list) => list,
            Err(e) => return DsStatus::from(&e) as i32,
        };
        let handle = ffi_lock!(LOCK_REGIONS).insert(Arc::new(list));
        // SAFETY: `out` is non-null and valid per caller contract.
        unsafe { *out = handle };
        DsStatus::Ok as i32
    })
}

/// Copy `*region` into the list.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_lock_regions_add(list: u64, region: *const LockRegion) -> i32 {
    ffi_guard!({
        let Some(regions) = get_list(list) else {
            return DsStatus::InvalidPointer as i32;
        };
        if region.is_null() {
            return DsStatus::InvalidArgument as i32;
        }
        // SAFETY: `region` is non-null and points to a readable record per
        // caller contract; the record is plain data.
        let record = unsafe { region.read_unaligned() };
        match regions.add_region(record) {
            Ok(()) => DsStatus::Ok as i32,
            Err(e) => DsStatus::from(&e) as i32,
        }
    })
}

/// Write the address of the stored record at `index` to `out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_lock_regions_get(list: u64, index: usize, out: *mut *mut LockRegion) -> i32 {
    ffi_guard!({
        let Some(regions) = get_list(list) else {
            return DsStatus::InvalidPointer as i32;
        };
        if out.is_null() {
            return DsStatus::InvalidArgument as i32;
        }
        match regions.region_ptr(index) {
            Ok(record) => {
                // SAFETY: `out` is non-null and valid per caller contract.
                unsafe { *out = record.as_ptr() };
                DsStatus::Ok as i32
            }
            Err(e) => DsStatus::from(&e) as i32,
        }
    })
}

/// Remove the record at `index`, copying it to `out` unless `out` is null.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_lock_regions_remove(list: u64, index: usize, out: *mut LockRegion) -> i32 {
    ffi_guard!({
        let Some(regions) = get_list(list) else {
            return DsStatus::InvalidPointer as i32;
        };
        match regions.remove_region(index) {
            Ok(record) => {
                if !out.is_null() {
                    // SAFETY: `out` is non-null and writable per caller
                    // contract.
                    unsafe { out.write_unaligned(record) };
                }
                DsStatus::Ok as i32
            }
            Err(e) => DsStatus::from(&e) as i32,
        }
    })
}

/// Number of records, or 0 for a null or released handle.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_lock_regions_count(list: u64) -> usize {
    ffi_guard!(0, { get_list(list).map_or(0, |regions| regions.count()) })
}

/// Release the list and free its storage.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_lock_regions_release(list: u64) -> i32 {
    ffi_guard!({
        let Some(regions) = ffi_lock!(LOCK_REGIONS).remove(list) else {
            return DsStatus::InvalidPointer as i32;
        };
        match Arc::try_unwrap(regions) {
            Ok(regions) => match regions.release() {
                Ok(()) => DsStatus::Ok as i32,
                Err(e) => DsStatus::from(&e) as i32,
            },
            Err(_) => DsStatus::Ok as i32,
        }
    })
}
