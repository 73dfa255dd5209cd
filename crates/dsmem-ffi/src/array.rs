//! Opaque-pointer array FFI.
//!
//! The C array stores caller pointers it never dereferences. Internally it
//! is a [`DynArray`] of non-null addresses; null items are rejected at the
//! boundary.

use std::ffi::c_void;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use dsmem_array::DynArray;

use crate::allocator::get_allocator;
use crate::handle::HandleTable;
use crate::status::DsStatus;

type PtrArray = Arc<DynArray<NonZeroUsize>>;

static ARRAYS: Mutex<HandleTable<PtrArray>> = Mutex::new(HandleTable::new());

fn get_array(handle: u64) -> Option<PtrArray> {
    ARRAYS.lock().ok()?.get(handle).cloned()
}

/// Create an empty array over `alloc`. Returns its handle via `out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_array_create(alloc: u64, out: *mut u64) -> i32 {
    ffi_guard!({
        if out.is_null() {
            return DsStatus::InvalidArgument as i32;
        }
        let Some(allocator) = get_allocator(alloc) else {
            return DsStatus::InvalidArgument as i32;
        };
        let array = match DynArray::new(allocator) {
            Ok(array) => array,
            Err(e) => return DsStatus::from(&e) as i32,
        };
        let handle = ffi_lock!(ARRAYS).insert(Arc::new(array));
        // SAFETY: `out` is non-null and valid per caller contract.
        unsafe { *out = handle };
        DsStatus::Ok as i32
    })
}

/// Append `item` at the tail.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_array_add_item(arr: u64, item: *mut c_void) -> i32 {
    ffi_guard!({
        let Some(array) = get_array(arr) else {
            return DsStatus::InvalidPointer as i32;
        };
        let Some(addr) = NonZeroUsize::new(item as usize) else {
            return DsStatus::InvalidArgument as i32;
        };
        match array.add_item(addr) {
            Ok(()) => DsStatus::Ok as i32,
            Err(e) => DsStatus::from(&e) as i32,
        }
    })
}

/// Write the item at `index` to `out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_array_get_item(arr: u64, index: usize, out: *mut *mut c_void) -> i32 {
    ffi_guard!({
        let Some(array) = get_array(arr) else {
            return DsStatus::InvalidPointer as i32;
        };
        if out.is_null() {
            return DsStatus::InvalidArgument as i32;
        }
        match array.get_item(index) {
            Ok(addr) => {
                // SAFETY: `out` is non-null and valid per caller contract.
                unsafe { *out = addr.get() as *mut c_void };
                DsStatus::Ok as i32
            }
            Err(e) => DsStatus::from(&e) as i32,
        }
    })
}

/// Remove the item at `index`, shifting later items down, and write the
/// removed pointer to `out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_array_remove_item(arr: u64, index: usize, out: *mut *mut c_void) -> i32 {
    ffi_guard!({
        let Some(array) = get_array(arr) else {
            return DsStatus::InvalidPointer as i32;
        };
        if out.is_null() {
            return DsStatus::InvalidArgument as i32;
        }
        match array.remove_item(index) {
            Ok(addr) => {
                // SAFETY: `out` is non-null and valid per caller contract.
                unsafe { *out = addr.get() as *mut c_void };
                DsStatus::Ok as i32
            }
            Err(e) => DsStatus::from(&e) as i32,
        }
    })
}

/// Number of items, or 0 for a null or released handle.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_array_get_count(arr: u64) -> usize {
    ffi_guard!(0, { get_array(arr).map_or(0, |array| array.get_count()) })
}

/// Release the array and free its buffer.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_array_release(arr: u64) -> i32 {
    ffi_guard!({
        let Some(array) = ffi_lock!(ARRAYS).remove(arr) else {
            return DsStatus::InvalidPointer as i32;
        };
        // A call still in flight on another thread holds a clone; the last
        // clone frees the buffer when it drops.
        match Arc::try_unwrap(array) {
            Ok(array) => match array.release() {
                Ok(()) => DsStatus::Ok as i32,
                Err(e) => DsStatus::from(&e) as i32,
            },
            Err(_) => DsStatus::Ok as i32,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{dsmem_allocator_create, dsmem_allocator_release};
    use std::ptr;

    fn create() -> (u64, u64) {
        let mut alloc = 0;
        assert_eq!(dsmem_allocator_create(&mut alloc), DsStatus::Ok as i32);
        let mut arr = 0;
        assert_eq!(dsmem_array_create(alloc, &mut arr), DsStatus::Ok as i32);
        (alloc, arr)
    }

    fn fake(addr: usize) -> *mut c_void {
        addr as *mut c_void
    }

    #[test]
    fn null_handle_count_is_zero() {
        assert_eq!(dsmem_array_get_count(0), 0);
    }

    #[test]
    fn add_remove_get_scenario() {
        let (alloc, arr) = create();
        let (p1, p2, p3) = (fake(0x1000), fake(0x2000), fake(0x3000));
        for p in [p1, p2, p3] {
            assert_eq!(dsmem_array_add_item(arr, p), DsStatus::Ok as i32);
        }
        assert_eq!(dsmem_array_get_count(arr), 3);

        let mut removed = ptr::null_mut();
        assert_eq!(
            dsmem_array_remove_item(arr, 1, &mut removed),
            DsStatus::Ok as i32
        );
        assert_eq!(removed, p2);

        let mut got = ptr::null_mut();
        assert_eq!(dsmem_array_get_item(arr, 1, &mut got), DsStatus::Ok as i32);
        assert_eq!(got, p3);
        assert_eq!(dsmem_array_get_count(arr), 2);

        assert_eq!(dsmem_array_release(arr), DsStatus::Ok as i32);
        dsmem_allocator_release(alloc);
    }

    #[test]
    fn invalid_arguments_are_reported() {
        let (alloc, arr) = create();
        assert_eq!(
            dsmem_array_add_item(arr, ptr::null_mut()),
            DsStatus::InvalidArgument as i32
        );
        let mut got = ptr::null_mut();
        assert_eq!(
            dsmem_array_get_item(arr, 0, &mut got),
            DsStatus::InvalidArgument as i32
        );
        assert_eq!(
            dsmem_array_get_item(arr, 0, ptr::null_mut()),
            DsStatus::InvalidArgument as i32
        );
        let mut removed = ptr::null_mut();
        assert_eq!(
            dsmem_array_remove_item(arr, 5, &mut removed),
            DsStatus::InvalidArgument as i32
        );
        dsmem_array_add_item(arr, fake(0x40));
        assert_eq!(
            dsmem_array_remove_item(arr, 0, ptr::null_mut()),
            DsStatus::InvalidArgument as i32
        );
        assert_eq!(dsmem_array_get_count(arr), 1);
        dsmem_array_release(arr);
        dsmem_allocator_release(alloc);
    }

    #[test]
    fn released_handle_is_invalid_pointer() {
        let (alloc, arr) = create();
        assert_eq!(dsmem_array_release(arr), DsStatus::Ok as i32);
        assert_eq!(
            dsmem_array_add_item(arr, fake(0x10)),
            DsStatus::InvalidPointer as i32
        );
        assert_eq!(dsmem_array_release(arr), DsStatus::InvalidPointer as i32);
        assert_eq!(dsmem_array_get_count(arr), 0);
        dsmem_allocator_release(alloc);
    }

    #[test]
    fn array_outlives_allocator_handle() {
        let (alloc, arr) = create();
        assert_eq!(dsmem_allocator_release(alloc), DsStatus::Ok as i32);
        for i in 1..=20 {
            assert_eq!(dsmem_array_add_item(arr, fake(i * 8)), DsStatus::Ok as i32);
        }
        assert_eq!(dsmem_array_get_count(arr), 20);
        assert_eq!(dsmem_array_release(arr), DsStatus::Ok as i32);
    }

    #[test]
    fn create_with_null_allocator_is_invalid_argument() {
        let mut arr = 0;
        assert_eq!(
            dsmem_array_create(0, &mut arr),
            DsStatus::InvalidArgument as i32
        );
        assert_eq!(arr, 0);
    }
}
