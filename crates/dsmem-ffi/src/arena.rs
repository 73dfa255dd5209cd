//! Arena FFI.
//!
//! Arenas use the default configuration: 256 KiB blocks with
//! [`Placement::RegionEnd`](dsmem_arena::Placement::RegionEnd) addressing.

use std::sync::{Arc, Mutex};

use dsmem_arena::Arena;

use crate::allocator::get_allocator;
use crate::handle::HandleTable;
use crate::status::DsStatus;

static ARENAS: Mutex<HandleTable<Arc<Arena>>> = Mutex::new(HandleTable::new());

fn get_arena(handle: u64) -> Option<Arc<Arena>> {
    ARENAS.lock().ok()?.get(handle).cloned()
}

/// Create an empty arena over `alloc`. Returns its handle via `out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_arena_create(alloc: u64, out: *mut u64) -> i32 {
    ffi_guard!({
        if out.is_null() {
            return DsStatus::InvalidArgument as i32;
        }
        let Some(allocator) = get_allocator(alloc) else {
            return DsStatus::InvalidArgument as i32;
        };
        let arena = match Arena::new(allocator) {
            Ok(arena) => arena,
            Err(e) => return DsStatus::from(&e) as i32,
        };
        let handle = ffi_lock!(ARENAS).insert(Arc::new(arena));
        // SAFETY: `out` is non-null and valid per caller contract.
        unsafe { *out = handle };
        DsStatus::Ok as i32
    })
}

/// Reserve `bytes` from the arena and write the address to `out`.
///
/// The address stays valid until the next clear or release.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_arena_allocate(arena: u64, bytes: usize, out: *mut *mut u8) -> i32 {
    ffi_guard!({
        let Some(arena) = get_arena(arena) else {
            return DsStatus::InvalidPointer as i32;
        };
        if out.is_null() {
            return DsStatus::InvalidArgument as i32;
        }
        match arena.allocate(bytes) {
            Ok(ptr) => {
                // SAFETY: `out` is non-null and valid per caller contract.
                unsafe { *out = ptr.as_ptr() };
                DsStatus::Ok as i32
            }
            Err(e) => DsStatus::from(&e) as i32,
        }
    })
}

/// Rewind every block. All addresses handed out become invalid.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_arena_clear(arena: u64) -> i32 {
    ffi_guard!({
        let Some(arena) = get_arena(arena) else {
            return DsStatus::InvalidPointer as i32;
        };
        match arena.clear() {
            Ok(()) => DsStatus::Ok as i32,
            Err(e) => DsStatus::from(&e) as i32,
        }
    })
}

/// Number of blocks, or 0 for a null or released handle.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_arena_block_count(arena: u64) -> usize {
    ffi_guard!(0, { get_arena(arena).map_or(0, |arena| arena.block_count()) })
}

/// Release the arena and free all of its blocks.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_arena_release(arena: u64) -> i32 {
    ffi_guard!({
        let Some(arena) = ffi_lock!(ARENAS).remove(arena) else {
            return DsStatus::InvalidPointer as i32;
        };
        match Arc::try_unwrap(arena) {
            Ok(arena) => match arena.release() {
                Ok(()) => DsStatus::Ok as i32,
                Err(e) => DsStatus::from(&e) as i32,
            },
            Err(_) => DsStatus::Ok as i32,
        }
    })
}
