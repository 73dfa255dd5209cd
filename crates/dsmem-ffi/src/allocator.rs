//! Allocator FFI: create allocators and allocate raw memory through them.
//!
//! C callers get bare pointers, so each allocation carries a
//! [`HEADER_BYTES`] prefix recording its payload size and the handle of the
//! allocator that produced it. `free` and `reallocate` read it back to
//! rebuild the [`HeapBlock`] the allocator expects, and refuse pointers
//! stamped with a different handle. The header keeps the payload at
//! [`HEAP_ALIGNMENT`].

use std::mem;
use std::ptr::{self, NonNull};
use std::sync::{Arc, Mutex};

use dsmem_core::{Allocator, HeapBlock, HEAP_ALIGNMENT};

use crate::handle::HandleTable;
use crate::status::DsStatus;

/// Bytes reserved in front of every C allocation.
pub const HEADER_BYTES: usize = HEAP_ALIGNMENT;

/// Offset of the owning handle within the header; the payload size sits at
/// offset zero.
const OWNER_OFFSET: usize = 8;

const _: () = assert!(mem::size_of::<usize>() <= OWNER_OFFSET);
const _: () = assert!(OWNER_OFFSET + mem::size_of::<u64>() <= HEADER_BYTES);

static ALLOCATORS: Mutex<HandleTable<Arc<Allocator>>> = Mutex::new(HandleTable::new());

/// Clone the allocator behind `handle`, briefly locking the table.
///
/// Returns `None` if the handle is null, stale, or the table is poisoned.
pub(crate) fn get_allocator(handle: u64) -> Option<Arc<Allocator>> {
    ALLOCATORS.lock().ok()?.get(handle).cloned()
}

/// Register an allocator built in Rust, such as one over a test heap.
#[cfg(test)]
pub(crate) fn insert_allocator(allocator: Arc<Allocator>) -> u64 {
    match ALLOCATORS.lock() {
        Ok(mut table) => table.insert(allocator),
        Err(poisoned) => poisoned.into_inner().insert(allocator),
    }
}

/// Create an allocator over the process heap. Returns its handle via `out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_allocator_create(out: *mut u64) -> i32 {
    ffi_guard!({
        if out.is_null() {
            return DsStatus::InvalidArgument as i32;
        }
        let handle = ffi_lock!(ALLOCATORS).insert(Arc::new(Allocator::new()));
        // SAFETY: `out` is non-null and valid per caller contract.
        unsafe { *out = handle };
        DsStatus::Ok as i32
    })
}

/// Allocate `bytes` of zero-filled memory. Writes the address to `out`.
///
/// A zero-byte request yields a valid, unique pointer that must still be
/// freed.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_allocator_allocate(alloc: u64, bytes: usize, out: *mut *mut u8) -> i32 {
    ffi_guard!({
        if out.is_null() {
            return DsStatus::InvalidArgument as i32;
        }
        let Some(allocator) = get_allocator(alloc) else {
            return DsStatus::InvalidArgument as i32;
        };
        let Some(total) = bytes.checked_add(HEADER_BYTES) else {
            return DsStatus::OutOfMemory as i32;
        };
        let block = match allocator.allocate(total) {
            Ok(block) => block,
            Err(e) => return DsStatus::from(&e) as i32,
        };
        let (base, _) = block.into_raw_parts();
        // SAFETY: `base` starts a fresh region of `total >= HEADER_BYTES`
        // bytes aligned to HEAP_ALIGNMENT.
        unsafe {
            write_header(base, bytes, alloc);
            *out = payload(base);
        }
        DsStatus::Ok as i32
    })
}

/// Resize an allocation to `bytes`, preserving its common prefix.
///
/// On success the new address is written to `out` and `ptr` is invalid.
/// On failure `ptr` is untouched and still owned by the caller. A pointer
/// from a different allocator is an invalid argument.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_allocator_reallocate(
    alloc: u64,
    ptr: *mut u8,
    bytes: usize,
    out: *mut *mut u8,
) -> i32 {
    ffi_guard!({
        if ptr.is_null() || out.is_null() {
            return DsStatus::InvalidArgument as i32;
        }
        let Some(allocator) = get_allocator(alloc) else {
            return DsStatus::InvalidArgument as i32;
        };
        let Some(total) = bytes.checked_add(HEADER_BYTES) else {
            return DsStatus::OutOfMemory as i32;
        };
        // SAFETY: `ptr` came from `dsmem_allocator_allocate` or
        // `dsmem_allocator_reallocate` and is live.
        let Some(mut block) = (unsafe { block_of(ptr, alloc, &allocator) }) else {
            return DsStatus::InvalidArgument as i32;
        };
        if let Err(e) = allocator.reallocate(&mut block, total) {
            // Hand the unchanged region back to the caller, who still owns
            // it through `ptr`.
            let (_base, _size) = block.into_raw_parts();
            return DsStatus::from(&e) as i32;
        }
        let (base, _) = block.into_raw_parts();
        // SAFETY: the resized region holds `total >= HEADER_BYTES` bytes.
        unsafe {
            write_header(base, bytes, alloc);
            *out = payload(base);
        }
        DsStatus::Ok as i32
    })
}

/// Free an allocation.
///
/// A null or stale `alloc` is an invalid argument, as is a pointer from a
/// different allocator. A null `ptr` with a live `alloc` is a successful
/// no-op.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_allocator_free(alloc: u64, ptr: *mut u8) -> i32 {
    ffi_guard!({
        let Some(allocator) = get_allocator(alloc) else {
            return DsStatus::InvalidArgument as i32;
        };
        if ptr.is_null() {
            return DsStatus::Ok as i32;
        }
        // SAFETY: as for `dsmem_allocator_reallocate`; the pointer is not
        // used again after this call.
        let Some(block) = (unsafe { block_of(ptr, alloc, &allocator) }) else {
            return DsStatus::InvalidArgument as i32;
        };
        match allocator.free(block) {
            Ok(()) => DsStatus::Ok as i32,
            Err(e) => DsStatus::from(&e) as i32,
        }
    })
}

/// Release the caller's allocator handle.
///
/// Arrays and arenas created from it keep the allocator alive until they
/// are released themselves.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_allocator_release(alloc: u64) -> i32 {
    ffi_guard!({
        match ffi_lock!(ALLOCATORS).remove(alloc) {
            Some(_) => DsStatus::Ok as i32,
            None => DsStatus::InvalidArgument as i32,
        }
    })
}

#[allow(unsafe_code)]
unsafe fn write_header(base: NonNull<u8>, bytes: usize, owner: u64) {
    // SAFETY: caller guarantees `HEADER_BYTES` writable bytes aligned to
    // HEAP_ALIGNMENT, so both fields are in bounds and aligned.
    unsafe {
        base.as_ptr().cast::<usize>().write(bytes);
        base.as_ptr().add(OWNER_OFFSET).cast::<u64>().write(owner);
    }
}

#[allow(unsafe_code)]
unsafe fn payload(base: NonNull<u8>) -> *mut u8 {
    // SAFETY: caller guarantees the region extends past the header.
    unsafe { base.as_ptr().add(HEADER_BYTES) }
}

/// Rebuild the block that `ptr` was carved from, or `None` if its header
/// names an allocator other than `handle`.
#[allow(unsafe_code)]
unsafe fn block_of(ptr: *mut u8, handle: u64, allocator: &Allocator) -> Option<HeapBlock> {
    // SAFETY: caller guarantees `ptr` is a live payload pointer from this
    // module, so an initialised header precedes it.
    unsafe {
        let base = ptr.sub(HEADER_BYTES);
        let owner = ptr::read(base.add(OWNER_OFFSET).cast::<u64>());
        if owner != handle {
            return None;
        }
        let bytes = ptr::read(base.cast::<usize>());
        Some(HeapBlock::from_raw_parts(
            NonNull::new_unchecked(base),
            bytes + HEADER_BYTES,
            allocator,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsmem_test_utils::{failing_allocator, FailingHeap};

    fn create() -> u64 {
        let mut h = 0u64;
        assert_eq!(dsmem_allocator_create(&mut h), DsStatus::Ok as i32);
        h
    }

    #[test]
    fn null_allocator_is_invalid_argument() {
        let mut p = ptr::null_mut();
        assert_eq!(
            dsmem_allocator_allocate(0, 64, &mut p),
            DsStatus::InvalidArgument as i32
        );
        assert!(p.is_null());
    }

    #[test]
    fn null_out_is_invalid_argument() {
        assert_eq!(
            dsmem_allocator_create(ptr::null_mut()),
            DsStatus::InvalidArgument as i32
        );
        let h = create();
        assert_eq!(
            dsmem_allocator_allocate(h, 8, ptr::null_mut()),
            DsStatus::InvalidArgument as i32
        );
        dsmem_allocator_release(h);
    }

    #[test]
    #[allow(unsafe_code)]
    fn allocate_is_zeroed_and_aligned() {
        let h = create();
        let mut p = ptr::null_mut();
        assert_eq!(dsmem_allocator_allocate(h, 100, &mut p), DsStatus::Ok as i32);
        assert_eq!(p as usize % HEAP_ALIGNMENT, 0);
        // SAFETY: 100 bytes were just allocated at `p`.
        let bytes = unsafe { std::slice::from_raw_parts(p, 100) };
        assert!(bytes.iter().all(|&b| b == 0));
        assert_eq!(dsmem_allocator_free(h, p), DsStatus::Ok as i32);
        dsmem_allocator_release(h);
    }

    #[test]
    #[allow(unsafe_code)]
    fn reallocate_preserves_prefix() {
        let h = create();
        let mut p = ptr::null_mut();
        dsmem_allocator_allocate(h, 16, &mut p);
        // SAFETY: 16 bytes are live at `p`.
        unsafe { p.write_bytes(0xAB, 16) };
        let mut q = ptr::null_mut();
        assert_eq!(
            dsmem_allocator_reallocate(h, p, 4096, &mut q),
            DsStatus::Ok as i32
        );
        // SAFETY: the grown region holds at least the old 16 bytes.
        let bytes = unsafe { std::slice::from_raw_parts(q, 16) };
        assert!(bytes.iter().all(|&b| b == 0xAB));
        assert_eq!(dsmem_allocator_free(h, q), DsStatus::Ok as i32);
        dsmem_allocator_release(h);
    }

    #[test]
    fn reallocate_null_pointer_is_invalid_argument() {
        let h = create();
        let mut q = ptr::null_mut();
        assert_eq!(
            dsmem_allocator_reallocate(h, ptr::null_mut(), 8, &mut q),
            DsStatus::InvalidArgument as i32
        );
        dsmem_allocator_release(h);
    }

    #[test]
    fn zero_byte_allocation_round_trips() {
        let h = create();
        let mut p = ptr::null_mut();
        assert_eq!(dsmem_allocator_allocate(h, 0, &mut p), DsStatus::Ok as i32);
        assert!(!p.is_null());
        assert_eq!(dsmem_allocator_free(h, p), DsStatus::Ok as i32);
        dsmem_allocator_release(h);
    }

    #[test]
    fn free_null_pointer_needs_live_allocator() {
        assert_eq!(
            dsmem_allocator_free(0, ptr::null_mut()),
            DsStatus::InvalidArgument as i32
        );
        let h = create();
        assert_eq!(dsmem_allocator_free(h, ptr::null_mut()), DsStatus::Ok as i32);
        dsmem_allocator_release(h);
        assert_eq!(
            dsmem_allocator_free(h, ptr::null_mut()),
            DsStatus::InvalidArgument as i32
        );
    }

    #[test]
    fn pointer_from_another_allocator_is_rejected() {
        let a = create();
        let b = create();
        let mut p = ptr::null_mut();
        assert_eq!(dsmem_allocator_allocate(a, 32, &mut p), DsStatus::Ok as i32);
        let mut q = ptr::null_mut();
        assert_eq!(
            dsmem_allocator_reallocate(b, p, 64, &mut q),
            DsStatus::InvalidArgument as i32
        );
        assert!(q.is_null());
        assert_eq!(dsmem_allocator_free(b, p), DsStatus::InvalidArgument as i32);
        assert_eq!(dsmem_allocator_free(a, p), DsStatus::Ok as i32);
        dsmem_allocator_release(a);
        dsmem_allocator_release(b);
    }

    #[test]
    fn reallocated_pointer_stays_with_its_allocator() {
        let a = create();
        let b = create();
        let mut p = ptr::null_mut();
        dsmem_allocator_allocate(a, 8, &mut p);
        let mut q = ptr::null_mut();
        assert_eq!(
            dsmem_allocator_reallocate(a, p, 256, &mut q),
            DsStatus::Ok as i32
        );
        assert_eq!(dsmem_allocator_free(b, q), DsStatus::InvalidArgument as i32);
        assert_eq!(dsmem_allocator_free(a, q), DsStatus::Ok as i32);
        dsmem_allocator_release(a);
        dsmem_allocator_release(b);
    }

    #[test]
    #[allow(unsafe_code)]
    fn failed_reallocate_leaves_pointer_usable() {
        let (allocator, heap) = failing_allocator(FailingHeap::new().fail_reallocs_after(0));
        let h = insert_allocator(allocator.clone());
        let mut p = ptr::null_mut();
        assert_eq!(dsmem_allocator_allocate(h, 16, &mut p), DsStatus::Ok as i32);
        // SAFETY: 16 bytes are live at `p`.
        unsafe { p.write_bytes(0x5A, 16) };
        let mut q = ptr::null_mut();
        assert_eq!(
            dsmem_allocator_reallocate(h, p, 4096, &mut q),
            DsStatus::OutOfMemory as i32
        );
        assert!(q.is_null());
        assert_eq!(heap.realloc_attempts(), 1);
        // SAFETY: the failed resize left the 16 bytes at `p` in place.
        let bytes = unsafe { std::slice::from_raw_parts(p, 16) };
        assert!(bytes.iter().all(|&b| b == 0x5A));
        assert_eq!(dsmem_allocator_free(h, p), DsStatus::Ok as i32);
        assert_eq!(allocator.stats().frees, 1);
        dsmem_allocator_release(h);
    }

    #[test]
    fn refused_free_is_failure() {
        let (allocator, heap) = failing_allocator(FailingHeap::new().fail_frees());
        let h = insert_allocator(allocator);
        let mut p = ptr::null_mut();
        dsmem_allocator_allocate(h, 24, &mut p);
        assert_eq!(dsmem_allocator_free(h, p), DsStatus::Failure as i32);
        assert_eq!(heap.free_attempts(), 1);
        dsmem_allocator_release(h);
    }

    #[test]
    fn double_release_is_invalid_argument() {
        let h = create();
        assert_eq!(dsmem_allocator_release(h), DsStatus::Ok as i32);
        assert_eq!(
            dsmem_allocator_release(h),
            DsStatus::InvalidArgument as i32
        );
        let mut p = ptr::null_mut();
        assert_eq!(
            dsmem_allocator_allocate(h, 8, &mut p),
            DsStatus::InvalidArgument as i32
        );
    }

    #[test]
    fn oversized_request_is_out_of_memory() {
        let h = create();
        let mut p = ptr::null_mut();
        assert_eq!(
            dsmem_allocator_allocate(h, usize::MAX, &mut p),
            DsStatus::OutOfMemory as i32
        );
        dsmem_allocator_release(h);
    }
}
