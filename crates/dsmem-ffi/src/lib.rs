//! C ABI for the dsmem allocator, arrays, and arena.
//!
//! Every object crosses the boundary as a `u64` handle from a
//! generation-checked table; handle `0` is always null. Every entry point
//! runs inside [`ffi_guard!`], so a Rust panic surfaces as
//! [`DsStatus::Panicked`] with its message retrievable through
//! [`dsmem_last_panic_message`] instead of unwinding into C.
//!
//! A cbindgen-generated header lands in `include/dsmem.h` at build time.
//! This is the only crate besides the `raw` modules of `dsmem-core` and
//! `dsmem-array` that contains `unsafe` code.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

use std::any::Any;
use std::cell::RefCell;
use std::ffi::c_char;

thread_local! {
    /// Message of the last panic caught on this thread.
    pub(crate) static LAST_PANIC: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Run a C entry point body, converting a panic into
/// [`DsStatus::Panicked`](crate::status::DsStatus::Panicked).
///
/// The two-argument form returns `$fallback` instead, for entry points
/// whose return value is not a status.
macro_rules! ffi_guard {
    ($body:block) => {
        ffi_guard!($crate::status::DsStatus::Panicked as i32, $body)
    };
    ($fallback:expr, $body:block) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $body)) {
            Ok(value) => value,
            Err(payload) => {
                $crate::record_panic(payload.as_ref());
                $fallback
            }
        }
    };
}

/// Lock a mutex, returning [`DsStatus::Failure`](crate::status::DsStatus::Failure)
/// from the enclosing body if it is poisoned.
macro_rules! ffi_lock {
    ($mutex:expr) => {
        match $mutex.lock() {
            Ok(guard) => guard,
            Err(_) => return $crate::status::DsStatus::Failure as i32,
        }
    };
}

pub mod allocator;
pub mod arena;
pub mod array;
mod handle;
pub mod lock_regions;
pub mod logging;
pub mod status;

pub use status::DsStatus;

fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_owned()
    }
}

pub(crate) fn record_panic(payload: &(dyn Any + Send)) {
    let message = panic_text(payload);
    tracing::error!(panic = %message, "panic caught at C boundary");
    LAST_PANIC.with(|cell| *cell.borrow_mut() = message);
}

/// Copy the last panic message caught on the calling thread into `buf`.
///
/// Returns the full message length in bytes, excluding the terminator.
/// With a null `buf` or zero `cap` nothing is written, which lets callers
/// size their buffer first. Otherwise at most `cap - 1` bytes are copied
/// and the result is NUL-terminated. Returns 0 if no panic was recorded.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_last_panic_message(buf: *mut c_char, cap: usize) -> usize {
    ffi_guard!(0, {
        LAST_PANIC.with(|cell| {
            let message = cell.borrow();
            let bytes = message.as_bytes();
            if !buf.is_null() && cap > 0 {
                let n = bytes.len().min(cap - 1);
                // SAFETY: caller guarantees `buf` points to `cap` writable
                // bytes; `n + 1 <= cap`.
                unsafe {
                    std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf.cast::<u8>(), n);
                    *buf.add(n) = 0;
                }
            }
            bytes.len()
        })
    })
}
