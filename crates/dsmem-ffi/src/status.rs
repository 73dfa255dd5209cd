//! C-compatible status codes.
//!
//! [`DsStatus`] values are HRESULT-compatible so callers that already
//! test `FAILED(hr)` keep working: success is zero and every failure is
//! negative.

use dsmem_core::{ErrorKind, MemError};

/// Status code returned by every fallible C entry point.
///
/// Values are ABI-stable.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DsStatus {
    /// Success (`S_OK`).
    Ok = 0,
    /// An argument is null, out of range, or otherwise unusable
    /// (`E_INVALIDARG`, `0x80070057`).
    InvalidArgument = -2_147_024_809,
    /// The object handle is null or already released (`E_POINTER`,
    /// `0x80004003`).
    InvalidPointer = -2_147_467_261,
    /// An allocation could not be satisfied (`E_OUTOFMEMORY`,
    /// `0x8007000E`).
    OutOfMemory = -2_147_024_882,
    /// Any other failure, such as a refused free or a poisoned lock
    /// (`E_FAIL`, `0x80004005`).
    Failure = -2_147_467_259,
    /// A Rust panic was caught at the C boundary (`E_UNEXPECTED`,
    /// `0x8000FFFF`).
    Panicked = -2_147_418_113,
}

impl From<ErrorKind> for DsStatus {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidArgument => DsStatus::InvalidArgument,
            ErrorKind::InvalidPointer => DsStatus::InvalidPointer,
            ErrorKind::OutOfMemory => DsStatus::OutOfMemory,
            ErrorKind::Failure => DsStatus::Failure,
        }
    }
}

impl From<&MemError> for DsStatus {
    fn from(e: &MemError) -> Self {
        DsStatus::from(e.kind())
    }
}
