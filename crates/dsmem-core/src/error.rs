//! Error types shared by every dsmem layer.
//!
//! Lower layers never wrap errors from the layers beneath them: an
//! out-of-memory raised by the allocator reaches the arena caller as the
//! same [`MemError::OutOfMemory`] value.

use thiserror::Error;

/// Coarse error classes surfaced to C callers as status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A null, out-of-range, or otherwise unusable argument.
    InvalidArgument,
    /// The object the operation was invoked on is null or already released.
    ///
    /// Never produced by the Rust API (a `&self` cannot be null); the C
    /// surface reports it for null and stale handles.
    InvalidPointer,
    /// An allocation or reallocation could not be satisfied.
    OutOfMemory,
    /// Any other failure, such as the heap refusing a free.
    Failure,
}

/// Errors from allocator, array, and arena operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MemError {
    /// An argument failed validation.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the argument.
        reason: &'static str,
    },
    /// An element index was at or past the current element count.
    #[error("index {index} out of range for length {count}")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The element count at the time of the request.
        count: usize,
    },
    /// The element type needs stronger alignment than the heap provides.
    #[error("element alignment {align} exceeds heap alignment {max}")]
    UnsupportedAlignment {
        /// Alignment required by the element type.
        align: usize,
        /// Alignment guaranteed by the heap.
        max: usize,
    },
    /// A configuration value is out of its permitted range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the rejected value.
        reason: String,
    },
    /// The heap could not satisfy an allocation or reallocation.
    #[error("out of memory: failed to allocate {requested} bytes")]
    OutOfMemory {
        /// Number of bytes requested from the heap.
        requested: usize,
    },
    /// A requested size does not fit in the address space.
    #[error("capacity overflow: a request for {requested} units exceeds the address space")]
    CapacityOverflow {
        /// The requested count, in bytes or elements depending on the caller.
        requested: usize,
    },
    /// The heap reported failure while releasing a block.
    #[error("heap free failed for a block of {size} bytes")]
    HeapFreeFailed {
        /// Size of the block that could not be released.
        size: usize,
    },
    /// A previous critical section panicked while holding the lock.
    #[error("lock poisoned by a panic in an earlier critical section")]
    LockPoisoned,
}

impl MemError {
    /// The status class this error is reported as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. }
            | Self::IndexOutOfRange { .. }
            | Self::UnsupportedAlignment { .. }
            | Self::InvalidConfig { .. } => ErrorKind::InvalidArgument,
            Self::OutOfMemory { .. } | Self::CapacityOverflow { .. } => ErrorKind::OutOfMemory,
            Self::HeapFreeFailed { .. } | Self::LockPoisoned => ErrorKind::Failure,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for MemError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned
    }
}
