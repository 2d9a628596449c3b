//! Error types for the `strata` allocator.
//!
//! Only the `try_*` entry points surface these to callers. The infallible
//! entry points treat every variant as fatal and panic with its message.

use std::fmt;

/// Errors that can occur while acquiring or serving arena memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The operating system refused to map a region.
    MapFailed {
        /// Total bytes requested from the OS (header included).
        size: usize,
        /// The `errno` reported by `mmap`.
        errno: i32,
    },

    /// Rounding the header plus the request up to whole pages overflowed.
    SizeOverflow {
        /// The requested allocation size.
        requested: usize,
    },

    /// The arena has no regions: it was never initialized or was destroyed.
    Uninitialized,

    /// Invalid alignment specified.
    InvalidAlignment {
        /// The requested alignment.
        alignment: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MapFailed { size, errno } => {
                write!(
                    f,
                    "failed to map region of {size} bytes (errno {errno})"
                )
            }
            Error::SizeOverflow { requested } => {
                write!(f, "allocation of {requested} bytes overflows region sizing")
            }
            Error::Uninitialized => write!(f, "arena is not initialized"),
            Error::InvalidAlignment { alignment } => {
                write!(
                    f,
                    "Invalid alignment: {alignment} is not a power of two"
                )
            }
        }
    }
}

impl std::error::Error for Error {}

/// Result type for allocator operations.
pub type Result<T> = std::result::Result<T, Error>;
