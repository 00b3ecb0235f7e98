//! Error types for foreign heap access and ownership tracking.
//!
//! Allocation and ownership failures are hard errors that propagate to the
//! caller. Malformed string payloads are not errors at all; they are
//! reported as [`DecodeIssue`](crate::diagnostics::DecodeIssue)s and decoding
//! continues.

use std::error::Error;
use std::fmt;

/// Errors from allocating, reading or writing foreign linear memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemoryError {
    /// The module's allocator returned the null offset.
    OutOfMemory {
        /// Number of bytes requested.
        requested: u32,
    },
    /// An access reached past the end of linear memory.
    OutOfBounds {
        /// First byte of the access.
        offset: u32,
        /// Length of the access in bytes.
        len: u32,
        /// Size of linear memory at the time of the access.
        memory_len: usize,
    },
    /// A requested buffer size does not fit in the 32-bit address space.
    SizeOverflow {
        /// Number of elements requested.
        count: usize,
        /// Size of one element in bytes.
        element_size: usize,
    },
    /// The heap is borrowed by a live view, so it cannot be allocated from,
    /// freed into, or viewed mutably.
    HeapBusy,
    /// An ownership error surfaced through a heap operation.
    Lifetime(LifetimeError),
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { requested } => {
                write!(f, "foreign heap exhausted: malloc({requested}) returned null")
            }
            Self::OutOfBounds {
                offset,
                len,
                memory_len,
            } => {
                write!(
                    f,
                    "heap access out of bounds: {len} bytes at offset {offset}, memory is {memory_len} bytes"
                )
            }
            Self::SizeOverflow {
                count,
                element_size,
            } => {
                write!(
                    f,
                    "buffer of {count} elements x {element_size} bytes exceeds the 32-bit heap"
                )
            }
            Self::HeapBusy => write!(f, "heap is borrowed by a live view"),
            Self::Lifetime(e) => write!(f, "{e}"),
        }
    }
}

impl Error for MemoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Lifetime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LifetimeError> for MemoryError {
    fn from(e: LifetimeError) -> Self {
        Self::Lifetime(e)
    }
}

/// Errors from [`Lifetime`](crate::lifetime::Lifetime) access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifetimeError {
    /// The tracker was disposed or consumed.
    UseAfterDispose,
    /// `dup()` was called on a tracker created without a copier.
    NotDuplicable,
    /// The tracker's owner was disposed before it.
    OwnerDisposed,
}

impl fmt::Display for LifetimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UseAfterDispose => write!(f, "lifetime used after dispose"),
            Self::NotDuplicable => write!(f, "lifetime has no copier and cannot be duplicated"),
            Self::OwnerDisposed => write!(f, "lifetime owner was disposed before its dependent"),
        }
    }
}

impl Error for LifetimeError {}

/// Configuration validation errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A configuration value is out of range.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(reason) => write!(f, "invalid configuration: {reason}"),
        }
    }
}

impl Error for ConfigError {}
