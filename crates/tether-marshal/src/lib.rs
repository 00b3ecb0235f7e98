//! Marshalling host values into a foreign module's linear memory.
//!
//! Two string layouts, plain C strings and 32-bit pointer arrays, each
//! allocated through a [`HeapAccessor`] and returned inside a [`Lifetime`]
//! whose disposer frees the allocation. [`ModuleMemory`] bundles the
//! accessor with injected [`Diagnostics`] and is the entry point higher
//! layers use.
//!
//! # Buffer layouts
//!
//! ```text
//! UTF-16: [u32 code units n][n x u16 LE]
//! UTF-8:  [u32 UTF-16 code units of the source][UTF-8 bytes][0x00]
//! C:      [UTF-8 bytes][0x00]
//! array:  [u32 slot; len]
//! ```
//!
//! Both string headers count UTF-16 code units on encode. The UTF-8 decoder
//! reads the same field as a payload byte count; see [`utf8`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod array;
pub mod cstr;
pub mod memory;
pub mod report;
pub mod utf16;
pub mod utf8;

pub use array::MutablePointerArray;
pub use memory::ModuleMemory;
pub use report::DecodeReport;

use tether_core::{Diagnostics, HeapAccessor, HeapPtr, Lifetime, MemoryError, PtrKind};

/// Size of the length header in front of both string layouts.
pub const HEADER_BYTES: u32 = 4;

/// Wrap a fresh allocation in a lifetime that frees it.
///
/// A failed free (the heap is borrowed by a live view) is logged; the
/// allocation leaks rather than corrupting the heap.
pub(crate) fn track<K: PtrKind>(
    heap: &HeapAccessor,
    diagnostics: &Diagnostics,
    ptr: HeapPtr<K>,
    bytes: u32,
) -> Lifetime<HeapPtr<K>> {
    diagnostics.heap_event("alloc", ptr, bytes);
    let heap = heap.clone();
    let diagnostics = diagnostics.clone();
    Lifetime::with_disposer(ptr, move |ptr| match heap.free(ptr) {
        Ok(()) => diagnostics.heap_event("free", ptr, bytes),
        Err(error) => {
            tracing::error!(target: "tether", %error, ptr = %ptr, "failed to free heap allocation");
        }
    })
}

/// Byte size of `count` elements of `element_size` bytes plus `extra`, if it
/// fits the 32-bit heap.
pub(crate) fn buffer_size(count: usize, element_size: usize, extra: u32) -> Result<u32, MemoryError> {
    count
        .checked_mul(element_size)
        .and_then(|bytes| u32::try_from(bytes).ok())
        .and_then(|bytes| bytes.checked_add(extra))
        .ok_or(MemoryError::SizeOverflow {
            count,
            element_size,
        })
}

/// Offset of the payload behind a header at `offset`.
pub(crate) fn payload_offset(offset: u32, memory_len: usize) -> Result<u32, MemoryError> {
    offset
        .checked_add(HEADER_BYTES)
        .ok_or(MemoryError::OutOfBounds {
            offset,
            len: HEADER_BYTES,
            memory_len,
        })
}
