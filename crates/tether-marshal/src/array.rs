//! Contiguous arrays of 32-bit handles in linear memory.
//!
//! Module functions taking a variable number of values receive them as a
//! pointer to `len` little-endian `u32` slots.

use std::fmt;

use smallvec::SmallVec;
use tether_core::kind::ConstValueArray;
use tether_core::{
    ConstValuePtrArray, Diagnostics, Handle, HeapAccessor, HeapPtr, HeapView, HeapViewMut,
    Lifetime, MemoryError, PtrArrayKind,
};

use crate::{buffer_size, track};

const SLOT_BYTES: usize = 4;

/// Pack the values of `handles`, in order, into a new array.
///
/// An empty slice still allocates (a zero-byte request), so the result is
/// always a live pointer the module may receive.
pub fn to_pointer_array<H: Handle>(
    heap: &HeapAccessor,
    diagnostics: &Diagnostics,
    handles: &[H],
) -> Result<Lifetime<ConstValuePtrArray>, MemoryError> {
    let bytes = buffer_size(handles.len(), SLOT_BYTES, 0)?;
    let values: SmallVec<[u32; 8]> = handles.iter().map(Handle::value).collect();

    let ptr = heap.allocate_as::<ConstValueArray>(bytes)?;
    let array = track(heap, diagnostics, ptr, bytes);
    heap.view_mut::<u32>(ptr.offset(), values.len() as u32)?
        .copy_from(&values);
    Ok(array)
}

/// A zero-initialized array the module writes results into.
///
/// Holds its own heap handle so slots can be read back after the call that
/// filled them. Slot windows are re-derived on every access.
pub struct MutablePointerArray<K: PtrArrayKind> {
    ptr: HeapPtr<K>,
    len: u32,
    heap: HeapAccessor,
}

impl<K: PtrArrayKind> MutablePointerArray<K> {
    /// Pointer to the first slot, to pass to the module.
    pub fn ptr(&self) -> HeapPtr<K> {
        self.ptr
    }

    /// Number of slots.
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether the array has no slots.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read-only window over the slots.
    pub fn slots(&self) -> Result<HeapView<'_, u32>, MemoryError> {
        self.heap.view::<u32>(self.ptr.offset(), self.len)
    }

    /// Writable window over the slots.
    pub fn slots_mut(&self) -> Result<HeapViewMut<'_, u32>, MemoryError> {
        self.heap.view_mut::<u32>(self.ptr.offset(), self.len)
    }

    /// Copy the slots out.
    pub fn to_vec(&self) -> Result<Vec<u32>, MemoryError> {
        Ok(self.slots()?.to_vec())
    }
}

impl<K: PtrArrayKind> fmt::Debug for MutablePointerArray<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutablePointerArray")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

/// Allocate `len` zeroed slots of kind `K`.
pub fn new_mutable_pointer_array<K: PtrArrayKind>(
    heap: &HeapAccessor,
    diagnostics: &Diagnostics,
    len: u32,
) -> Result<Lifetime<MutablePointerArray<K>>, MemoryError> {
    let bytes = buffer_size(len as usize, SLOT_BYTES, 0)?;
    let ptr = heap.allocate_zeroed_as::<K>(bytes)?;
    diagnostics.heap_event("alloc", ptr, bytes);
    let array = MutablePointerArray {
        ptr,
        len,
        heap: heap.clone(),
    };
    let diagnostics = diagnostics.clone();
    Ok(Lifetime::with_disposer(array, move |array| {
        match array.heap.free(array.ptr) {
            Ok(()) => diagnostics.heap_event("free", array.ptr, bytes),
            Err(error) => {
                tracing::error!(target: "tether", %error, ptr = %array.ptr, "failed to free pointer array");
            }
        }
    }))
}
