//! The per-module marshalling facade.

use tether_core::{
    CStringPtr, ConstValuePtrArray, Diagnostics, Handle, HeapAccessor, Lifetime, MemoryError,
    PtrArrayKind, Utf16Ptr, Utf8Ptr,
};

use crate::array::{self, MutablePointerArray};
use crate::report::DecodeReport;
use crate::{cstr, utf16, utf8};

/// Marshalling into one module's linear memory.
///
/// Owns a [`HeapAccessor`] and the [`Diagnostics`] it reports through.
/// Every allocation it returns is wrapped in a [`Lifetime`] that frees it on
/// dispose or drop.
#[derive(Clone, Debug)]
pub struct ModuleMemory {
    heap: HeapAccessor,
    diagnostics: Diagnostics,
}

impl ModuleMemory {
    /// Bind a heap with explicitly configured diagnostics.
    pub fn new(heap: HeapAccessor, diagnostics: Diagnostics) -> Self {
        Self { heap, diagnostics }
    }

    /// The underlying heap.
    pub fn heap(&self) -> &HeapAccessor {
        &self.heap
    }

    /// The diagnostics this memory reports through.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// See [`array::to_pointer_array`].
    pub fn to_pointer_array<H: Handle>(
        &self,
        handles: &[H],
    ) -> Result<Lifetime<ConstValuePtrArray>, MemoryError> {
        array::to_pointer_array(&self.heap, &self.diagnostics, handles)
    }

    /// See [`array::new_mutable_pointer_array`].
    pub fn new_mutable_pointer_array<K: PtrArrayKind>(
        &self,
        len: u32,
    ) -> Result<Lifetime<MutablePointerArray<K>>, MemoryError> {
        array::new_mutable_pointer_array(&self.heap, &self.diagnostics, len)
    }

    /// See [`utf16::encode_utf16`].
    pub fn encode_utf16(&self, s: &str) -> Result<Lifetime<Utf16Ptr>, MemoryError> {
        utf16::encode_utf16(&self.heap, &self.diagnostics, s)
    }

    /// See [`utf16::decode_utf16`].
    pub fn decode_utf16(&self, ptr: Utf16Ptr) -> Result<String, MemoryError> {
        utf16::decode_utf16(&self.heap, &self.diagnostics, ptr)
    }

    /// See [`utf16::decode_utf16_units`].
    pub fn decode_utf16_units(&self, ptr: Utf16Ptr) -> Result<Vec<u16>, MemoryError> {
        utf16::decode_utf16_units(&self.heap, ptr)
    }

    /// See [`utf8::encode_utf8`].
    pub fn encode_utf8(&self, s: &str) -> Result<Lifetime<Utf8Ptr>, MemoryError> {
        utf8::encode_utf8(&self.heap, &self.diagnostics, s)
    }

    /// See [`utf8::decode_utf8`].
    pub fn decode_utf8(&self, ptr: Utf8Ptr) -> Result<String, MemoryError> {
        utf8::decode_utf8(&self.heap, &self.diagnostics, ptr)
    }

    /// Decode a UTF-8 buffer, returning issues instead of reporting them.
    pub fn decode_utf8_report(&self, ptr: Utf8Ptr) -> Result<DecodeReport, MemoryError> {
        utf8::decode_utf8_report(&self.heap, ptr, self.diagnostics.config().max_scan_bytes)
    }

    /// See [`cstr::new_heap_char_pointer`].
    pub fn new_heap_char_pointer(&self, s: &str) -> Result<Lifetime<CStringPtr>, MemoryError> {
        cstr::new_heap_char_pointer(&self.heap, &self.diagnostics, s)
    }

    /// See [`cstr::consume_heap_char_pointer`].
    pub fn consume_heap_char_pointer(&self, ptr: CStringPtr) -> Result<String, MemoryError> {
        cstr::consume_heap_char_pointer(&self.heap, &self.diagnostics, ptr)
    }
}
