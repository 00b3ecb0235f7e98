//! Plain NUL-terminated C strings, the form module functions take and
//! return for identifiers and error messages.

use tether_core::kind::CChars;
use tether_core::{CStringPtr, Diagnostics, HeapAccessor, Lifetime, MemoryError};

use crate::report::DecodeReport;
use crate::utf8::{decode_bytes, write_terminated};
use crate::{buffer_size, track};

/// Copy `s` into a freshly allocated NUL-terminated buffer.
pub fn new_heap_char_pointer(
    heap: &HeapAccessor,
    diagnostics: &Diagnostics,
    s: &str,
) -> Result<Lifetime<CStringPtr>, MemoryError> {
    let bytes = buffer_size(heap.utf8_byte_length(s)?, 1, 1)?;
    let ptr = heap.allocate_as::<CChars>(bytes)?;
    let buffer = track(heap, diagnostics, ptr, bytes);
    write_terminated(s, heap.view_mut::<u8>(ptr.offset(), bytes)?.as_bytes_mut());
    Ok(buffer)
}

/// Decode a C string up to its terminator without freeing it. Null reads as
/// empty.
pub fn decode_cstring_report(
    heap: &HeapAccessor,
    ptr: CStringPtr,
    max_scan_bytes: u32,
) -> Result<DecodeReport, MemoryError> {
    if ptr.is_null() {
        return Ok(DecodeReport::default());
    }
    let rest = heap.view_to_end(ptr.offset())?;
    let bytes = rest.as_bytes();
    let limit = bytes.len().min(max_scan_bytes as usize);
    Ok(decode_bytes(&bytes[..limit], ptr.offset(), 0))
}

/// Decode a C string the module handed over, then free it.
///
/// Ownership transfers with the pointer; the buffer is freed even when
/// decoding fails.
pub fn consume_heap_char_pointer(
    heap: &HeapAccessor,
    diagnostics: &Diagnostics,
    ptr: CStringPtr,
) -> Result<String, MemoryError> {
    let decoded = decode_cstring_report(heap, ptr, diagnostics.config().max_scan_bytes);
    heap.free(ptr)?;
    diagnostics.heap_event("consume", ptr, 0);
    Ok(decoded?.into_text(diagnostics))
}
