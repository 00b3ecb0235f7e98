//! Length-prefixed UTF-16 strings.
//!
//! `[u32 n][n x u16 LE]`, no terminator. The code units are written verbatim,
//! so the buffer round-trips any host string exactly.

use tether_core::kind::Utf16Chars;
use tether_core::{DecodeIssue, Diagnostics, HeapAccessor, Lifetime, MemoryError, Utf16Ptr};

use crate::report::DecodeReport;
use crate::{buffer_size, payload_offset, track, HEADER_BYTES};

/// Copy `s` into a freshly allocated UTF-16 buffer.
pub fn encode_utf16(
    heap: &HeapAccessor,
    diagnostics: &Diagnostics,
    s: &str,
) -> Result<Lifetime<Utf16Ptr>, MemoryError> {
    let units: Vec<u16> = s.encode_utf16().collect();
    let bytes = buffer_size(units.len(), 2, HEADER_BYTES)?;
    let count = (bytes - HEADER_BYTES) / 2;

    let ptr = heap.allocate_as::<Utf16Chars>(bytes)?;
    let buffer = track(heap, diagnostics, ptr, bytes);
    heap.write::<u32>(ptr.offset(), count)?;
    heap.view_mut::<u16>(ptr.offset() + HEADER_BYTES, count)?
        .copy_from(&units);
    Ok(buffer)
}

/// The raw code units of a UTF-16 buffer. Null reads as empty.
pub fn decode_utf16_units(heap: &HeapAccessor, ptr: Utf16Ptr) -> Result<Vec<u16>, MemoryError> {
    if ptr.is_null() {
        return Ok(Vec::new());
    }
    let count = heap.read::<u32>(ptr.offset())?;
    let start = payload_offset(ptr.offset(), heap.byte_len()?)?;
    Ok(heap.view::<u16>(start, count)?.to_vec())
}

/// Decode a UTF-16 buffer, substituting U+FFFD for unpaired surrogates.
pub fn decode_utf16_report(heap: &HeapAccessor, ptr: Utf16Ptr) -> Result<DecodeReport, MemoryError> {
    let units = decode_utf16_units(heap, ptr)?;
    let mut report = DecodeReport {
        text: String::with_capacity(units.len()),
        ..DecodeReport::default()
    };
    let mut index = 0u32;
    for decoded in char::decode_utf16(units.iter().copied()) {
        match decoded {
            Ok(c) => {
                report.text.push(c);
                index += c.len_utf16() as u32;
            }
            Err(e) => {
                report.issues.push(DecodeIssue::UnpairedSurrogate {
                    index,
                    unit: e.unpaired_surrogate(),
                });
                report.text.push(char::REPLACEMENT_CHARACTER);
                index += 1;
            }
        }
    }
    Ok(report)
}

/// Decode a UTF-16 buffer, reporting unpaired surrogates to `diagnostics`.
pub fn decode_utf16(
    heap: &HeapAccessor,
    diagnostics: &Diagnostics,
    ptr: Utf16Ptr,
) -> Result<String, MemoryError> {
    Ok(decode_utf16_report(heap, ptr)?.into_text(diagnostics))
}
