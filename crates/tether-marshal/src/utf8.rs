//! Header-prefixed, NUL-terminated UTF-8 strings.
//!
//! `[u32 header][UTF-8 bytes][0x00]`. The encoder stores the UTF-16 code-unit
//! length of the source string in the header, while modules producing these
//! buffers treat the field as a payload byte count. The decoder honours the
//! byte-count reading:
//!
//! * bytes before `header` are always decoded, and a sequence that starts
//!   before it is completed even when it extends past it;
//! * once `header` bytes are consumed, decoding continues up to the NUL
//!   terminator, bounded by [`MemoryConfig::max_scan_bytes`] and the end of
//!   linear memory.
//!
//! A code-unit count is never larger than the UTF-8 length of the same
//! string, so buffers written by [`encode_utf8`] decode back in full. An
//! interior NUL past the header bound ends the string. When the payload is
//! truncated, the header is clamped to the bytes written so the declared
//! range never reaches past the terminator.
//!
//! [`MemoryConfig::max_scan_bytes`]: tether_core::MemoryConfig::max_scan_bytes

use tether_core::kind::Utf8Chars;
use tether_core::{DecodeIssue, Diagnostics, HeapAccessor, Lifetime, MemoryError, Utf8Ptr};

use crate::report::DecodeReport;
use crate::{buffer_size, payload_offset, track, HEADER_BYTES};

/// Copy `s` into a freshly allocated UTF-8 buffer.
///
/// The payload capacity comes from the module's
/// [`utf8_byte_length`](tether_core::ModuleHeap::utf8_byte_length). If that
/// underestimates, the payload stops before the first character that does
/// not fit; a multi-byte sequence is never split, and the header drops to
/// the written byte count.
pub fn encode_utf8(
    heap: &HeapAccessor,
    diagnostics: &Diagnostics,
    s: &str,
) -> Result<Lifetime<Utf8Ptr>, MemoryError> {
    let capacity = heap.utf8_byte_length(s)?;
    let bytes = buffer_size(capacity, 1, HEADER_BYTES + 1)?;
    let code_units = s.encode_utf16().count();
    let header = u32::try_from(code_units).map_err(|_| MemoryError::SizeOverflow {
        count: code_units,
        element_size: 2,
    })?;

    let ptr = heap.allocate_as::<Utf8Chars>(bytes)?;
    let buffer = track(heap, diagnostics, ptr, bytes);
    let mut payload = heap.view_mut::<u8>(ptr.offset() + HEADER_BYTES, bytes - HEADER_BYTES)?;
    let written = write_terminated(s, payload.as_bytes_mut());
    drop(payload);
    let header = if written < s.len() {
        tracing::warn!(
            target: "tether",
            ptr = %ptr,
            written,
            needed = s.len(),
            "module underestimated UTF-8 length; string truncated"
        );
        // `written` fits in the payload, which fits in a u32.
        header.min(written as u32)
    } else {
        header
    };
    heap.write::<u32>(ptr.offset(), header)?;
    Ok(buffer)
}

/// Write `s` followed by a NUL into `out`, skipping every character that
/// would not fit in front of the terminator. Returns the payload length.
pub(crate) fn write_terminated(s: &str, out: &mut [u8]) -> usize {
    let Some(limit) = out.len().checked_sub(1) else {
        return 0;
    };
    let mut pos = 0;
    for c in s.chars() {
        let need = c.len_utf8();
        if pos + need > limit {
            break;
        }
        c.encode_utf8(&mut out[pos..pos + need]);
        pos += need;
    }
    out[pos] = 0;
    pos
}

/// Decode a UTF-8 buffer, collecting malformed sequences instead of
/// reporting them. Null reads as empty.
pub fn decode_utf8_report(
    heap: &HeapAccessor,
    ptr: Utf8Ptr,
    max_scan_bytes: u32,
) -> Result<DecodeReport, MemoryError> {
    if ptr.is_null() {
        return Ok(DecodeReport::default());
    }
    let header = heap.read::<u32>(ptr.offset())?;
    let memory_len = heap.byte_len()?;
    let start = payload_offset(ptr.offset(), memory_len)?;
    let rest = heap.view_to_end(start)?;
    let bytes = rest.as_bytes();

    let declared = header as usize;
    if declared > bytes.len() {
        return Err(MemoryError::OutOfBounds {
            offset: start,
            len: header,
            memory_len,
        });
    }
    let limit = bytes.len().min(declared.saturating_add(max_scan_bytes as usize));
    Ok(decode_bytes(&bytes[..limit], start, declared))
}

/// Decode a UTF-8 buffer, reporting malformed sequences to `diagnostics`.
pub fn decode_utf8(
    heap: &HeapAccessor,
    diagnostics: &Diagnostics,
    ptr: Utf8Ptr,
) -> Result<String, MemoryError> {
    let report = decode_utf8_report(heap, ptr, diagnostics.config().max_scan_bytes)?;
    Ok(report.into_text(diagnostics))
}

/// Best-effort decode of `bytes`, whose first byte lives at heap offset
/// `base`. Decoding stops at the first NUL at or after `declared`, or at
/// the end of `bytes`.
pub(crate) fn decode_bytes(bytes: &[u8], base: u32, declared: usize) -> DecodeReport {
    let mut report = DecodeReport {
        text: String::with_capacity(bytes.len().min(declared.max(16))),
        ..DecodeReport::default()
    };
    let mut idx = 0;
    while idx < bytes.len() {
        let lead = bytes[idx];
        if idx >= declared && lead == 0 {
            break;
        }
        let offset = base.wrapping_add(idx as u32);
        let (len, init) = match lead {
            0x00..=0x7f => {
                report.text.push(char::from(lead));
                idx += 1;
                continue;
            }
            _ if lead & 0xe0 == 0xc0 => (2, u32::from(lead & 0x1f)),
            _ if lead & 0xf0 == 0xe0 => (3, u32::from(lead & 0x0f)),
            _ if lead & 0xf8 == 0xf0 => (4, u32::from(lead & 0x07)),
            _ => {
                report.issues.push(DecodeIssue::InvalidLeadByte { offset, byte: lead });
                report.text.push(char::REPLACEMENT_CHARACTER);
                idx += 1;
                continue;
            }
        };
        let Some(tail) = bytes.get(idx + 1..idx + len) else {
            report.issues.push(DecodeIssue::Truncated { offset });
            report.text.push(char::REPLACEMENT_CHARACTER);
            break;
        };
        // Continuation bytes contribute their low six bits unchecked.
        let code_point = tail
            .iter()
            .fold(init, |acc, &b| (acc << 6) | u32::from(b & 0x3f));
        match char::from_u32(code_point) {
            Some(c) => report.text.push(c),
            None => {
                let issue = if code_point > 0x10ffff {
                    DecodeIssue::CodePointOutOfRange { offset, code_point }
                } else {
                    DecodeIssue::SurrogateCodePoint { offset, code_point }
                };
                report.issues.push(issue);
                report.text.push(char::REPLACEMENT_CHARACTER);
            }
        }
        idx += len;
    }
    report
}
