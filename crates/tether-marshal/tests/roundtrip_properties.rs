//! Property tests: every host string survives both layouts, and every
//! buffer is freed exactly once.

use proptest::prelude::*;
use tether_core::ValuePtr;
use tether_test_utils::memory_fixture;

proptest! {
    #[test]
    fn utf16_round_trip(s in any::<String>()) {
        let fx = memory_fixture();
        let buffer = fx.memory.encode_utf16(&s).unwrap();
        prop_assert_eq!(fx.memory.decode_utf16(*buffer.value()).unwrap(), s.clone());
        let units: Vec<u16> = s.encode_utf16().collect();
        prop_assert_eq!(fx.memory.decode_utf16_units(*buffer.value()).unwrap(), units);
        drop(buffer);
        prop_assert_eq!(fx.live(), 0);
    }

    #[test]
    fn utf8_round_trip(s in "[^\u{0}]*") {
        let fx = memory_fixture();
        let buffer = fx.memory.encode_utf8(&s).unwrap();
        let report = fx.memory.decode_utf8_report(*buffer.value()).unwrap();
        prop_assert!(report.is_clean());
        prop_assert_eq!(report.text, s);
        drop(buffer);
        prop_assert_eq!(fx.live(), 0);
        prop_assert!(fx.sink.is_empty());
    }

    #[test]
    fn cstring_round_trip(s in "[^\u{0}]{0,64}") {
        let fx = memory_fixture();
        let ptr = fx.memory.new_heap_char_pointer(&s).unwrap().consume().unwrap();
        prop_assert_eq!(fx.memory.consume_heap_char_pointer(ptr).unwrap(), s);
        prop_assert_eq!(fx.live(), 0);
    }

    #[test]
    fn pointer_array_preserves_order(values in proptest::collection::vec(any::<u32>(), 0..64)) {
        let fx = memory_fixture();
        let handles: Vec<ValuePtr> = values.iter().map(|&v| ValuePtr::from_offset(v)).collect();
        let array = fx.memory.to_pointer_array(&handles).unwrap();
        let slots = fx
            .memory
            .heap()
            .view::<u32>(array.value().offset(), values.len() as u32)
            .unwrap()
            .to_vec();
        prop_assert_eq!(slots, values);
        drop(array);
        prop_assert_eq!(fx.recorded().frees().len(), 1);
    }

    #[test]
    fn arbitrary_bytes_never_fail_to_decode(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let fx = memory_fixture();
        let heap = fx.memory.heap();
        let ptr = heap.allocate_as::<tether_core::kind::Utf8Chars>(bytes.len() as u32 + 5).unwrap();
        heap.write::<u32>(ptr.offset(), bytes.len() as u32).unwrap();
        heap.view_mut::<u8>(ptr.offset() + 4, bytes.len() as u32).unwrap().copy_from(&bytes);
        heap.write::<u8>(ptr.offset() + 4 + bytes.len() as u32, 0).unwrap();
        let report = fx.memory.decode_utf8_report(ptr).unwrap();
        prop_assert!(report.text.chars().count() <= bytes.len() + 1);
        if std::str::from_utf8(&bytes).is_ok() {
            prop_assert!(report.is_clean());
        }
        heap.free(ptr).unwrap();
    }
}
