//! Integration tests through the facade: a custom module heap, ownership
//! chains and teardown accounting.

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use tether::prelude::*;
use tether_test_utils::{memory_fixture, RecordingSink};

/// A module whose allocator reserves a header word in front of every block,
/// like a libc-style malloc compiled into the module.
struct HeaderedModule {
    memory: Vec<u8>,
    next: u32,
    freed: Vec<u32>,
}

impl HeaderedModule {
    fn new() -> Self {
        Self {
            memory: vec![0; 4096],
            next: 16,
            freed: Vec::new(),
        }
    }
}

impl ModuleHeap for HeaderedModule {
    fn malloc(&mut self, size: u32) -> u32 {
        let block = self.next;
        let end = block as usize + 4 + size as usize;
        if end > self.memory.len() {
            return 0;
        }
        self.memory[block as usize..block as usize + 4].copy_from_slice(&size.to_le_bytes());
        self.next = (end as u32).next_multiple_of(8);
        block + 4
    }

    fn free(&mut self, offset: u32) {
        self.freed.push(offset);
    }

    fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    fn utf8_byte_length(&self, s: &str) -> usize {
        // Worst case of three bytes per UTF-16 code unit.
        s.encode_utf16().count() * 3
    }
}

#[test]
fn custom_module_heap_round_trips() {
    let module = Rc::new(RefCell::new(HeaderedModule::new()));
    let memory = ModuleMemory::new(HeapAccessor::from_rc(module.clone()), Diagnostics::default());

    let s = memory.encode_utf8("añ😀").unwrap();
    let ptr = *s.value();
    // The module's estimate reserved 4 code units x 3 bytes.
    let reserved = memory.heap().read::<u32>(ptr.offset() - 4).unwrap();
    assert_eq!(reserved, 4 + 12 + 1);
    assert_eq!(memory.decode_utf8(ptr).unwrap(), "añ😀");

    drop(s);
    assert_eq!(module.borrow().freed, vec![ptr.offset()]);
}

#[test]
fn out_of_order_disposal_fails_fast() {
    let fx = memory_fixture();
    let owner = fx.memory.encode_utf16("owner").unwrap();
    let mut dependent = fx.memory.encode_utf16("dependent").unwrap().owned_by(&owner);
    drop(owner);

    let result = catch_unwind(AssertUnwindSafe(|| dependent.dispose()));
    assert!(result.is_err());
    assert!(!dependent.alive());
    // The dependent's disposer never ran; only the owner was freed.
    assert_eq!(fx.recorded().frees().len(), 1);
}

#[test]
fn use_after_dispose_is_reported() {
    let fx = memory_fixture();
    let mut s = fx.memory.encode_utf8("gone").unwrap();
    s.dispose();
    assert_eq!(s.try_value().unwrap_err(), LifetimeError::UseAfterDispose);
    assert_eq!(s.consume().unwrap_err(), LifetimeError::UseAfterDispose);
}

#[test]
fn duplicated_handles_share_a_single_release() {
    let released = Rc::new(RefCell::new(Vec::new()));
    let log = released.clone();
    let original = Lifetime::with_disposer(ValuePtr::from_offset(40), move |v| {
        log.borrow_mut().push(v.offset())
    })
    .with_copier(|v| ValuePtr::from_offset(v.offset() + 1));

    let copy = original.dup().unwrap();
    assert_eq!(copy.value().offset(), 41);
    drop(copy);
    drop(original);
    assert_eq!(*released.borrow(), vec![41, 40]);

    let plain = Lifetime::new(ValuePtr::from_offset(1));
    assert_eq!(plain.dup().unwrap_err(), LifetimeError::NotDuplicable);
}

#[test]
fn teardown_reports_what_callers_leaked() {
    let memory = Rc::new(RefCell::new(
        LinearMemory::new(
            HeapConfig::builder()
                .leak_strategy(LeakStrategy::Ignore)
                .build()
                .unwrap(),
        )
        .unwrap(),
    ));
    let module = ModuleMemory::new(HeapAccessor::from_rc(memory.clone()), Diagnostics::default());

    let kept = module.encode_utf16("kept").unwrap();
    let leaked = module.encode_utf8("leaked").unwrap().consume().unwrap();
    drop(kept);

    let leaks = memory.borrow_mut().teardown();
    assert_eq!(leaks.len(), 1);
    assert_eq!(leaks[0].offset, leaked.offset());
    assert_eq!(leaks[0].requested, 6 + 5);
}

#[test]
fn diagnostics_are_injected_per_memory() {
    let sink = Rc::new(RecordingSink::new());
    let config = MemoryConfig::builder().debug(true).build().unwrap();
    let memory = ModuleMemory::new(
        HeapAccessor::new(LinearMemory::default()),
        Diagnostics::configure(config).with_sink(sink.clone()),
    );
    assert!(memory.diagnostics().debug_enabled());

    let ptr = memory.heap().allocate_as::<kind::Utf16Chars>(6).unwrap();
    memory.heap().write::<u32>(ptr.offset(), 1).unwrap();
    memory.heap().write::<u16>(ptr.offset() + 4, 0xdc00).unwrap();
    assert_eq!(memory.decode_utf16(ptr).unwrap(), "\u{fffd}");
    assert_eq!(
        sink.issues(),
        vec![DecodeIssue::UnpairedSurrogate {
            index: 0,
            unit: 0xdc00
        }]
    );
}
