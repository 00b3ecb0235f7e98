//! Ready-wired memories for codec and ownership tests.
//!
//! - [`memory_fixture`]: a [`ModuleMemory`] over a [`RecordingHeap`] reporting
//!   into a [`RecordingSink`].
//! - [`failing_memory`]: a [`ModuleMemory`] whose allocator is exhausted.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use tether_core::{Diagnostics, HeapAccessor, MemoryConfig};
use tether_marshal::ModuleMemory;

use crate::{FailingHeap, RecordingHeap, RecordingSink};

/// A memory plus handles to inspect what it did.
pub struct MemoryFixture {
    pub memory: ModuleMemory,
    pub heap: Rc<RefCell<RecordingHeap>>,
    pub sink: Rc<RecordingSink>,
}

impl MemoryFixture {
    /// Wire `heap` with default config.
    pub fn new(heap: RecordingHeap) -> Self {
        Self::with_config(heap, MemoryConfig::default())
    }

    pub fn with_config(heap: RecordingHeap, config: MemoryConfig) -> Self {
        let heap = Rc::new(RefCell::new(heap));
        let sink = Rc::new(RecordingSink::new());
        let diagnostics = Diagnostics::configure(config).with_sink(sink.clone());
        let memory = ModuleMemory::new(HeapAccessor::from_rc(heap.clone()), diagnostics);
        Self { memory, heap, sink }
    }

    /// Borrow the recording heap. Drop before the next memory operation.
    pub fn recorded(&self) -> Ref<'_, RecordingHeap> {
        self.heap.borrow()
    }

    /// Number of allocations still live.
    pub fn live(&self) -> usize {
        self.heap.borrow().memory_state().stats().live_allocations
    }
}

/// A memory over a fresh [`RecordingHeap`].
pub fn memory_fixture() -> MemoryFixture {
    MemoryFixture::new(RecordingHeap::new())
}

/// A memory whose every allocation fails.
pub fn failing_memory() -> ModuleMemory {
    ModuleMemory::new(
        HeapAccessor::new(FailingHeap::default()),
        Diagnostics::default(),
    )
}
