//! Test utilities and mock heaps for Tether development.
//!
//! Provides instrumented implementations of [`ModuleHeap`] and
//! [`DiagnosticSink`], and [`fixtures`] that wire them into a
//! [`ModuleMemory`](tether_marshal::ModuleMemory).

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::cell::RefCell;

use tether_core::{DecodeIssue, DiagnosticSink, ModuleHeap};
use tether_heap::{HeapConfig, LeakStrategy, LinearMemory};

pub use fixtures::{failing_memory, memory_fixture, MemoryFixture};

/// One call the code under test made into a module heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeapCall {
    Malloc { size: u32, offset: u32 },
    Free { offset: u32 },
}

/// [`LinearMemory`] that records every `malloc` and `free`.
///
/// Use [`calls`](RecordingHeap::calls) to assert exact allocation traffic,
/// e.g. that a disposer freed an offset exactly once.
#[derive(Debug)]
pub struct RecordingHeap {
    memory: LinearMemory,
    calls: Vec<HeapCall>,
    utf8_len_override: Option<fn(&str) -> usize>,
}

impl RecordingHeap {
    /// Wrap a small memory that reports leaks silently.
    pub fn new() -> Self {
        let config = HeapConfig::builder()
            .initial_pages(1)
            .max_pages(4)
            .leak_strategy(LeakStrategy::Ignore)
            .build()
            .expect("test heap config is valid");
        Self::with_memory(LinearMemory::new(config).expect("test heap config is valid"))
    }

    pub fn with_memory(memory: LinearMemory) -> Self {
        Self {
            memory,
            calls: Vec::new(),
            utf8_len_override: None,
        }
    }

    /// Replace the module's UTF-8 length estimate, to model a module that
    /// under- or over-reserves.
    pub fn with_utf8_len(mut self, f: fn(&str) -> usize) -> Self {
        self.utf8_len_override = Some(f);
        self
    }

    pub fn calls(&self) -> &[HeapCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Offsets freed so far, in order.
    pub fn frees(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                HeapCall::Free { offset } => Some(*offset),
                HeapCall::Malloc { .. } => None,
            })
            .collect()
    }

    /// Successful allocations so far, as `(size, offset)`.
    pub fn mallocs(&self) -> Vec<(u32, u32)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                HeapCall::Malloc { size, offset } if *offset != 0 => Some((*size, *offset)),
                _ => None,
            })
            .collect()
    }

    pub fn memory_state(&self) -> &LinearMemory {
        &self.memory
    }
}

impl Default for RecordingHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleHeap for RecordingHeap {
    fn malloc(&mut self, size: u32) -> u32 {
        let offset = self.memory.malloc(size);
        self.calls.push(HeapCall::Malloc { size, offset });
        offset
    }

    fn free(&mut self, offset: u32) {
        self.calls.push(HeapCall::Free { offset });
        self.memory.free(offset);
    }

    fn memory(&self) -> &[u8] {
        self.memory.memory()
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        self.memory.memory_mut()
    }

    fn utf8_byte_length(&self, s: &str) -> usize {
        match self.utf8_len_override {
            Some(f) => f(s),
            None => self.memory.utf8_byte_length(s),
        }
    }
}

/// A heap whose allocator is always exhausted.
#[derive(Debug)]
pub struct FailingHeap {
    memory: Vec<u8>,
}

impl FailingHeap {
    pub fn new(len: usize) -> Self {
        Self {
            memory: vec![0; len],
        }
    }
}

impl Default for FailingHeap {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ModuleHeap for FailingHeap {
    fn malloc(&mut self, _size: u32) -> u32 {
        0
    }

    fn free(&mut self, offset: u32) {
        panic!("FailingHeap never allocated {offset:#x}");
    }

    fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }
}

/// Sink that keeps every degraded-decode issue.
#[derive(Debug, Default)]
pub struct RecordingSink {
    issues: RefCell<Vec<DecodeIssue>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issues(&self) -> Vec<DecodeIssue> {
        self.issues.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.borrow().is_empty()
    }
}

impl DiagnosticSink for RecordingSink {
    fn degraded(&self, issue: &DecodeIssue) {
        self.issues.borrow_mut().push(*issue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_heap_logs_traffic() {
        let mut heap = RecordingHeap::new();
        let a = heap.malloc(16);
        heap.free(a);
        assert_eq!(
            heap.calls(),
            &[HeapCall::Malloc { size: 16, offset: a }, HeapCall::Free { offset: a }]
        );
        assert_eq!(heap.frees(), vec![a]);
    }

    #[test]
    fn utf8_override_applies() {
        let heap = RecordingHeap::new().with_utf8_len(|_| 1);
        assert_eq!(heap.utf8_byte_length("long"), 1);
        assert_eq!(RecordingHeap::new().utf8_byte_length("long"), 4);
    }

    #[test]
    fn failing_heap_is_exhausted() {
        let mut heap = FailingHeap::default();
        assert_eq!(heap.malloc(1), 0);
    }
}
