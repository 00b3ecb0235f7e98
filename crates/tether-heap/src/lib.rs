//! In-process linear memory for the Tether workspace.
//!
//! [`LinearMemory`] implements [`ModuleHeap`](tether_core::ModuleHeap) the
//! way a compiled module's allocator does: 64KB pages, growth on demand,
//! null on exhaustion, 8-byte aligned first-fit blocks. It backs the test
//! suites and benchmarks and serves as a host-side heap when no module is
//! loaded.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
mod free_list;
pub mod linear;

pub use config::{HeapConfig, LeakStrategy, PAGE_SIZE};
pub use linear::{HeapStats, Leak, LinearMemory};
