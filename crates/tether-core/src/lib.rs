//! Core types for marshalling into a foreign module's linear memory.
//!
//! This is the leaf crate of the Tether workspace. It defines the heap
//! capability a loaded module exposes, the shared accessor and typed views
//! over it, branded pointers, the [`Lifetime`] ownership tracker and the
//! error and diagnostics types used throughout.
//!
//! # Ownership model
//!
//! ```text
//! HeapAccessor (Rc<RefCell<dyn ModuleHeap>>, shared)
//! ├── allocate / free        refused while a view is alive
//! ├── HeapView / HeapViewMut borrow the heap, never stored
//! └── Lifetime<HeapPtr<K>>   disposer captures an accessor clone
//!     └── owned_by(owner)    dependency, released before the owner
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod heap;
pub mod lifetime;
pub mod ptr;
pub mod scope;

pub use config::MemoryConfig;
pub use diagnostics::{DecodeIssue, DiagnosticSink, Diagnostics, TracingSink};
pub use error::{ConfigError, LifetimeError, MemoryError};
pub use heap::{HeapAccessor, HeapView, HeapViewMut, ModuleHeap, Word};
pub use lifetime::{Disposable, Lifetime};
pub use ptr::{
    kind, ConstValuePtrArray, ContextPtrArray, CStringPtr, Handle, HeapPtr, PtrArrayKind,
    PtrKind, RawPtr, Utf16Ptr, Utf8Ptr, ValuePtr, ValuePtrArray,
};
pub use scope::Scope;
