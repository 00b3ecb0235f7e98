//! Tether: marshalling and ownership for a host bridged to a module running
//! in linear memory.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Tether sub-crates. For most users, adding `tether` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use tether::prelude::*;
//!
//! let memory = ModuleMemory::new(
//!     HeapAccessor::new(LinearMemory::default()),
//!     Diagnostics::configure(MemoryConfig::from_env()),
//! );
//!
//! // Pass a string in; the buffer is freed when `name` drops.
//! let name = memory.encode_utf8("hello").unwrap();
//! assert_eq!(memory.decode_utf8(*name.value()).unwrap(), "hello");
//!
//! // Collect results the module writes into a zeroed array.
//! let out = memory.new_mutable_pointer_array::<kind::ValueArray>(2).unwrap();
//! out.value().slots_mut().unwrap().copy_from(&[3, 4]);
//! assert_eq!(out.value().to_vec().unwrap(), vec![3, 4]);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tether-core` | Heap capability, views, pointers, `Lifetime`, errors |
//! | [`marshal`] | `tether-marshal` | String codecs, pointer arrays, `ModuleMemory` |
//! | [`heap`] | `tether-heap` | In-process `LinearMemory` allocator |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Heap capability, branded pointers and ownership (`tether-core`).
///
/// Implement [`types::ModuleHeap`] to bridge a real module; everything else
/// goes through [`types::HeapAccessor`].
pub use tether_core as types;

/// String codecs and pointer arrays (`tether-marshal`).
pub use tether_marshal as marshal;

/// Page-mapped linear memory with a first-fit allocator (`tether-heap`).
pub use tether_heap as heap;

/// Common imports for typical Tether usage.
///
/// ```rust
/// use tether::prelude::*;
/// ```
pub mod prelude {
    // Heap access
    pub use tether_core::{HeapAccessor, HeapView, HeapViewMut, ModuleHeap};

    // Pointers
    pub use tether_core::{
        kind, CStringPtr, ConstValuePtrArray, ContextPtrArray, Handle, HeapPtr, RawPtr,
        Utf16Ptr, Utf8Ptr, ValuePtr, ValuePtrArray,
    };

    // Ownership
    pub use tether_core::{Disposable, Lifetime, Scope};

    // Configuration and diagnostics
    pub use tether_core::{DecodeIssue, DiagnosticSink, Diagnostics, MemoryConfig};

    // Errors
    pub use tether_core::{ConfigError, LifetimeError, MemoryError};

    // Marshalling
    pub use tether_marshal::{DecodeReport, ModuleMemory, MutablePointerArray};

    // Reference heap
    pub use tether_heap::{HeapConfig, LeakStrategy, LinearMemory};
}
