//! Branded offsets into foreign linear memory.
//!
//! Every pointer the module hands out is a plain `u32` offset. [`HeapPtr`]
//! pairs that offset with a zero-sized kind marker so a UTF-16 buffer cannot
//! be passed where a value-pointer array is expected, even though both are
//! integers underneath.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

mod sealed {
    pub trait Sealed {}
}

/// Marker trait for pointer kinds.
pub trait PtrKind: sealed::Sealed + 'static {
    /// Short name used in `Debug` output.
    const NAME: &'static str;
}

/// Marker trait for kinds that address an array of 32-bit pointer slots.
pub trait PtrArrayKind: PtrKind {}

macro_rules! ptr_kinds {
    ($($(#[$meta:meta])* $kind:ident => $name:literal),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
            pub enum $kind {}

            impl sealed::Sealed for $kind {}

            impl PtrKind for $kind {
                const NAME: &'static str = $name;
            }
        )*
    };
}

/// Pointer kind markers.
pub mod kind {
    use super::{sealed, PtrArrayKind, PtrKind};

    ptr_kinds! {
        /// Freshly allocated bytes with no interpretation yet.
        Untyped => "raw",
        /// Length-prefixed UTF-16 code unit buffer.
        Utf16Chars => "utf16",
        /// Length-prefixed, NUL-terminated UTF-8 buffer.
        Utf8Chars => "utf8",
        /// Plain NUL-terminated C string with no length header.
        CChars => "cstr",
        /// A VM value slot.
        Value => "value",
        /// Mutable array of value pointers (out-parameters).
        ValueArray => "value[]",
        /// Read-only array of value pointers (argument lists).
        ConstValueArray => "const value[]",
        /// Mutable array of context pointers.
        ContextArray => "context[]",
    }

    impl PtrArrayKind for ValueArray {}
    impl PtrArrayKind for ConstValueArray {}
    impl PtrArrayKind for ContextArray {}
}

/// An offset into foreign linear memory, branded with its interpretation.
#[must_use]
pub struct HeapPtr<K: PtrKind> {
    offset: u32,
    _kind: PhantomData<K>,
}

/// Unbranded pointer, as returned by the allocator.
pub type RawPtr = HeapPtr<kind::Untyped>;
/// Pointer to a UTF-16 string buffer.
pub type Utf16Ptr = HeapPtr<kind::Utf16Chars>;
/// Pointer to a UTF-8 string buffer.
pub type Utf8Ptr = HeapPtr<kind::Utf8Chars>;
/// Pointer to a NUL-terminated C string.
pub type CStringPtr = HeapPtr<kind::CChars>;
/// Pointer to a VM value.
pub type ValuePtr = HeapPtr<kind::Value>;
/// Pointer to a mutable array of value pointers.
pub type ValuePtrArray = HeapPtr<kind::ValueArray>;
/// Pointer to a read-only array of value pointers.
pub type ConstValuePtrArray = HeapPtr<kind::ConstValueArray>;
/// Pointer to a mutable array of context pointers.
pub type ContextPtrArray = HeapPtr<kind::ContextArray>;

impl<K: PtrKind> HeapPtr<K> {
    /// The null offset.
    pub const NULL: Self = Self::from_offset(0);

    /// Wrap an offset received from the module.
    ///
    /// The module is the only source of truth for what an offset means, so
    /// accepting one from a foreign call is how a pointer enters the host.
    pub const fn from_offset(offset: u32) -> Self {
        Self {
            offset,
            _kind: PhantomData,
        }
    }

    /// The underlying byte offset.
    pub const fn offset(self) -> u32 {
        self.offset
    }

    /// Whether this is the null offset.
    pub const fn is_null(self) -> bool {
        self.offset == 0
    }

    /// Erase the kind, e.g. to pass the pointer to `free`.
    pub const fn erase(self) -> RawPtr {
        HeapPtr::from_offset(self.offset)
    }

    /// Byte offset `bytes` past this pointer, still unbranded.
    pub const fn byte_add(self, bytes: u32) -> RawPtr {
        HeapPtr::from_offset(self.offset.wrapping_add(bytes))
    }
}

impl RawPtr {
    /// Assign an interpretation to freshly allocated bytes.
    pub(crate) const fn brand<K: PtrKind>(self) -> HeapPtr<K> {
        HeapPtr::from_offset(self.offset)
    }
}

impl<K: PtrKind> Clone for HeapPtr<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: PtrKind> Copy for HeapPtr<K> {}

impl<K: PtrKind> PartialEq for HeapPtr<K> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
    }
}

impl<K: PtrKind> Eq for HeapPtr<K> {}

impl<K: PtrKind> Hash for HeapPtr<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.offset.hash(state);
    }
}

impl<K: PtrKind> fmt::Debug for HeapPtr<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeapPtr<{}>({:#x})", K::NAME, self.offset)
    }
}

impl<K: PtrKind> fmt::Display for HeapPtr<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.offset)
    }
}

/// Something that crosses the boundary as a 32-bit value pointer.
pub trait Handle {
    /// The numeric value written into pointer arrays.
    fn value(&self) -> u32;
}

impl Handle for ValuePtr {
    fn value(&self) -> u32 {
        self.offset
    }
}

impl Handle for RawPtr {
    fn value(&self) -> u32 {
        self.offset
    }
}

impl Handle for u32 {
    fn value(&self) -> u32 {
        *self
    }
}

impl<H: Handle + ?Sized> Handle for &H {
    fn value(&self) -> u32 {
        (**self).value()
    }
}
