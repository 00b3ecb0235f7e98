//! Access to the foreign module's allocator and linear memory.
//!
//! [`ModuleHeap`] is the capability surface a loaded module exports:
//! `malloc`, `free` and its memory buffer. [`HeapAccessor`] is the shared,
//! cheaply cloned handle the rest of the workspace goes through.
//!
//! # View invalidation
//!
//! `malloc` may grow linear memory, which moves the backing buffer. A typed
//! window ([`HeapView`], [`HeapViewMut`]) therefore holds a borrow of the heap
//! for as long as it lives. While any view is alive, [`HeapAccessor::allocate`]
//! and [`HeapAccessor::free`] return [`MemoryError::HeapBusy`] instead of
//! touching the module, so a view can never observe a resized heap. Views
//! are re-derived per access and never stored.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::error::MemoryError;
use crate::ptr::{HeapPtr, PtrKind, RawPtr};

/// The allocator and memory exported by a foreign module.
///
/// Offsets are byte offsets into [`memory`](ModuleHeap::memory). Offset 0 is
/// the null pointer and is never returned by a successful `malloc`.
pub trait ModuleHeap {
    /// Allocate `size` bytes, returning the offset or 0 when exhausted.
    fn malloc(&mut self, size: u32) -> u32;

    /// Release an offset previously returned by `malloc`.
    ///
    /// Calling this twice for the same offset, or with an offset `malloc`
    /// never returned, is undefined at the module level. Callers prevent it.
    fn free(&mut self, offset: u32);

    /// The whole linear memory.
    fn memory(&self) -> &[u8];

    /// The whole linear memory, mutably.
    fn memory_mut(&mut self) -> &mut [u8];

    /// Worst-case UTF-8 byte length of `s`, excluding header and terminator.
    fn utf8_byte_length(&self, s: &str) -> usize {
        s.len()
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A fixed-width little-endian element of a heap window.
pub trait Word: sealed::Sealed + Copy + Default + fmt::Debug + 'static {
    /// Width in bytes.
    const SIZE: u32;

    /// Decode from exactly `SIZE` bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Encode into exactly `SIZE` bytes.
    fn write_le(self, bytes: &mut [u8]);
}

macro_rules! impl_word {
    ($($ty:ty),*) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Word for $ty {
                const SIZE: u32 = std::mem::size_of::<$ty>() as u32;

                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(buf)
                }

                fn write_le(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_word!(u8, u16, u32, i32);

/// Shared handle to a foreign module's heap.
///
/// Borrowed for the lifetime of the module; cloning shares the same heap.
/// Single-threaded by construction (`Rc`), matching the module's execution
/// model.
#[derive(Clone)]
pub struct HeapAccessor {
    inner: Rc<RefCell<dyn ModuleHeap>>,
}

impl HeapAccessor {
    /// Take ownership of a module heap.
    pub fn new<H: ModuleHeap + 'static>(heap: H) -> Self {
        Self {
            inner: Rc::new(RefCell::new(heap)),
        }
    }

    /// Share a module heap the caller keeps its own handle to.
    pub fn from_rc<H: ModuleHeap + 'static>(heap: Rc<RefCell<H>>) -> Self {
        Self { inner: heap }
    }

    /// Whether two accessors address the same heap.
    pub fn same_heap(&self, other: &HeapAccessor) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Allocate `size` bytes.
    ///
    /// Returns [`MemoryError::OutOfMemory`] when the module returns null and
    /// [`MemoryError::HeapBusy`] while a view is alive.
    pub fn allocate(&self, size: u32) -> Result<RawPtr, MemoryError> {
        let mut heap = self.borrow_mut()?;
        match heap.malloc(size) {
            0 => Err(MemoryError::OutOfMemory { requested: size }),
            offset => Ok(RawPtr::from_offset(offset)),
        }
    }

    /// Allocate `size` bytes branded as kind `K`.
    pub fn allocate_as<K: PtrKind>(&self, size: u32) -> Result<HeapPtr<K>, MemoryError> {
        self.allocate(size).map(RawPtr::brand)
    }

    /// Allocate `size` bytes and zero them.
    pub fn allocate_zeroed_as<K: PtrKind>(&self, size: u32) -> Result<HeapPtr<K>, MemoryError> {
        let ptr = self.allocate_as::<K>(size)?;
        match self.view_mut::<u8>(ptr.offset(), size) {
            Ok(mut bytes) => {
                bytes.fill(0);
                Ok(ptr)
            }
            Err(e) => {
                self.free(ptr)?;
                Err(e)
            }
        }
    }

    /// Release an allocation. Null is ignored.
    pub fn free<K: PtrKind>(&self, ptr: HeapPtr<K>) -> Result<(), MemoryError> {
        if ptr.is_null() {
            return Ok(());
        }
        self.borrow_mut()?.free(ptr.offset());
        Ok(())
    }

    /// Current size of linear memory in bytes.
    pub fn byte_len(&self) -> Result<usize, MemoryError> {
        Ok(self.borrow()?.memory().len())
    }

    /// Worst-case UTF-8 length of `s` as computed by the module.
    pub fn utf8_byte_length(&self, s: &str) -> Result<usize, MemoryError> {
        Ok(self.borrow()?.utf8_byte_length(s))
    }

    /// Read one element at a byte offset.
    pub fn read<W: Word>(&self, offset: u32) -> Result<W, MemoryError> {
        let view = self.view::<W>(offset, 1)?;
        Ok(W::read_le(view.as_bytes()))
    }

    /// Write one element at a byte offset.
    pub fn write<W: Word>(&self, offset: u32, value: W) -> Result<(), MemoryError> {
        let mut view = self.view_mut::<W>(offset, 1)?;
        value.write_le(view.as_bytes_mut());
        Ok(())
    }

    /// A read-only window of `len` elements starting at byte `offset`.
    pub fn view<W: Word>(&self, offset: u32, len: u32) -> Result<HeapView<'_, W>, MemoryError> {
        let heap = self.borrow()?;
        let range = checked_range::<W>(offset, len, heap.memory().len())?;
        Ok(HeapView {
            bytes: Ref::map(heap, |h| &h.memory()[range]),
            _word: PhantomData,
        })
    }

    /// A writable window of `len` elements starting at byte `offset`.
    pub fn view_mut<W: Word>(
        &self,
        offset: u32,
        len: u32,
    ) -> Result<HeapViewMut<'_, W>, MemoryError> {
        let heap = self.borrow_mut()?;
        let range = checked_range::<W>(offset, len, heap.memory().len())?;
        Ok(HeapViewMut {
            bytes: RefMut::map(heap, |h| &mut h.memory_mut()[range]),
            _word: PhantomData,
        })
    }

    /// Every byte from `offset` to the end of linear memory.
    ///
    /// Used to scan for terminators whose position is not known up front.
    pub fn view_to_end(&self, offset: u32) -> Result<HeapView<'_, u8>, MemoryError> {
        let heap = self.borrow()?;
        let memory_len = heap.memory().len();
        let start = offset as usize;
        if start > memory_len {
            return Err(MemoryError::OutOfBounds {
                offset,
                len: 0,
                memory_len,
            });
        }
        Ok(HeapView {
            bytes: Ref::map(heap, |h| &h.memory()[start..]),
            _word: PhantomData,
        })
    }

    fn borrow(&self) -> Result<Ref<'_, dyn ModuleHeap + 'static>, MemoryError> {
        self.inner.try_borrow().map_err(|_| MemoryError::HeapBusy)
    }

    fn borrow_mut(&self) -> Result<RefMut<'_, dyn ModuleHeap + 'static>, MemoryError> {
        self.inner.try_borrow_mut().map_err(|_| MemoryError::HeapBusy)
    }
}

impl fmt::Debug for HeapAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("HeapAccessor");
        match self.inner.try_borrow() {
            Ok(heap) => s.field("memory_len", &heap.memory().len()),
            Err(_) => s.field("memory_len", &"<borrowed>"),
        };
        s.finish()
    }
}

fn checked_range<W: Word>(
    offset: u32,
    len: u32,
    memory_len: usize,
) -> Result<std::ops::Range<usize>, MemoryError> {
    let out_of_bounds = || MemoryError::OutOfBounds {
        offset,
        len: len.saturating_mul(W::SIZE),
        memory_len,
    };
    let bytes = (len as usize)
        .checked_mul(W::SIZE as usize)
        .ok_or_else(out_of_bounds)?;
    let start = offset as usize;
    let end = start.checked_add(bytes).ok_or_else(out_of_bounds)?;
    if end > memory_len {
        return Err(out_of_bounds());
    }
    Ok(start..end)
}

/// Read-only typed window over linear memory.
///
/// Holds a shared borrow of the heap; allocation is refused until it drops.
pub struct HeapView<'a, W: Word> {
    bytes: Ref<'a, [u8]>,
    _word: PhantomData<W>,
}

impl<W: Word> HeapView<'_, W> {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.bytes.len() / W::SIZE as usize
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Element at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<W> {
        let size = W::SIZE as usize;
        let start = index.checked_mul(size)?;
        let bytes = self.bytes.get(start..start.checked_add(size)?)?;
        Some(W::read_le(bytes))
    }

    /// Iterate over the elements.
    pub fn iter(&self) -> impl Iterator<Item = W> + '_ {
        self.bytes
            .chunks_exact(W::SIZE as usize)
            .map(W::read_le)
    }

    /// Copy the window out.
    pub fn to_vec(&self) -> Vec<W> {
        self.iter().collect()
    }

    /// The raw bytes behind the window.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Writable typed window over linear memory.
///
/// Holds an exclusive borrow of the heap; every other heap operation is
/// refused until it drops.
pub struct HeapViewMut<'a, W: Word> {
    bytes: RefMut<'a, [u8]>,
    _word: PhantomData<W>,
}

impl<W: Word> HeapViewMut<'_, W> {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.bytes.len() / W::SIZE as usize
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Element at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<W> {
        let size = W::SIZE as usize;
        let start = index.checked_mul(size)?;
        let bytes = self.bytes.get(start..start.checked_add(size)?)?;
        Some(W::read_le(bytes))
    }

    /// Overwrite the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`, like slice indexing.
    pub fn set(&mut self, index: usize, value: W) {
        let size = W::SIZE as usize;
        let start = index * size;
        value.write_le(&mut self.bytes[start..start + size]);
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, value: W) {
        for chunk in self.bytes.chunks_exact_mut(W::SIZE as usize) {
            value.write_le(chunk);
        }
    }

    /// Write `values` starting at element 0.
    ///
    /// # Panics
    ///
    /// Panics if `values` is longer than the window.
    pub fn copy_from(&mut self, values: &[W]) {
        assert!(
            values.len() <= self.len(),
            "copy of {} elements into a window of {}",
            values.len(),
            self.len()
        );
        let size = W::SIZE as usize;
        for (chunk, value) in self.bytes.chunks_exact_mut(size).zip(values) {
            value.write_le(chunk);
        }
    }

    /// Copy the window out.
    pub fn to_vec(&self) -> Vec<W> {
        self.bytes
            .chunks_exact(W::SIZE as usize)
            .map(W::read_le)
            .collect()
    }

    /// The raw bytes behind the window.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The raw bytes behind the window, mutably.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bump allocator over a fixed buffer, enough to exercise the accessor.
    struct BumpHeap {
        memory: Vec<u8>,
        cursor: u32,
        freed: Vec<u32>,
    }

    impl BumpHeap {
        fn new(len: usize) -> Self {
            Self {
                memory: vec![0xAA; len],
                cursor: 8,
                freed: Vec::new(),
            }
        }
    }

    impl ModuleHeap for BumpHeap {
        fn malloc(&mut self, size: u32) -> u32 {
            let offset = self.cursor;
            let end = offset as usize + size as usize;
            if end > self.memory.len() {
                return 0;
            }
            self.cursor = end as u32;
            offset
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
    }

    #[test]
    fn allocate_returns_offsets() {
        let heap = HeapAccessor::new(BumpHeap::new(64));
        let a = heap.allocate(4).unwrap();
        let b = heap.allocate(4).unwrap();
        assert_eq!(a.offset(), 8);
        assert_eq!(b.offset(), 12);
    }

    #[test]
    fn null_allocation_is_out_of_memory() {
        let heap = HeapAccessor::new(BumpHeap::new(16));
        assert_eq!(
            heap.allocate(64),
            Err(MemoryError::OutOfMemory { requested: 64 })
        );
    }

    #[test]
    fn words_are_little_endian() {
        let heap = HeapAccessor::new(BumpHeap::new(32));
        heap.write::<u32>(8, 0x0403_0201).unwrap();
        let bytes = heap.view::<u8>(8, 4).unwrap().to_vec();
        assert_eq!(bytes, vec![1, 2, 3, 4]);
        assert_eq!(heap.read::<u16>(8).unwrap(), 0x0201);
        assert_eq!(heap.read::<u16>(10).unwrap(), 0x0403);
    }

    #[test]
    fn unaligned_access_is_allowed() {
        let heap = HeapAccessor::new(BumpHeap::new(32));
        heap.write::<i32>(9, -2).unwrap();
        assert_eq!(heap.read::<i32>(9).unwrap(), -2);
    }

    #[test]
    fn out_of_bounds_is_an_error() {
        let heap = HeapAccessor::new(BumpHeap::new(16));
        assert_eq!(
            heap.read::<u32>(14),
            Err(MemoryError::OutOfBounds {
                offset: 14,
                len: 4,
                memory_len: 16
            })
        );
        assert!(heap.view::<u16>(u32::MAX, 2).is_err());
    }

    #[test]
    fn live_view_blocks_allocation() {
        let heap = HeapAccessor::new(BumpHeap::new(64));
        let view = heap.view::<u8>(0, 4).unwrap();
        assert_eq!(heap.allocate(4), Err(MemoryError::HeapBusy));
        assert_eq!(
            heap.free(RawPtr::from_offset(8)),
            Err(MemoryError::HeapBusy)
        );
        drop(view);
        assert!(heap.allocate(4).is_ok());
    }

    #[test]
    fn live_mutable_view_blocks_reads() {
        let heap = HeapAccessor::new(BumpHeap::new(64));
        let clone = heap.clone();
        let _view = heap.view_mut::<u32>(8, 2).unwrap();
        assert_eq!(clone.read::<u32>(8), Err(MemoryError::HeapBusy));
    }

    #[test]
    fn zeroed_allocation_clears_stale_bytes() {
        let heap = HeapAccessor::new(BumpHeap::new(64));
        let ptr = heap.allocate_zeroed_as::<crate::ptr::kind::Untyped>(12).unwrap();
        let bytes = heap.view::<u8>(ptr.offset(), 12).unwrap().to_vec();
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn view_mut_set_and_get() {
        let heap = HeapAccessor::new(BumpHeap::new(64));
        {
            let mut view = heap.view_mut::<u32>(16, 3).unwrap();
            view.copy_from(&[7, 8, 9]);
            view.set(1, 80);
            assert_eq!(view.get(1), Some(80));
            assert_eq!(view.get(3), None);
        }
        assert_eq!(heap.view::<u32>(16, 3).unwrap().to_vec(), vec![7, 80, 9]);
    }

    #[test]
    fn free_of_null_is_ignored() {
        let shared = Rc::new(RefCell::new(BumpHeap::new(16)));
        let heap = HeapAccessor::from_rc(shared.clone());
        heap.free(RawPtr::NULL).unwrap();
        heap.free(RawPtr::from_offset(8)).unwrap();
        assert_eq!(shared.borrow().freed, vec![8]);
    }

    #[test]
    fn view_to_end_spans_rest_of_memory() {
        let heap = HeapAccessor::new(BumpHeap::new(16));
        assert_eq!(heap.view_to_end(12).unwrap().len(), 4);
        assert_eq!(heap.view_to_end(16).unwrap().len(), 0);
        assert!(heap.view_to_end(17).is_err());
    }
}
