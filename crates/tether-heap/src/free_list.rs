//! Address-ordered free block list with coalescing.

use std::collections::BTreeMap;

/// Free blocks keyed by start offset. Adjacent blocks are always merged, so
/// no two entries touch.
#[derive(Debug, Default)]
pub(crate) struct FreeList {
    blocks: BTreeMap<u32, u32>,
}

impl FreeList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// First-fit: carve `size` bytes from the lowest block that holds them.
    pub(crate) fn take(&mut self, size: u32) -> Option<u32> {
        let (&offset, &len) = self.blocks.iter().find(|&(_, &len)| len >= size)?;
        self.blocks.remove(&offset);
        if len > size {
            self.blocks.insert(offset + size, len - size);
        }
        Some(offset)
    }

    /// Return a block, merging it with free neighbours.
    pub(crate) fn release(&mut self, offset: u32, size: u32) {
        let mut start = offset;
        let mut len = size;
        if let Some((&prev, &prev_len)) = self.blocks.range(..offset).next_back() {
            if prev + prev_len == offset {
                self.blocks.remove(&prev);
                start = prev;
                len += prev_len;
            }
        }
        if let Some(next_len) = self.blocks.remove(&(offset + size)) {
            len += next_len;
        }
        self.blocks.insert(start, len);
    }

    /// Size of the free block ending exactly at `end`, if any.
    pub(crate) fn trailing(&self, end: u32) -> u32 {
        match self.blocks.range(..end).next_back() {
            Some((&offset, &len)) if offset + len == end => len,
            _ => 0,
        }
    }

    pub(crate) fn free_bytes(&self) -> u64 {
        self.blocks.values().map(|&len| u64::from(len)).sum()
    }

    pub(crate) fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_is_first_fit() {
        let mut list = FreeList::new();
        list.release(0, 16);
        list.release(64, 64);
        assert_eq!(list.take(32), Some(64));
        assert_eq!(list.take(8), Some(0));
        assert_eq!(list.free_bytes(), 8 + 32);
    }

    #[test]
    fn take_fails_when_nothing_fits() {
        let mut list = FreeList::new();
        list.release(0, 16);
        assert_eq!(list.take(24), None);
        assert_eq!(list.free_bytes(), 16);
    }

    #[test]
    fn release_coalesces_both_sides() {
        let mut list = FreeList::new();
        list.release(0, 8);
        list.release(16, 8);
        assert_eq!(list.block_count(), 2);
        list.release(8, 8);
        assert_eq!(list.block_count(), 1);
        assert_eq!(list.take(24), Some(0));
    }

    #[test]
    fn trailing_block() {
        let mut list = FreeList::new();
        list.release(32, 32);
        assert_eq!(list.trailing(64), 32);
        assert_eq!(list.trailing(128), 0);
    }
}
