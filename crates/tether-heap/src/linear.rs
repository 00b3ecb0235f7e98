//! Growable linear memory with a module-style allocator.
//!
//! [`LinearMemory`] behaves like the memory of a compiled module: a single
//! byte buffer mapped in 64KB pages, grown on demand when `malloc` runs out
//! of free blocks, and addressed by `u32` offsets. Growing reallocates the
//! buffer, which is exactly the hazard [`HeapAccessor`](tether_core::HeapAccessor)
//! views are designed around.

use std::fmt;

use indexmap::IndexMap;
use tether_core::{ConfigError, ModuleHeap};

use crate::config::{HeapConfig, LeakStrategy, ALIGN, PAGE_SIZE};
use crate::free_list::FreeList;

/// An allocation that was still live at teardown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Leak {
    /// Offset returned by `malloc`.
    pub offset: u32,
    /// Size requested by the caller.
    pub requested: u32,
}

/// Point-in-time allocator statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Allocations currently live.
    pub live_allocations: usize,
    /// Bytes requested by live allocations.
    pub live_bytes: u64,
    /// Bytes in free blocks.
    pub free_bytes: u64,
    /// Pages currently mapped.
    pub pages: u32,
    /// Number of times memory grew.
    pub grow_count: u32,
    /// Successful `malloc` calls since creation.
    pub total_allocations: u64,
    /// `free` calls since creation.
    pub total_frees: u64,
}

#[derive(Clone, Copy, Debug)]
struct Block {
    requested: u32,
    size: u32,
}

/// Page-mapped linear memory with a first-fit allocator.
///
/// Offsets below `heap_base` are never handed out, so 0 is always free to
/// mean null. Allocations are 8-byte aligned; `malloc(0)` returns a unique
/// minimal block. Freed memory is not zeroed.
pub struct LinearMemory {
    config: HeapConfig,
    memory: Vec<u8>,
    free: FreeList,
    /// Live allocations in allocation order.
    live: IndexMap<u32, Block>,
    grow_count: u32,
    total_allocations: u64,
    total_frees: u64,
}

impl LinearMemory {
    /// Map `config.initial_pages` pages.
    pub fn new(config: HeapConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: HeapConfig) -> Self {
        let memory = vec![0; config.initial_bytes()];
        let mut free = FreeList::new();
        free.release(config.heap_base, memory.len() as u32 - config.heap_base);
        Self {
            config,
            memory,
            free,
            live: IndexMap::new(),
            grow_count: 0,
            total_allocations: 0,
            total_frees: 0,
        }
    }

    /// The config this memory was created with.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Pages currently mapped.
    pub fn pages(&self) -> u32 {
        (self.memory.len() / PAGE_SIZE as usize) as u32
    }

    /// Number of times memory grew.
    pub fn grow_count(&self) -> u32 {
        self.grow_count
    }

    /// Whether `offset` is a live allocation.
    pub fn is_live(&self, offset: u32) -> bool {
        self.live.contains_key(&offset)
    }

    /// Requested size of a live allocation.
    pub fn allocation_size(&self, offset: u32) -> Option<u32> {
        self.live.get(&offset).map(|block| block.requested)
    }

    /// Live allocations as `(offset, requested)`, oldest first.
    pub fn live_allocations(&self) -> Vec<(u32, u32)> {
        self.live
            .iter()
            .map(|(&offset, block)| (offset, block.requested))
            .collect()
    }

    /// Allocator statistics.
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            live_allocations: self.live.len(),
            live_bytes: self.live.values().map(|b| u64::from(b.requested)).sum(),
            free_bytes: self.free.free_bytes(),
            pages: self.pages(),
            grow_count: self.grow_count,
            total_allocations: self.total_allocations,
            total_frees: self.total_frees,
        }
    }

    /// Report and reclaim every allocation that is still live.
    ///
    /// Reporting follows the configured [`LeakStrategy`]. With
    /// [`LeakStrategy::Panic`] nothing is reclaimed.
    pub fn teardown(&mut self) -> Vec<Leak> {
        let leaks: Vec<Leak> = self
            .live
            .iter()
            .map(|(&offset, block)| Leak {
                offset,
                requested: block.requested,
            })
            .collect();
        if leaks.is_empty() {
            return leaks;
        }
        let summary = format!(
            "{} leaked allocation(s), {} bytes; oldest={:?}",
            leaks.len(),
            leaks.iter().map(|l| u64::from(l.requested)).sum::<u64>(),
            leaks.first()
        );
        match self.config.leak_strategy {
            LeakStrategy::Ignore => {}
            LeakStrategy::Warn => tracing::warn!(target: "tether", "{}", summary),
            LeakStrategy::Panic => panic!("{}", summary),
        }
        for (offset, block) in self.live.drain(..) {
            self.free.release(offset, block.size);
        }
        leaks
    }

    fn grow_for(&mut self, size: u32) -> bool {
        let end = self.memory.len() as u32;
        let missing = u64::from(size - self.free.trailing(end).min(size));
        let pages = missing.div_ceil(u64::from(PAGE_SIZE)) as u32;
        let new_pages = self.pages() + pages.max(1);
        if new_pages > self.config.max_pages {
            tracing::trace!(target: "tether", requested = size, pages = new_pages, "memory growth refused");
            return false;
        }
        let new_len = new_pages as usize * PAGE_SIZE as usize;
        self.memory.resize(new_len, 0);
        self.free.release(end, new_len as u32 - end);
        self.grow_count += 1;
        tracing::trace!(target: "tether", pages = new_pages, "memory grown");
        true
    }
}

impl Default for LinearMemory {
    fn default() -> Self {
        Self::from_valid(HeapConfig::default())
    }
}

impl fmt::Debug for LinearMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearMemory")
            .field("pages", &self.pages())
            .field("live", &self.live.len())
            .field("free_blocks", &self.free.block_count())
            .field("grow_count", &self.grow_count)
            .finish()
    }
}

fn block_size(requested: u32) -> Option<u32> {
    requested.max(1).checked_next_multiple_of(ALIGN)
}

impl ModuleHeap for LinearMemory {
    fn malloc(&mut self, size: u32) -> u32 {
        let Some(block) = block_size(size) else {
            return 0;
        };
        let offset = match self.free.take(block) {
            Some(offset) => offset,
            None => {
                if !self.grow_for(block) {
                    return 0;
                }
                match self.free.take(block) {
                    Some(offset) => offset,
                    None => return 0,
                }
            }
        };
        self.live.insert(
            offset,
            Block {
                requested: size,
                size: block,
            },
        );
        self.total_allocations += 1;
        offset
    }

    /// # Panics
    ///
    /// Panics on an offset that is not live: a double or wild free is a
    /// fatal heap fault.
    fn free(&mut self, offset: u32) {
        let Some(block) = self.live.shift_remove(&offset) else {
            panic!("invalid free of offset {offset:#x}: not a live allocation");
        };
        self.free.release(offset, block.size);
        self.total_frees += 1;
    }

    fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }
}
