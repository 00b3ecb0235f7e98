//! Property tests for the linear memory allocator.

use proptest::prelude::*;
use tether_core::ModuleHeap;
use tether_heap::{HeapConfig, LeakStrategy, LinearMemory};

#[derive(Clone, Debug)]
enum Op {
    Alloc(u32),
    Free(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u32..4096).prop_map(Op::Alloc),
        2 => any::<usize>().prop_map(Op::Free),
    ]
}

fn memory() -> LinearMemory {
    LinearMemory::new(
        HeapConfig::builder()
            .initial_pages(1)
            .max_pages(8)
            .leak_strategy(LeakStrategy::Ignore)
            .build()
            .unwrap(),
    )
    .unwrap()
}

proptest! {
    #[test]
    fn live_blocks_never_overlap(ops in proptest::collection::vec(arb_op(), 1..200)) {
        let mut mem = memory();
        let mut live: Vec<(u32, u32)> = Vec::new();
        for op in ops {
            match op {
                Op::Alloc(size) => {
                    let offset = mem.malloc(size);
                    if offset != 0 {
                        prop_assert_eq!(offset % 8, 0);
                        prop_assert!(offset >= mem.config().heap_base);
                        live.push((offset, size.max(1)));
                    }
                }
                Op::Free(pick) if !live.is_empty() => {
                    let (offset, _) = live.swap_remove(pick % live.len());
                    mem.free(offset);
                }
                Op::Free(_) => {}
            }
        }
        live.sort_unstable();
        for pair in live.windows(2) {
            let (a, a_len) = pair[0];
            let (b, _) = pair[1];
            prop_assert!(a + a_len <= b, "blocks {:#x}+{} and {:#x} overlap", a, a_len, b);
        }
        prop_assert_eq!(mem.stats().live_allocations, live.len());
    }

    #[test]
    fn writes_survive_growth(sizes in proptest::collection::vec(1u32..20_000, 1..40)) {
        let mut mem = memory();
        let mut written = Vec::new();
        for (i, size) in sizes.into_iter().enumerate() {
            let offset = mem.malloc(size);
            if offset == 0 {
                break;
            }
            let tag = (i % 251) as u8;
            mem.memory_mut()[offset as usize] = tag;
            written.push((offset, tag));
        }
        for (offset, tag) in written {
            prop_assert_eq!(mem.memory()[offset as usize], tag);
        }
    }

    #[test]
    fn freeing_everything_restores_free_space(sizes in proptest::collection::vec(0u32..2048, 1..64)) {
        let mut mem = memory();
        let before = mem.stats().free_bytes;
        let offsets: Vec<u32> = sizes.iter().map(|&s| mem.malloc(s)).filter(|&o| o != 0).collect();
        for offset in offsets.into_iter().rev() {
            mem.free(offset);
        }
        let stats = mem.stats();
        let grown = u64::from(stats.pages - 1) * u64::from(tether_heap::PAGE_SIZE);
        prop_assert_eq!(stats.free_bytes, before + grown);
        prop_assert_eq!(stats.live_allocations, 0);
    }
}
