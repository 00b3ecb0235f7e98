//! Benchmark profiles for Tether marshalling.
//!
//! - [`bench_memory`]: a [`ModuleMemory`] over a roomy [`LinearMemory`]
//! - [`sample_text`]: deterministic mixed-script strings of a given length

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use tether_core::{Diagnostics, HeapAccessor};
use tether_heap::{HeapConfig, LeakStrategy, LinearMemory};
use tether_marshal::ModuleMemory;

/// Pages mapped up front so benchmarks never measure growth.
pub const BENCH_PAGES: u32 = 64;

/// A memory with [`BENCH_PAGES`] pages mapped and leak reports off.
pub fn bench_memory() -> ModuleMemory {
    let config = HeapConfig::builder()
        .initial_pages(BENCH_PAGES)
        .leak_strategy(LeakStrategy::Ignore)
        .build()
        .unwrap();
    ModuleMemory::new(
        HeapAccessor::new(LinearMemory::new(config).unwrap()),
        Diagnostics::default(),
    )
}

/// `chars` characters cycling through ASCII, Latin-1, BMP and astral text.
pub fn sample_text(chars: usize) -> String {
    const ALPHABET: [char; 8] = ['a', 'Z', '7', ' ', 'é', 'ß', '€', '😀'];
    (0..chars).map(|i| ALPHABET[i % ALPHABET.len()]).collect()
}
