//! Linear memory configuration.

use tether_core::ConfigError;

/// Size of one linear memory page in bytes.
pub const PAGE_SIZE: u32 = 65_536;

/// Alignment of every allocation, in bytes.
pub const ALIGN: u32 = 8;

/// What [`LinearMemory::teardown`](crate::LinearMemory::teardown) does with
/// allocations that were never freed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeakStrategy {
    /// Reclaim silently.
    Ignore,
    /// Log a warning, then reclaim.
    Warn,
    /// Panic with a leak summary.
    Panic,
}

/// Configuration for [`LinearMemory`](crate::LinearMemory).
///
/// Validated at construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeapConfig {
    /// Pages mapped at creation.
    pub initial_pages: u32,
    /// Growth limit in pages. `malloc` returns null past it.
    pub max_pages: u32,
    /// First allocatable byte. Everything below models the module's static
    /// data and stack, and keeps offset 0 out of reach.
    pub heap_base: u32,
    /// Handling of outstanding allocations at teardown.
    pub leak_strategy: LeakStrategy,
}

impl HeapConfig {
    /// Default initial size: 2 pages (128KB).
    pub const DEFAULT_INITIAL_PAGES: u32 = 2;

    /// Default growth limit: 16384 pages (1GB).
    pub const DEFAULT_MAX_PAGES: u32 = 16_384;

    /// Default heap base.
    pub const DEFAULT_HEAP_BASE: u32 = 1024;

    /// Hard limit imposed by 32-bit offsets.
    pub const MAX_ADDRESSABLE_PAGES: u32 = 65_536;

    /// Start building a config from defaults.
    pub fn builder() -> HeapConfigBuilder {
        HeapConfigBuilder::new()
    }

    /// Size of the initial mapping in bytes.
    pub fn initial_bytes(&self) -> usize {
        self.initial_pages as usize * PAGE_SIZE as usize
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_pages == 0 {
            return Err(ConfigError::Invalid("initial_pages must be at least 1"));
        }
        if self.max_pages < self.initial_pages {
            return Err(ConfigError::Invalid(
                "max_pages must not be below initial_pages",
            ));
        }
        if self.max_pages >= Self::MAX_ADDRESSABLE_PAGES {
            return Err(ConfigError::Invalid(
                "max_pages must leave the top of the 32-bit space unmapped",
            ));
        }
        if self.heap_base == 0 || self.heap_base % ALIGN != 0 {
            return Err(ConfigError::Invalid(
                "heap_base must be a non-zero multiple of 8",
            ));
        }
        if self.heap_base as usize >= self.initial_bytes() {
            return Err(ConfigError::Invalid(
                "heap_base must lie inside the initial pages",
            ));
        }
        Ok(())
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            initial_pages: Self::DEFAULT_INITIAL_PAGES,
            max_pages: Self::DEFAULT_MAX_PAGES,
            heap_base: Self::DEFAULT_HEAP_BASE,
            leak_strategy: LeakStrategy::Warn,
        }
    }
}

/// Builder for [`HeapConfig`].
#[derive(Clone, Debug)]
pub struct HeapConfigBuilder {
    inner: HeapConfig,
}

impl HeapConfigBuilder {
    /// Start from defaults.
    pub fn new() -> Self {
        Self {
            inner: HeapConfig::default(),
        }
    }

    /// Pages mapped at creation.
    pub fn initial_pages(mut self, pages: u32) -> Self {
        self.inner.initial_pages = pages;
        self
    }

    /// Growth limit in pages.
    pub fn max_pages(mut self, pages: u32) -> Self {
        self.inner.max_pages = pages;
        self
    }

    /// First allocatable byte.
    pub fn heap_base(mut self, base: u32) -> Self {
        self.inner.heap_base = base;
        self
    }

    /// Teardown leak handling.
    pub fn leak_strategy(mut self, strategy: LeakStrategy) -> Self {
        self.inner.leak_strategy = strategy;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<HeapConfig, ConfigError> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}

impl Default for HeapConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(HeapConfig::default().validate().is_ok());
        assert_eq!(HeapConfig::default().initial_bytes(), 128 * 1024);
    }

    #[test]
    fn builder_rejects_bad_limits() {
        assert!(matches!(
            HeapConfig::builder().initial_pages(0).build(),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            HeapConfig::builder().initial_pages(4).max_pages(2).build(),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            HeapConfig::builder().max_pages(65_536).build(),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            HeapConfig::builder().heap_base(12).build(),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            HeapConfig::builder().initial_pages(1).heap_base(PAGE_SIZE).build(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn builder_sets_fields() {
        let config = HeapConfig::builder()
            .initial_pages(1)
            .max_pages(3)
            .heap_base(64)
            .leak_strategy(LeakStrategy::Panic)
            .build()
            .unwrap();
        assert_eq!(config.initial_pages, 1);
        assert_eq!(config.max_pages, 3);
        assert_eq!(config.heap_base, 64);
        assert_eq!(config.leak_strategy, LeakStrategy::Panic);
    }
}
