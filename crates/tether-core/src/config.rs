//! Memory subsystem configuration.
//!
//! Configuration is explicit: callers build a [`MemoryConfig`] (or read one
//! from the environment once, at startup) and hand it to
//! [`Diagnostics::configure`](crate::diagnostics::Diagnostics::configure).
//! Nothing in the workspace reads ambient global state.

use crate::error::ConfigError;

/// Environment variable that enables debug logging in [`MemoryConfig::from_env`].
pub const DEBUG_ENV_VAR: &str = "TETHER_DEBUG";

/// Settings shared by the codecs and the marshalling facade.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Emit a `debug` event for every allocation and release.
    pub debug: bool,
    /// Upper bound on bytes scanned when looking for a NUL terminator.
    ///
    /// Bounds decoding of buffers whose terminator is missing, so a corrupt
    /// buffer cannot make the host walk the whole of linear memory.
    pub max_scan_bytes: u32,
}

impl MemoryConfig {
    /// Default terminator scan bound: 16MB.
    pub const DEFAULT_MAX_SCAN_BYTES: u32 = 16 * 1024 * 1024;

    /// Start building a config from defaults.
    pub fn builder() -> MemoryConfigBuilder {
        MemoryConfigBuilder::new()
    }

    /// Defaults, with `debug` taken from `TETHER_DEBUG` (`1` or `true`).
    pub fn from_env() -> Self {
        let debug = std::env::var(DEBUG_ENV_VAR)
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        Self {
            debug,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_scan_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_scan_bytes must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            debug: false,
            max_scan_bytes: Self::DEFAULT_MAX_SCAN_BYTES,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "1") || value.trim().eq_ignore_ascii_case("true")
}

/// Builder for [`MemoryConfig`].
#[derive(Clone, Debug)]
pub struct MemoryConfigBuilder {
    inner: MemoryConfig,
}

impl MemoryConfigBuilder {
    /// Start from defaults.
    pub fn new() -> Self {
        Self {
            inner: MemoryConfig::default(),
        }
    }

    /// Enable or disable allocation debug events.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.inner.debug = enabled;
        self
    }

    /// Bound terminator scans.
    pub fn max_scan_bytes(mut self, bytes: u32) -> Self {
        self.inner.max_scan_bytes = bytes;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<MemoryConfig, ConfigError> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}

impl Default for MemoryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
