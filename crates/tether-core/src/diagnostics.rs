//! Degraded-decode reporting and debug events.
//!
//! Decoding a string the module produced never fails on malformed bytes.
//! Each problem becomes a [`DecodeIssue`], is substituted with U+FFFD and is
//! forwarded to a [`DiagnosticSink`]. [`Diagnostics`] is the injected
//! capability carrying the sink and the [`MemoryConfig`] it was configured
//! with.

use std::fmt;
use std::rc::Rc;

use crate::config::MemoryConfig;
use crate::ptr::{HeapPtr, PtrKind};

/// A malformed sequence met while decoding a foreign string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeIssue {
    /// A byte that cannot start a UTF-8 sequence.
    InvalidLeadByte {
        /// Absolute heap offset of the byte.
        offset: u32,
        /// The offending byte.
        byte: u8,
    },
    /// A 4-byte sequence decoding above U+10FFFF.
    CodePointOutOfRange {
        /// Absolute heap offset of the lead byte.
        offset: u32,
        /// The decoded value.
        code_point: u32,
    },
    /// A 3-byte sequence decoding to a UTF-16 surrogate.
    SurrogateCodePoint {
        /// Absolute heap offset of the lead byte.
        offset: u32,
        /// The decoded value.
        code_point: u32,
    },
    /// A sequence cut off by the end of linear memory or the scan bound.
    Truncated {
        /// Absolute heap offset of the lead byte.
        offset: u32,
    },
    /// A UTF-16 surrogate without its partner.
    UnpairedSurrogate {
        /// Code unit index within the buffer.
        index: u32,
        /// The offending code unit.
        unit: u16,
    },
}

impl fmt::Display for DecodeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLeadByte { offset, byte } => {
                write!(f, "invalid UTF-8 leading byte {byte:#04x} at {offset:#x}")
            }
            Self::CodePointOutOfRange { offset, code_point } => {
                write!(
                    f,
                    "code point {code_point:#x} at {offset:#x} is above U+10FFFF"
                )
            }
            Self::SurrogateCodePoint { offset, code_point } => {
                write!(f, "surrogate code point {code_point:#x} at {offset:#x}")
            }
            Self::Truncated { offset } => {
                write!(f, "UTF-8 sequence at {offset:#x} is truncated")
            }
            Self::UnpairedSurrogate { index, unit } => {
                write!(f, "unpaired surrogate {unit:#06x} at code unit {index}")
            }
        }
    }
}

/// Receiver for degraded-decode reports.
pub trait DiagnosticSink {
    /// Called once per malformed sequence.
    fn degraded(&self, issue: &DecodeIssue);
}

/// Sink that logs every issue as a `tracing` warning.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn degraded(&self, issue: &DecodeIssue) {
        tracing::warn!(target: "tether", %issue, "degraded string decode");
    }
}

/// Configured diagnostics capability, cloned into each component that
/// reports.
#[derive(Clone)]
pub struct Diagnostics {
    config: MemoryConfig,
    sink: Rc<dyn DiagnosticSink>,
}

impl Diagnostics {
    /// Build diagnostics from an explicit config, reporting through `tracing`.
    pub fn configure(config: MemoryConfig) -> Self {
        Self {
            config,
            sink: Rc::new(TracingSink),
        }
    }

    /// Replace the sink.
    pub fn with_sink(mut self, sink: Rc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The config these diagnostics were built from.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Whether allocation debug events are emitted.
    pub fn debug_enabled(&self) -> bool {
        self.config.debug
    }

    /// Report a malformed sequence.
    pub fn degraded(&self, issue: &DecodeIssue) {
        self.sink.degraded(issue);
    }

    /// Record an allocation-level event when debug logging is enabled.
    pub fn heap_event<K: PtrKind>(&self, event: &'static str, ptr: HeapPtr<K>, bytes: u32) {
        if self.config.debug {
            tracing::debug!(target: "tether", event, ptr = %ptr, kind = K::NAME, bytes);
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::configure(MemoryConfig::default())
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
