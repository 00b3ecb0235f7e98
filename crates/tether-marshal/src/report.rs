//! Decoded text together with the problems met while decoding it.

use smallvec::SmallVec;
use tether_core::{DecodeIssue, Diagnostics};

/// Result of a best-effort decode.
///
/// Every issue corresponds to one U+FFFD in `text`. Clean strings carry no
/// issues and never spill the inline buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodeReport {
    /// The decoded string.
    pub text: String,
    /// Malformed sequences, in buffer order.
    pub issues: SmallVec<[DecodeIssue; 4]>,
}

impl DecodeReport {
    /// Whether the buffer decoded without substitutions.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Forward every issue to `diagnostics` and keep the text.
    pub fn into_text(self, diagnostics: &Diagnostics) -> String {
        for issue in &self.issues {
            diagnostics.degraded(issue);
        }
        self.text
    }
}
