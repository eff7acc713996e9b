//! Engine configuration.
//!
//! The embedder decides once, at the system boundary, whether renders are
//! buffered, whether total byte length is counted for deferred commit, and
//! how large the growable buffer may get before chunks start streaming to
//! the sink.

use serde::{Deserialize, Serialize};

/// Default growable-buffer threshold in bytes.
pub const DEFAULT_BUFFER_THRESHOLD: usize = 8192;

/// Process-level toggles consumed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Enables the growable-buffer path in the commit writer.
    pub buffering_enabled: bool,
    /// Enables the byte-length tee and deferred length commit.
    pub length_counting_enabled: bool,
    /// Propagates buffered content eagerly rather than only at flush/close.
    pub auto_flush_enabled: bool,
    /// Sizes the growable buffer; the chunk flush unit is half of this.
    pub buffer_threshold_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffering_enabled: true,
            length_counting_enabled: false,
            auto_flush_enabled: false,
            buffer_threshold_bytes: DEFAULT_BUFFER_THRESHOLD,
        }
    }
}

impl EngineConfig {
    /// The chunk flush unit: half the buffer threshold, never zero.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        (self.buffer_threshold_bytes / 2).max(1)
    }

    /// The byte-counter bound: twice the buffer threshold.
    #[must_use]
    pub fn counter_bound(&self) -> usize {
        self.buffer_threshold_bytes.saturating_mul(2)
    }
}
