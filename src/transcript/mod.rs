//! Rotating JSON-line transcripts.
//!
//! ## Contents
//! - [`Transcript`] the writer owned by the sink loop
//! - [`TranscriptConfig`] where and how to write
//! - [`RotationPolicy`] when to start a new file (time / day / lines)
//! - [`Clock`], [`LocalClock`] time source (replaceable in tests)
//!
//! ## Defaults
//! - directory `transcripts/`, prefix `TRANSCRIPT`;
//! - `RotationPolicy::ByCalendarDay`;
//! - flush every 100 entries.

mod clock;
mod rotation;
#[allow(clippy::module_inception)]
mod transcript;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use clock::{Clock, LocalClock, SharedClock, isoformat};
pub use rotation::RotationPolicy;
pub use transcript::Transcript;

/// Transcript settings, captured by the sink at spawn time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Directory holding transcript files (created if missing).
    pub dir: PathBuf,
    /// File name prefix: `{name}_{window start}.log`.
    pub name: String,
    /// Rotation rule.
    pub policy: RotationPolicy,
    /// Flush the write buffer every `flush_every` entries (`0` = only on rotation/close).
    pub flush_every: u64,
}

impl TranscriptConfig {
    /// Transcript in `dir` with the remaining settings at their defaults.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    /// Replaces the rotation policy.
    pub fn with_policy(mut self, policy: RotationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the file name prefix.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("transcripts/"),
            name: "TRANSCRIPT".to_string(),
            policy: RotationPolicy::default(),
            flush_every: 100,
        }
    }
}
