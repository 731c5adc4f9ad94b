//! # Transcript: rotating append-only JSON-line log.
//!
//! Owned exclusively by the sink loop, so no locking is needed.
//!
//! ## `add` algorithm
//! ```text
//! add(payload):
//!   ├─► line += 1
//!   ├─► line % flush_every == 0 ? flush
//!   ├─► policy.should_rotate(line, window_start, now) ?
//!   │       └─► flush + close file, line = 0, window_start = policy.window_start(now),
//!   │           open "{name}_{iso(window_start)}.log"
//!   └─► write "{iso(now)}::::{json(payload)}\n" to the current file
//! ```
//!
//! ## Rules
//! - The counter is reset *before* the write, and the write lands in the new
//!   file: under `ByLineCount(n)` the first file holds `n - 1` entries and
//!   every later file holds `n`, the boundary entry being the new file's first line.
//! - Writes are buffered; data reaches the file on the flush cadence, on
//!   rotation and on [`Transcript::close`].
//! - Files are opened with truncation (a name collision overwrites).

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde_json::Value;

use super::TranscriptConfig;
use super::clock::{SharedClock, isoformat};
use super::rotation::RotationPolicy;
use crate::error::SinkError;

/// Rotating JSON-line transcript.
pub struct Transcript {
    dir: PathBuf,
    name: String,
    policy: RotationPolicy,
    flush_every: u64,
    clock: SharedClock,

    path: PathBuf,
    file: BufWriter<File>,
    line: u64,
    window_start: NaiveDateTime,
}

impl Transcript {
    /// Creates the directory if needed and opens the first file.
    pub fn open(cfg: &TranscriptConfig, clock: SharedClock) -> Result<Self, SinkError> {
        cfg.policy.validate()?;

        let dir = std::path::absolute(&cfg.dir)
            .map_err(|e| SinkError::io(format!("resolving {}", cfg.dir.display()), e))?;
        if !dir.exists() {
            tracing::info!(dir = %dir.display(), "transcripts directory does not exist, creating it");
            fs::create_dir_all(&dir)
                .map_err(|e| SinkError::io(format!("creating {}", dir.display()), e))?;
        }

        let window_start = cfg.policy.window_start(clock.now());
        let (path, file) = create_file(&dir, &cfg.name, &window_start)?;

        Ok(Self {
            dir,
            name: cfg.name.clone(),
            policy: cfg.policy,
            flush_every: cfg.flush_every,
            clock,
            path,
            file,
            line: 0,
            window_start,
        })
    }

    /// Appends one entry, rotating first when the policy says so.
    pub fn add(&mut self, payload: &Value) -> Result<(), SinkError> {
        self.line += 1;
        if self.flush_every > 0 && self.line % self.flush_every == 0 {
            self.flush()?;
        }

        let now = self.clock.now();
        if self.policy.should_rotate(self.line, self.window_start, now) {
            self.rotate(now)?;
        }

        let text = serde_json::to_string(payload).map_err(SinkError::Malformed)?;
        let stamp = isoformat(&self.clock.now());
        writeln!(self.file, "{stamp}::::{text}")
            .map_err(|e| SinkError::io(format!("writing {}", self.path.display()), e))
    }

    /// Path of the file currently being written.
    pub fn current_path(&self) -> &Path {
        &self.path
    }

    /// Entries written since the last rotation.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Flushes buffered entries and closes the file.
    pub fn close(mut self) -> Result<(), SinkError> {
        self.flush()?;
        tracing::debug!(path = %self.path.display(), "transcript closed");
        Ok(())
    }

    fn rotate(&mut self, now: NaiveDateTime) -> Result<(), SinkError> {
        self.flush()?;
        self.line = 0;
        self.window_start = self.policy.window_start(now);

        let (path, file) = create_file(&self.dir, &self.name, &self.window_start)?;
        tracing::debug!(from = %self.path.display(), to = %path.display(), "transcript rotated");
        self.path = path;
        // Dropping the previous writer closes it; it was flushed above.
        self.file = file;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.file
            .flush()
            .map_err(|e| SinkError::io(format!("flushing {}", self.path.display()), e))
    }
}

fn create_file(
    dir: &Path,
    name: &str,
    window_start: &NaiveDateTime,
) -> Result<(PathBuf, BufWriter<File>), SinkError> {
    let path = dir.join(format!("{name}_{}.log", isoformat(window_start)));
    let file =
        File::create(&path).map_err(|e| SinkError::io(format!("opening {}", path.display()), e))?;
    Ok((path, BufWriter::new(file)))
}
