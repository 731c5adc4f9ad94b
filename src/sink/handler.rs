//! # Level-filtered line writers.
//!
//! A [`LogHandler`] owns one output (console stream or log file), a threshold
//! and a line template. The sink loop has one console handler and at most one
//! file handler; it is their only user, so they need no locking.
//!
//! Output is flushed every `flush_every` written lines (1 by default). With
//! `flush_every = 0` lines stay buffered until [`LogHandler::close`].
//!
//! ## Example output
//! ```text
//! console: WARNING::net: link down
//! file:    2024-06-01 08:30:15--WARNING::net: link down
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};

use chrono::NaiveDateTime;

use crate::core::config::FileLogConfig;
use crate::parcel::Level;

/// One level-filtered output.
pub struct LogHandler {
    threshold: Level,
    template: String,
    date_format: String,
    out: Box<dyn Write + Send>,
    flush_every: u32,
    unflushed: u32,
}

impl LogHandler {
    /// Wraps an arbitrary writer (the console stream in production).
    pub fn new(
        out: Box<dyn Write + Send>,
        threshold: Level,
        template: impl Into<String>,
        date_format: impl Into<String>,
    ) -> Self {
        Self {
            threshold,
            template: template.into(),
            date_format: date_format.into(),
            out,
            flush_every: 1,
            unflushed: 0,
        }
    }

    /// Flushes after every `lines` written lines; 0 defers flushing to `close`.
    pub fn with_flush_every(mut self, lines: u32) -> Self {
        self.flush_every = lines;
        self
    }

    /// Opens the configured log file in append mode.
    ///
    /// Returns the handler and, when the parent directory had to be created,
    /// that directory so the caller can report it.
    pub fn open_file(
        cfg: &FileLogConfig,
        date_format: &str,
    ) -> io::Result<(Self, Option<std::path::PathBuf>)> {
        let mut created = None;
        if let Some(parent) = cfg.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
                created = Some(parent.to_path_buf());
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cfg.path)?;
        let handler = Self::new(
            Box::new(BufWriter::new(file)),
            cfg.level,
            cfg.format.clone(),
            date_format,
        );
        Ok((handler, created))
    }

    /// Current threshold.
    pub fn threshold(&self) -> Level {
        self.threshold
    }

    /// Replaces the threshold.
    pub fn set_level(&mut self, level: Level) {
        self.threshold = level;
    }

    /// Writes one line if `level` passes the threshold. Returns whether it was written.
    pub fn emit(&mut self, level: Level, message: &str, at: &NaiveDateTime) -> io::Result<bool> {
        if level < self.threshold {
            return Ok(false);
        }
        let line = self.render(level, message, at);
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.unflushed += 1;
        if self.flush_every > 0 && self.unflushed >= self.flush_every {
            self.out.flush()?;
            self.unflushed = 0;
        }
        Ok(true)
    }

    /// Flushes and releases the output.
    pub fn close(mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn render(&self, level: Level, message: &str, at: &NaiveDateTime) -> String {
        // `{message}` goes last so placeholders inside user text stay literal.
        let mut line = self.template.clone();
        if line.contains("{timestamp}") {
            line = line.replace("{timestamp}", &at.format(&self.date_format).to_string());
        }
        line.replace("{level}", &level.name())
            .replace("{message}", message)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::config::{DEFAULT_CONSOLE_FORMAT, DEFAULT_DATE_FORMAT, DEFAULT_FILE_FORMAT};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory writer whose contents stay readable after the handler is gone.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuf {
        data: Arc<Mutex<Vec<u8>>>,
        flushes: Arc<AtomicUsize>,
    }

    impl SharedBuf {
        pub(crate) fn text(&self) -> String {
            String::from_utf8(self.data.lock().unwrap().clone()).unwrap()
        }

        pub(crate) fn flushes(&self) -> usize {
            self.flushes.load(Ordering::SeqCst)
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.data.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 5)
            .unwrap()
    }

    #[test]
    fn test_console_format() {
        let buf = SharedBuf::default();
        let mut h = LogHandler::new(
            Box::new(buf.clone()),
            Level::INFO,
            DEFAULT_CONSOLE_FORMAT,
            DEFAULT_DATE_FORMAT,
        );
        h.emit(Level::ERROR, "disk full", &noon()).unwrap();
        assert_eq!(buf.text(), "ERROR::disk full\n");
    }

    #[test]
    fn test_file_format() {
        let buf = SharedBuf::default();
        let mut h = LogHandler::new(
            Box::new(buf.clone()),
            Level::INFO,
            DEFAULT_FILE_FORMAT,
            DEFAULT_DATE_FORMAT,
        );
        h.emit(Level::INFO, "up", &noon()).unwrap();
        assert_eq!(buf.text(), "2024-06-01 12:00:05--INFO::up\n");
    }

    #[test]
    fn test_threshold_filters_and_can_change() {
        let buf = SharedBuf::default();
        let mut h = LogHandler::new(Box::new(buf.clone()), Level::INFO, "{message}", "%H");
        assert!(!h.emit(Level::DEBUG, "a", &noon()).unwrap());
        assert!(h.emit(Level::INFO, "b", &noon()).unwrap());
        h.set_level(Level::ERROR);
        assert_eq!(h.threshold(), Level::ERROR);
        assert!(!h.emit(Level::WARNING, "c", &noon()).unwrap());
        assert!(h.emit(Level::CRITICAL, "d", &noon()).unwrap());
        assert_eq!(buf.text(), "b\nd\n");
    }

    #[test]
    fn test_flush_cadence() {
        let buf = SharedBuf::default();
        let mut h = LogHandler::new(Box::new(buf.clone()), Level::INFO, "{message}", "%H")
            .with_flush_every(3);
        for msg in ["a", "b", "c", "d"] {
            h.emit(Level::INFO, msg, &noon()).unwrap();
        }
        // Filtered lines do not count towards the cadence.
        h.emit(Level::DEBUG, "skipped", &noon()).unwrap();
        assert_eq!(buf.flushes(), 1);
        h.close().unwrap();
        assert_eq!(buf.flushes(), 2);
        assert_eq!(buf.text(), "a\nb\nc\nd\n");
    }

    #[test]
    fn test_zero_cadence_flushes_only_on_close() {
        let buf = SharedBuf::default();
        let mut h = LogHandler::new(Box::new(buf.clone()), Level::INFO, "{message}", "%H")
            .with_flush_every(0);
        for _ in 0..10 {
            h.emit(Level::INFO, "x", &noon()).unwrap();
        }
        assert_eq!(buf.flushes(), 0);
        h.close().unwrap();
        assert_eq!(buf.flushes(), 1);
    }

    #[test]
    fn test_placeholders_in_message_are_literal() {
        let buf = SharedBuf::default();
        let mut h = LogHandler::new(Box::new(buf.clone()), Level::INFO, "{level}::{message}", "%H");
        h.emit(Level::INFO, "{level} {timestamp}", &noon()).unwrap();
        assert_eq!(buf.text(), "INFO::{level} {timestamp}\n");
    }

    #[test]
    fn test_open_file_creates_parent_and_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = FileLogConfig::new(tmp.path().join("logs/app.log"), Level::DEBUG);

        let (mut h, created) = LogHandler::open_file(&cfg, DEFAULT_DATE_FORMAT).unwrap();
        assert_eq!(created.as_deref(), Some(tmp.path().join("logs").as_path()));
        h.emit(Level::INFO, "first", &noon()).unwrap();
        h.close().unwrap();

        let (mut h, created) = LogHandler::open_file(&cfg, DEFAULT_DATE_FORMAT).unwrap();
        assert!(created.is_none());
        h.emit(Level::INFO, "second", &noon()).unwrap();
        h.close().unwrap();

        let text = fs::read_to_string(&cfg.path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with("--INFO::second\n"));
    }
}
