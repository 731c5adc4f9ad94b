//! # SinkLoop: the consumer running inside the sink process.
//!
//! Reads frames off the channel and dispatches them one at a time. It is the
//! sole owner of the console handler, the optional file handler and the
//! optional transcript, so none of them needs locking.
//!
//! ## Dispatch
//! ```text
//! frame ─► decode ─► Parcel
//!                     ├─ Shutdown        → leave loop
//!                     ├─ SetLevel(l)     → announce at level 100, set console/file thresholds
//!                     ├─ Transcript(p)   → transcript.add(p)   (none configured → fatal)
//!                     └─ Record(l, m)    → console.emit / file.emit (each filtered)
//! ```
//!
//! ## Exit paths
//! - `Shutdown`: logs `Exiting Logging Server Process`, closes everything, `Ok(())`.
//! - any error (including end of stream): logged at CRITICAL with its source
//!   chain, everything closed, the error is returned.
//!
//! Interrupts are logged at WARNING and otherwise ignored.

use std::error::Error as _;
use std::io::{self, Write};
use std::path::PathBuf;

use bytes::BytesMut;
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LengthDelimitedCodec};

use super::handler::LogHandler;
use super::interrupt::Interrupts;
use crate::core::config::{FileLogConfig, SinkConfig};
use crate::error::SinkError;
use crate::parcel::{Level, Parcel, codec};
use crate::transcript::{SharedClock, Transcript, TranscriptConfig};

const START_MESSAGE: &str = "Start Logging Server Process...";
const EXIT_MESSAGE: &str = "Exiting Logging Server Process";

/// Consumer loop over a framed byte stream (the process stdin in production).
pub struct SinkLoop<R> {
    frames: FramedRead<R, LengthDelimitedCodec>,
    console: LogHandler,
    file: Option<LogHandler>,
    transcript: Option<Transcript>,
    clock: SharedClock,
    interrupts: Option<Interrupts>,

    date_format: String,
    flush_every: u32,
    file_cfg: Option<FileLogConfig>,
    transcript_cfg: Option<TranscriptConfig>,
}

enum Next {
    Frame(Option<io::Result<BytesMut>>),
    Interrupt,
}

impl<R: AsyncRead + Unpin> SinkLoop<R> {
    /// Prepares the loop. Files are opened by [`run`](Self::run), so opening
    /// failures go through the same fatal path as any other error.
    pub fn new(
        reader: R,
        cfg: &SinkConfig,
        console: Box<dyn Write + Send>,
        clock: SharedClock,
    ) -> Self {
        let console = LogHandler::new(
            console,
            cfg.console_level,
            cfg.console_format.clone(),
            cfg.date_format.clone(),
        )
        .with_flush_every(cfg.flush_every);
        Self {
            frames: FramedRead::new(reader, codec::frame_codec(cfg.max_parcel_bytes)),
            console,
            file: None,
            transcript: None,
            clock,
            interrupts: None,
            date_format: cfg.date_format.clone(),
            flush_every: cfg.flush_every,
            file_cfg: cfg.file.clone(),
            transcript_cfg: cfg.transcript.clone(),
        }
    }

    /// Logs and ignores interrupts delivered through `interrupts`.
    pub fn with_interrupts(mut self, interrupts: Interrupts) -> Self {
        self.interrupts = Some(interrupts);
        self
    }

    /// Runs until `Shutdown` or the first fatal error.
    pub async fn run(mut self) -> Result<(), SinkError> {
        let result = match self.open_outputs() {
            Ok(()) => self.serve().await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => {
                if let Err(e) = self.log(Level::INFO, EXIT_MESSAGE) {
                    tracing::warn!(error = %e, "exit message not written");
                }
            }
            Err(e) => self.report_fatal(e),
        }

        let closed = self.close();
        result.and(closed)
    }

    fn open_outputs(&mut self) -> Result<(), SinkError> {
        if let Some(file_cfg) = self.file_cfg.take() {
            let (handler, created) = LogHandler::open_file(&file_cfg, &self.date_format)
                .map_err(|e| SinkError::io(format!("opening {}", file_cfg.path.display()), e))?;
            self.file = Some(handler.with_flush_every(self.flush_every));
            if let Some(dir) = created {
                self.log(Level::WARNING, &missing_dir_message(dir))?;
            }
        }

        self.log(Level::INFO, START_MESSAGE)?;

        if let Some(tr_cfg) = self.transcript_cfg.take() {
            self.transcript = Some(Transcript::open(&tr_cfg, self.clock.clone())?);
        }
        Ok(())
    }

    async fn serve(&mut self) -> Result<(), SinkError> {
        loop {
            let next = tokio::select! {
                frame = self.frames.next() => Next::Frame(frame),
                () = next_interrupt(self.interrupts.as_mut()) => Next::Interrupt,
            };

            let frame = match next {
                Next::Interrupt => {
                    self.log(
                        Level::WARNING,
                        "Interrupt received; the logging process waits for the shutdown message",
                    )?;
                    continue;
                }
                Next::Frame(None) => return Err(SinkError::ChannelEnded),
                Next::Frame(Some(Err(e))) => return Err(SinkError::Frame(e)),
                Next::Frame(Some(Ok(frame))) => frame,
            };

            match codec::decode(&frame).map_err(SinkError::Malformed)? {
                Parcel::Shutdown => return Ok(()),
                Parcel::SetLevel { level } => self.set_level(level)?,
                Parcel::Transcript { payload } => match self.transcript.as_mut() {
                    Some(transcript) => transcript.add(&payload)?,
                    None => return Err(SinkError::TranscriptNotConfigured),
                },
                Parcel::Record { level, message } => self.log(level, &message)?,
            }
        }
    }

    fn set_level(&mut self, level: Level) -> Result<(), SinkError> {
        self.log(
            Level::ANNOUNCE,
            &format!("Setting logger level to {}", level.0),
        )?;
        self.console.set_level(level);
        if let Some(file) = self.file.as_mut() {
            file.set_level(level);
        }
        Ok(())
    }

    fn log(&mut self, level: Level, message: &str) -> Result<(), SinkError> {
        let now = self.clock.now();
        self.console
            .emit(level, message, &now)
            .map_err(|e| SinkError::io("writing console", e))?;
        if let Some(file) = self.file.as_mut() {
            file.emit(level, message, &now)
                .map_err(|e| SinkError::io("writing log file", e))?;
        }
        Ok(())
    }

    fn report_fatal(&mut self, err: &SinkError) {
        let mut text = format!("Logging process failed: {err}");
        let mut source = err.source();
        while let Some(cause) = source {
            text.push_str(&format!("\n  caused by: {cause}"));
            source = cause.source();
        }
        tracing::debug!(kind = err.as_label(), "sink loop failed");
        // The console may be the thing that failed; the file may still work.
        let now = self.clock.now();
        if let Err(e) = self.console.emit(Level::CRITICAL, &text, &now) {
            tracing::warn!(error = %e, "fatal error not written to console");
        }
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.emit(Level::CRITICAL, &text, &now) {
                tracing::warn!(error = %e, "fatal error not written to log file");
            }
        }
    }

    /// Closes file handler, console and transcript, each exactly once.
    fn close(self) -> Result<(), SinkError> {
        let mut first_err = None;
        if let Some(file) = self.file {
            if let Err(e) = file.close() {
                first_err.get_or_insert(SinkError::io("closing log file", e));
            }
        }
        if let Err(e) = self.console.close() {
            first_err.get_or_insert(SinkError::io("closing console", e));
        }
        if let Some(transcript) = self.transcript {
            if let Err(e) = transcript.close() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

fn missing_dir_message(dir: PathBuf) -> String {
    format!(
        "Log directory {} does not exist, creating it",
        dir.display()
    )
}

async fn next_interrupt(interrupts: Option<&mut Interrupts>) {
    match interrupts {
        Some(interrupts) => {
            if interrupts.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::handler::tests::SharedBuf;
    use crate::transcript::{Clock, RotationPolicy};
    use chrono::{NaiveDate, NaiveDateTime};
    use futures::SinkExt;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::io::DuplexStream;
    use tokio_util::codec::FramedWrite;

    struct FixedClock(NaiveDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0
        }
    }

    fn clock() -> SharedClock {
        Arc::new(FixedClock(
            NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap(),
        ))
    }

    /// Writes `parcels` into a pipe, then runs a sink over it.
    async fn run_with(
        cfg: SinkConfig,
        parcels: Vec<Parcel>,
        close_after: bool,
    ) -> (Result<(), SinkError>, SharedBuf) {
        let (w, r) = tokio::io::duplex(64 * 1024);
        let console = SharedBuf::default();
        let sink = SinkLoop::new(r, &cfg, Box::new(console.clone()), clock());

        let mut writer: FramedWrite<DuplexStream, _> =
            FramedWrite::new(w, codec::frame_codec(cfg.max_parcel_bytes));
        for parcel in &parcels {
            let frame = codec::encode(parcel, cfg.max_parcel_bytes).unwrap();
            writer.send(frame).await.unwrap();
        }
        if close_after {
            drop(writer);
            let result = sink.run().await;
            return (result, console);
        }
        let result = sink.run().await;
        drop(writer);
        (result, console)
    }

    #[tokio::test]
    async fn test_records_in_order_then_shutdown() {
        let parcels = vec![
            Parcel::record(Level::INFO, "r1"),
            Parcel::record(Level::ERROR, "r2"),
            Parcel::record(Level::DEBUG, "hidden"),
            Parcel::Shutdown,
        ];
        let (result, console) = run_with(SinkConfig::default(), parcels, false).await;
        result.unwrap();
        assert_eq!(
            console.text(),
            "INFO::Start Logging Server Process...\n\
             INFO::r1\n\
             ERROR::r2\n\
             INFO::Exiting Logging Server Process\n"
        );
    }

    #[tokio::test]
    async fn test_set_level_announces_and_filters() {
        let parcels = vec![
            Parcel::SetLevel {
                level: Level::ERROR,
            },
            Parcel::record(Level::WARNING, "dropped"),
            Parcel::record(Level::ERROR, "kept"),
            Parcel::Shutdown,
        ];
        let (result, console) = run_with(SinkConfig::default(), parcels, false).await;
        result.unwrap();
        let text = console.text();
        assert!(text.contains("Level 100::Setting logger level to 40\n"));
        assert!(!text.contains("dropped"));
        assert!(text.contains("ERROR::kept\n"));
        // The exit notice is INFO and now filtered.
        assert!(!text.contains("Exiting"));
    }

    #[tokio::test]
    async fn test_transcript_without_config_is_fatal() {
        let parcels = vec![
            Parcel::Transcript {
                payload: json!({"q": 1}),
            },
            Parcel::record(Level::INFO, "never"),
            Parcel::Shutdown,
        ];
        let (result, console) = run_with(SinkConfig::default(), parcels, false).await;
        assert!(matches!(result, Err(SinkError::TranscriptNotConfigured)));
        let text = console.text();
        assert!(text.contains(
            "CRITICAL::Logging process failed: received transcript write message but no transcript is enabled"
        ));
        assert!(!text.contains("never"));
    }

    #[tokio::test]
    async fn test_end_of_stream_is_fatal() {
        let parcels = vec![Parcel::record(Level::INFO, "last words")];
        let (result, console) = run_with(SinkConfig::default(), parcels, true).await;
        assert!(matches!(result, Err(SinkError::ChannelEnded)));
        assert!(console.text().contains("INFO::last words\n"));
        assert!(console.text().contains("CRITICAL::"));
    }

    #[tokio::test]
    async fn test_file_and_transcript_written_and_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = SinkConfig {
            file: Some(FileLogConfig::new(tmp.path().join("logs/run.log"), Level::DEBUG)),
            transcript: Some(
                TranscriptConfig::in_dir(tmp.path().join("tr"))
                    .with_name("chat")
                    .with_policy(RotationPolicy::ByLineCount { lines: 100 }),
            ),
            ..SinkConfig::default()
        };
        let parcels = vec![
            Parcel::record(Level::DEBUG, "file only"),
            Parcel::Transcript {
                payload: json!({"turn": 1}),
            },
            Parcel::Shutdown,
        ];
        let (result, console) = run_with(cfg, parcels, false).await;
        result.unwrap();

        assert!(console.text().starts_with("WARNING::Log directory "));
        assert!(!console.text().contains("file only"));

        let log = std::fs::read_to_string(tmp.path().join("logs/run.log")).unwrap();
        assert!(log.contains("2024-06-01 09:15:00--DEBUG::file only\n"));
        assert!(log.ends_with("--INFO::Exiting Logging Server Process\n"));

        let transcript =
            std::fs::read_to_string(tmp.path().join("tr/chat_2024-06-01T09:15:00.log")).unwrap();
        assert_eq!(transcript, "2024-06-01T09:15:00::::{\"turn\":1}\n");
    }

    #[tokio::test]
    async fn test_deferred_flush_still_delivers_everything_on_exit() {
        let cfg = SinkConfig {
            flush_every: 0,
            ..SinkConfig::default()
        };
        let parcels = vec![
            Parcel::record(Level::INFO, "a"),
            Parcel::record(Level::INFO, "b"),
            Parcel::Shutdown,
        ];
        let (result, console) = run_with(cfg, parcels, false).await;
        result.unwrap();
        assert_eq!(console.flushes(), 1);
        assert!(console.text().ends_with("INFO::b\nINFO::Exiting Logging Server Process\n"));
    }

    #[tokio::test]
    async fn test_default_cadence_flushes_each_line() {
        let parcels = vec![Parcel::record(Level::INFO, "a"), Parcel::Shutdown];
        let (result, console) = run_with(SinkConfig::default(), parcels, false).await;
        result.unwrap();
        // start, "a", exit, then close.
        assert_eq!(console.flushes(), 4);
    }

    #[tokio::test]
    async fn test_garbage_frame_is_malformed() {
        let (w, r) = tokio::io::duplex(1024);
        let console = SharedBuf::default();
        let cfg = SinkConfig::default();
        let sink = SinkLoop::new(r, &cfg, Box::new(console.clone()), clock());
        let mut writer = FramedWrite::new(w, codec::frame_codec(cfg.max_parcel_bytes));
        writer
            .send(bytes::Bytes::from_static(b"{not json"))
            .await
            .unwrap();

        let result = sink.run().await;
        assert!(matches!(result, Err(SinkError::Malformed(_))));
        assert!(console.text().contains("caused by:"));
    }
}
