//! # logvisor
//!
//! **Logvisor** is a centralized, out-of-process logging subsystem.
//!
//! Many concurrent producers hand log records and structured transcript
//! entries to one dedicated sink process. The sink owns every output (console,
//! log file, rotating transcript files), so producers never contend for file
//! handles or interleave partial lines.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ProducerHandle│   │ProducerHandle│   │ProducerHandle│   │  RemoteLink  │
//!     │  (task #1)   │   │  (thread #2) │   │  (child proc)│──►│ socket relay │
//!     └──────┬───────┘   └──────┬───────┘   └──────────────┘   └──────┬───────┘
//!            │ Record / Transcript parcels, one frame each            │
//!            ▼                  ▼                                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Channel (bounded mpsc of encoded frames, one per parcel)         │
//! │  capacity: SupervisorConfig::channel_capacity                     │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  forwarder (one task)  │  Supervisor: start / set_level
//!                       │  FramedWrite → stdin   │              / shutdown
//!                       └───────────┬────────────┘
//!  ═════════════════════════════════╪══════════ process boundary ════════
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  SinkLoop (logvisor-   │
//!                       │  sink binary)          │
//!                       └───┬────────┬────────┬──┘
//!                           ▼        ▼        ▼
//!                       console   log file  Transcript
//!                       (stderr)  (append)  (rotating JSON lines)
//! ```
//!
//! ### Lifecycle
//! ```text
//! Supervisor::new(cfg) ──► start() ──► handle(name) … record / transcribe
//!                                   └► set_level(l)
//!                                   └► shutdown(): Shutdown parcel ─► sink exits ─► wait
//! ```
//!
//! ## Features
//! | Area            | Description                                               | Key types                                  |
//! |-----------------|-----------------------------------------------------------|--------------------------------------------|
//! | **Producers**   | Send records and transcript entries from any task/thread. | [`ProducerHandle`], [`Level`]              |
//! | **Remote**      | Producers in child processes, over a Unix socket.         | [`RemoteLink`], [`PRODUCER_SOCKET_ENV`]    |
//! | **Supervision** | Spawn, control and join the sink process.                 | [`Supervisor`], [`SupervisorConfig`]       |
//! | **Sink**        | Consumer loop and line handlers.                          | [`SinkLoop`], [`LogHandler`]               |
//! | **Transcripts** | Rotating JSON-line files by time, day or line count.      | [`Transcript`], [`RotationPolicy`]         |
//! | **Errors**      | Typed errors per layer.                                   | [`SendError`], [`SinkError`], [`SupervisorError`] |
//!
//! ## Example
//! ```rust,no_run
//! use logvisor::{
//!     FileLogConfig, Level, RotationPolicy, SinkConfig, Supervisor, SupervisorConfig,
//!     TranscriptConfig,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = SupervisorConfig {
//!         sink: SinkConfig {
//!             file: Some(FileLogConfig::new("logs/app.log", Level::DEBUG)),
//!             transcript: Some(
//!                 TranscriptConfig::in_dir("transcripts")
//!                     .with_policy(RotationPolicy::ByLineCount { lines: 500 }),
//!             ),
//!             ..SinkConfig::default()
//!         },
//!         ..SupervisorConfig::default()
//!     };
//!
//!     let mut sup = Supervisor::new(cfg)?;
//!     sup.start()?;
//!
//!     let log = sup.handle("main");
//!     log.info("hello").await?;
//!     log.transcribe(&serde_json::json!({"user": "hi", "bot": "hello"})).await?;
//!
//!     sup.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod core;
mod error;
mod parcel;
mod producer;
mod sink;
mod transcript;

// ---- Public re-exports ----

pub use crate::core::{
    ConsoleOutput, DiagnosticsConfig, FileLogConfig, PRODUCER_SOCKET_ENV, SINK_CONFIG_ENV,
    SinkConfig, Supervisor, SupervisorConfig,
};
pub use error::{ConfigError, SendError, SinkError, SupervisorError};
pub use parcel::{Level, Parcel, ParcelQueue, ParcelSender, channel, codec};
pub use producer::ProducerHandle;
#[cfg(unix)]
pub use producer::RemoteLink;
pub use sink::{Interrupts, LogHandler, SinkLoop, serve_stdin};
pub use transcript::{
    Clock, LocalClock, RotationPolicy, SharedClock, Transcript, TranscriptConfig, isoformat,
};
