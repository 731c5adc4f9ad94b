//! # Runtime configuration.
//!
//! Two layers:
//! - [`SinkConfig`] what the sink process does with parcels. Serialized to JSON
//!   and handed to the child in [`SINK_CONFIG_ENV`]; the sink captures it once
//!   and never shares it back.
//! - [`SupervisorConfig`] the sink config plus parent-side settings (program
//!   path, console destination, channel capacity).
//!
//! ## Sentinel values
//! - `channel_capacity = 0` → clamped to 1
//! - `flush_every = 0` → console and file flushed only when the sink exits
//! - `transcript.flush_every = 0` → flush only on rotation and close

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::Stdio;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::parcel::{Level, codec::DEFAULT_MAX_PARCEL_BYTES};
use crate::transcript::TranscriptConfig;

/// Environment variable carrying the JSON-encoded [`SinkConfig`].
pub const SINK_CONFIG_ENV: &str = "LOGVISOR_SINK_CONFIG";

/// Environment variable a child process reads to find the producer socket.
///
/// The supervisor does not set it; pass
/// [`Supervisor::producer_socket`](crate::Supervisor::producer_socket) to the
/// children that should log through [`RemoteLink::from_env`](crate::RemoteLink::from_env).
pub const PRODUCER_SOCKET_ENV: &str = "LOGVISOR_PRODUCER_SOCKET";

/// Default console line template.
pub const DEFAULT_CONSOLE_FORMAT: &str = "{level}::{message}";
/// Default file line template.
pub const DEFAULT_FILE_FORMAT: &str = "{timestamp}--{level}::{message}";
/// Default `{timestamp}` format (chrono strftime syntax).
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Settings of the sink process.
///
/// ## Templates
/// Line templates understand `{timestamp}`, `{level}` and `{message}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Console threshold.
    pub console_level: Level,
    /// Console line template.
    pub console_format: String,
    /// Optional log file.
    pub file: Option<FileLogConfig>,
    /// strftime format for `{timestamp}`.
    pub date_format: String,
    /// Optional transcript.
    pub transcript: Option<TranscriptConfig>,
    /// Largest encoded parcel accepted by the channel.
    pub max_parcel_bytes: usize,
    /// Console and file handlers flush after this many written lines
    /// (0 = only when the sink exits).
    pub flush_every: u32,
    /// Where the sink's own `tracing` output goes.
    pub diagnostics: DiagnosticsConfig,
}

impl SinkConfig {
    /// Reads the configuration handed over by the supervisor.
    ///
    /// Falls back to [`SinkConfig::default`] when the variable is absent, so the
    /// sink can also be started by hand at the end of a pipe.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(SINK_CONFIG_ENV) {
            Ok(text) => Self::from_json(&text),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: SinkConfig = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Encodes the configuration for [`SINK_CONFIG_ENV`].
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Checks invariants that would otherwise surface inside the sink.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parcel_bytes == 0 {
            return Err(ConfigError::ZeroParcelLimit);
        }
        if let Some(tr) = &self.transcript {
            tr.policy.validate()?;
        }
        Ok(())
    }
}

impl Default for SinkConfig {
    /// Default configuration:
    ///
    /// - console at `INFO` with `{level}::{message}`
    /// - no log file, no transcript
    /// - timestamps as `%Y-%m-%d %H:%M:%S`
    /// - parcels up to 1 MiB
    /// - every line flushed as soon as it is written
    /// - sink diagnostics at `warn` on stderr
    fn default() -> Self {
        Self {
            console_level: Level::INFO,
            console_format: DEFAULT_CONSOLE_FORMAT.to_string(),
            file: None,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            transcript: None,
            max_parcel_bytes: DEFAULT_MAX_PARCEL_BYTES,
            flush_every: 1,
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

/// The sink process's own `tracing` diagnostics.
///
/// By default they share stderr with the console lines. Setting `path` moves
/// them to a file so the console stream only carries formatted records.
/// `RUST_LOG` in the sink's environment overrides `filter`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Append diagnostics to this file instead of stderr.
    pub path: Option<PathBuf>,
    /// `EnvFilter` directives.
    pub filter: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            path: None,
            filter: "warn".to_string(),
        }
    }
}

/// Log file settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLogConfig {
    /// File path; its parent directory is created if missing.
    pub path: PathBuf,
    /// File threshold.
    pub level: Level,
    /// File line template.
    pub format: String,
}

impl FileLogConfig {
    /// Log file at `path` with the given threshold and the default template.
    pub fn new(path: impl Into<PathBuf>, level: Level) -> Self {
        Self {
            path: path.into(),
            level,
            format: DEFAULT_FILE_FORMAT.to_string(),
        }
    }
}

impl Default for FileLogConfig {
    fn default() -> Self {
        Self::new("logs/log.log", Level::INFO)
    }
}

/// Where the sink's console stream (its stderr) goes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConsoleOutput {
    /// Share the supervisor's stderr.
    #[default]
    Inherit,
    /// Discard console lines.
    Discard,
    /// Append console lines to a file.
    File(PathBuf),
}

impl ConsoleOutput {
    pub(crate) fn stdio(&self) -> std::io::Result<Stdio> {
        Ok(match self {
            ConsoleOutput::Inherit => Stdio::inherit(),
            ConsoleOutput::Discard => Stdio::null(),
            ConsoleOutput::File(path) => OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?
                .into(),
        })
    }
}

/// Configuration of a [`Supervisor`](crate::Supervisor).
///
/// ## Field semantics
/// - `sink`: captured by the sink process at spawn time
/// - `sink_program`: executable that runs the sink loop (`logvisor-sink`)
/// - `console_output`: destination of the sink's console stream
/// - `channel_capacity`: parcels buffered before producers wait (min 1)
/// - `producer_socket`: Unix socket accepting producers from other processes
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Settings passed to the sink process.
    pub sink: SinkConfig,
    /// Sink executable, resolved through `PATH` when relative.
    pub sink_program: PathBuf,
    /// Destination of the sink's console stream.
    pub console_output: ConsoleOutput,
    /// Capacity of the in-process parcel queue.
    pub channel_capacity: usize,
    /// Socket path for remote producers; `None` keeps producers in-process.
    pub producer_socket: Option<PathBuf>,
}

impl SupervisorConfig {
    /// Configuration that runs `sink_program` with default sink settings.
    pub fn with_program(sink_program: impl Into<PathBuf>) -> Self {
        Self {
            sink_program: sink_program.into(),
            ..Self::default()
        }
    }

    /// Also accepts producers from other processes on `path`.
    pub fn with_producer_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.producer_socket = Some(path.into());
        self
    }

    /// Returns the channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn channel_capacity_clamped(&self) -> usize {
        self.channel_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `sink = SinkConfig::default()`
    /// - `sink_program = "logvisor-sink"` (looked up on `PATH`)
    /// - `console_output = Inherit`
    /// - `channel_capacity = 1024`
    /// - no producer socket
    fn default() -> Self {
        Self {
            sink: SinkConfig::default(),
            sink_program: PathBuf::from("logvisor-sink"),
            console_output: ConsoleOutput::default(),
            channel_capacity: 1024,
            producer_socket: None,
        }
    }
}
