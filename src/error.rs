//! Error types used by the logvisor runtime, its producers and the sink process.
//!
//! This module defines four error enums:
//!
//! - [`SendError`]: a producer could not hand a parcel to the channel.
//! - [`ConfigError`]: configuration rejected before anything is spawned.
//! - [`SinkError`]: fatal errors inside the sink loop (never retried).
//! - [`SupervisorError`]: lifecycle errors of the sink process.
//!
//! Every enum provides `as_label` (stable snake_case label for logs).

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// # Errors produced when sending a parcel.
///
/// A send either reaches the channel or fails loudly; parcels are never
/// dropped silently.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SendError {
    /// The consumer side of the channel no longer exists.
    #[error("channel closed: no sink is draining it")]
    ChannelClosed,

    /// The encoded parcel exceeds the channel's frame limit.
    #[error("parcel of {size} bytes exceeds the {limit} byte frame limit")]
    ParcelTooLarge {
        /// Encoded size in bytes.
        size: usize,
        /// Configured `max_parcel_bytes`.
        limit: usize,
    },

    /// The payload could not be serialized to JSON.
    #[error("failed to encode parcel: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SendError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use logvisor::SendError;
    ///
    /// assert_eq!(SendError::ChannelClosed.as_label(), "channel_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SendError::ChannelClosed => "channel_closed",
            SendError::ParcelTooLarge { .. } => "parcel_too_large",
            SendError::Encode(_) => "parcel_encode",
        }
    }
}

/// # Errors produced while validating configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Rotation policy name is not one of `time`, `day`, `lines`.
    #[error("unknown rotation policy '{0}'")]
    UnknownRotationPolicy(String),

    /// Interval text is not `HH:MM:SS`, or evaluates to zero.
    #[error("invalid rotation interval '{0}', expected non-zero HH:MM:SS")]
    InvalidInterval(String),

    /// `ByLineCount` needs at least one line per file.
    #[error("line-count rotation needs at least one line per file")]
    ZeroLineCount,

    /// `max_parcel_bytes` must allow at least one byte.
    #[error("max_parcel_bytes must be greater than zero")]
    ZeroParcelLimit,

    /// Sink configuration handed over by the supervisor is not valid JSON.
    #[error("malformed sink configuration: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::UnknownRotationPolicy(_) => "config_unknown_rotation_policy",
            ConfigError::InvalidInterval(_) => "config_invalid_interval",
            ConfigError::ZeroLineCount => "config_zero_line_count",
            ConfigError::ZeroParcelLimit => "config_zero_parcel_limit",
            ConfigError::Malformed(_) => "config_malformed",
        }
    }
}

/// # Fatal errors inside the sink loop.
///
/// Any of these ends the sink: it is logged at CRITICAL with its source
/// chain, every handler is closed, and the process exits with a failure code.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SinkError {
    /// A transcript entry arrived but no transcript was configured.
    #[error("received transcript write message but no transcript is enabled")]
    TranscriptNotConfigured,

    /// Filesystem or stream I/O failed.
    #[error("{context}: {source}")]
    Io {
        /// What the sink was doing.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Reading a frame off the channel failed (includes oversized frames).
    #[error("failed to read frame from channel")]
    Frame(#[source] io::Error),

    /// A frame did not decode into a parcel.
    #[error("malformed parcel")]
    Malformed(#[source] serde_json::Error),

    /// Every producer went away without sending the shutdown sentinel.
    #[error("channel ended before a shutdown was requested")]
    ChannelEnded,

    /// Sink configuration was rejected.
    #[error("invalid sink configuration")]
    Config(#[from] ConfigError),
}

impl SinkError {
    /// Wraps an I/O error with a short description of the failed operation.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        SinkError::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use logvisor::SinkError;
    ///
    /// assert_eq!(SinkError::TranscriptNotConfigured.as_label(), "sink_transcript_not_configured");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SinkError::TranscriptNotConfigured => "sink_transcript_not_configured",
            SinkError::Io { .. } => "sink_io",
            SinkError::Frame(_) => "sink_frame",
            SinkError::Malformed(_) => "sink_malformed_parcel",
            SinkError::ChannelEnded => "sink_channel_ended",
            SinkError::Config(_) => "sink_config",
        }
    }
}

/// # Errors produced by the supervisor while managing the sink process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// `start` was called on a supervisor that already spawned its sink.
    #[error("sink process already started")]
    AlreadyStarted,

    /// The operation needs a running sink.
    #[error("sink process not started")]
    NotStarted,

    /// `shutdown` already completed; the sink can only be joined once.
    #[error("sink process already terminated")]
    AlreadyTerminated,

    /// Spawning the sink program failed.
    #[error("failed to spawn sink process")]
    Spawn(#[source] io::Error),

    /// Binding the producer socket failed.
    #[error("failed to listen for remote producers")]
    Listen(#[source] io::Error),

    /// Waiting for the sink process failed.
    #[error("failed to wait for sink process")]
    Wait(#[source] io::Error),

    /// The sink process exited with a failure status.
    #[error("sink process exited with {status}")]
    SinkExited {
        /// Exit status reported by the OS.
        status: ExitStatus,
    },

    /// Configuration was rejected at construction.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A control parcel could not be sent.
    #[error(transparent)]
    Send(#[from] SendError),
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::AlreadyStarted => "supervisor_already_started",
            SupervisorError::NotStarted => "supervisor_not_started",
            SupervisorError::AlreadyTerminated => "supervisor_already_terminated",
            SupervisorError::Spawn(_) => "supervisor_spawn",
            SupervisorError::Listen(_) => "supervisor_listen",
            SupervisorError::Wait(_) => "supervisor_wait",
            SupervisorError::SinkExited { .. } => "supervisor_sink_exited",
            SupervisorError::Config(e) => e.as_label(),
            SupervisorError::Send(e) => e.as_label(),
        }
    }
}
