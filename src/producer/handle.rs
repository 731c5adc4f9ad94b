//! # ProducerHandle: the client-facing facade
//!
//! [`ProducerHandle`] wraps one send side of the channel. It builds parcels,
//! optionally prefixes record messages with the handle's name, and sends them.
//!
//! ## Concurrency semantics
//! - Handles are cheap clones and can be moved across tasks and threads.
//! - No extra locking: every parcel is encoded and queued as one frame.
//! - Whether a transcript exists is only known to the sink; a transcript entry
//!   sent to a sink without one terminates that sink.
//!
//! ## Example
//! ```rust,no_run
//! use logvisor::{Level, Supervisor, SupervisorConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut sup = Supervisor::new(SupervisorConfig::default())?;
//! sup.start()?;
//!
//! let log = sup.handle("worker-1");
//! log.info("connected").await?;             // "INFO::worker-1: connected"
//! log.record(Level(25), "custom").await?;   // "Level 25::worker-1: custom"
//!
//! sup.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::Serialize;

use crate::error::SendError;
use crate::parcel::{Level, Parcel, ParcelSender};

/// Client handle bound to one supervisor's channel.
#[derive(Clone, Debug)]
pub struct ProducerHandle {
    sender: ParcelSender,
    name: Option<Arc<str>>,
}

impl ProducerHandle {
    /// Creates a handle; an empty name means "no prefix".
    pub fn new(sender: ParcelSender, name: &str) -> Self {
        let name = (!name.is_empty()).then(|| Arc::from(name));
        Self { sender, name }
    }

    /// Attribution prefix, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sends a log record.
    pub async fn record(&self, level: Level, message: impl AsRef<str>) -> Result<(), SendError> {
        let parcel = Parcel::record(level, self.attribute(message.as_ref()));
        self.sender.send(&parcel).await
    }

    /// Sends a transcript entry.
    ///
    /// Fails locally only when the payload cannot be encoded or the channel is
    /// closed; a missing transcript is detected by the sink.
    pub async fn transcribe<T>(&self, payload: &T) -> Result<(), SendError>
    where
        T: Serialize + ?Sized,
    {
        let parcel = Parcel::Transcript {
            payload: serde_json::to_value(payload)?,
        };
        self.sender.send(&parcel).await
    }

    pub async fn debug(&self, message: impl AsRef<str>) -> Result<(), SendError> {
        self.record(Level::DEBUG, message).await
    }

    pub async fn info(&self, message: impl AsRef<str>) -> Result<(), SendError> {
        self.record(Level::INFO, message).await
    }

    pub async fn warning(&self, message: impl AsRef<str>) -> Result<(), SendError> {
        self.record(Level::WARNING, message).await
    }

    pub async fn error(&self, message: impl AsRef<str>) -> Result<(), SendError> {
        self.record(Level::ERROR, message).await
    }

    pub async fn critical(&self, message: impl AsRef<str>) -> Result<(), SendError> {
        self.record(Level::CRITICAL, message).await
    }

    /// Blocking [`record`](Self::record) for plain OS threads.
    ///
    /// # Panics
    /// Panics when called from within an async execution context.
    pub fn record_blocking(&self, level: Level, message: impl AsRef<str>) -> Result<(), SendError> {
        let parcel = Parcel::record(level, self.attribute(message.as_ref()));
        self.sender.send_blocking(&parcel)
    }

    /// Blocking [`transcribe`](Self::transcribe) for plain OS threads.
    ///
    /// # Panics
    /// Panics when called from within an async execution context.
    pub fn transcribe_blocking<T>(&self, payload: &T) -> Result<(), SendError>
    where
        T: Serialize + ?Sized,
    {
        let parcel = Parcel::Transcript {
            payload: serde_json::to_value(payload)?,
        };
        self.sender.send_blocking(&parcel)
    }

    fn attribute(&self, message: &str) -> String {
        match &self.name {
            Some(name) => format!("{name}: {message}"),
            None => message.to_string(),
        }
    }
}
