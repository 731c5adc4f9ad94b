//! # RemoteLink: producers in another OS process.
//!
//! A child process connects to the supervisor's producer socket and gets
//! ordinary [`ProducerHandle`]s from the link. Parcels are encoded and queued
//! locally; one forwarder writes them to the socket a whole frame at a time,
//! exactly like the supervisor's forwarder writes the sink's stdin.
//!
//! ```text
//! child process                                   supervisor process
//! ProducerHandle ─┐
//! ProducerHandle ─┴─► ParcelQueue ─► forwarder ─► socket ─► relay ─► sink
//! ```
//!
//! The link's frame limit must not exceed the supervisor's
//! `max_parcel_bytes`; the relay drops a connection that sends a larger frame.
//!
//! ## Example
//! ```rust,no_run
//! # async fn child() -> Result<(), Box<dyn std::error::Error>> {
//! let link = logvisor::RemoteLink::from_env().await?;
//! let log = link.handle("child");
//! log.info("hello from another process").await?;
//! drop(log);
//! link.close().await;
//! # Ok(())
//! # }
//! ```

use std::io;
use std::path::{Path, PathBuf};

use tokio::net::UnixStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::PRODUCER_SOCKET_ENV;
use crate::core::forwarder;
use crate::parcel::{ParcelSender, channel, codec::DEFAULT_MAX_PARCEL_BYTES};
use crate::producer::ProducerHandle;

const LINK_CAPACITY: usize = 1024;

/// Connection from a child process to a supervisor's producer socket.
pub struct RemoteLink {
    sender: ParcelSender,
    forwarder: JoinHandle<()>,
    token: CancellationToken,
}

impl RemoteLink {
    /// Connects with the default frame limit (1 MiB).
    pub async fn connect(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::connect_with_limit(path, DEFAULT_MAX_PARCEL_BYTES).await
    }

    /// Connects; parcels larger than `max_parcel_bytes` are refused at send time.
    pub async fn connect_with_limit(
        path: impl AsRef<Path>,
        max_parcel_bytes: usize,
    ) -> io::Result<Self> {
        let stream = UnixStream::connect(path.as_ref()).await?;
        let (sender, queue) = channel(LINK_CAPACITY, max_parcel_bytes);
        let token = CancellationToken::new();
        let forwarder = tokio::spawn(forwarder::forward(
            queue,
            stream,
            max_parcel_bytes,
            token.clone(),
        ));
        tracing::debug!(socket = %path.as_ref().display(), "connected to producer socket");
        Ok(Self {
            sender,
            forwarder,
            token,
        })
    }

    /// Connects to the socket named by [`PRODUCER_SOCKET_ENV`].
    pub async fn from_env() -> io::Result<Self> {
        let path = std::env::var_os(PRODUCER_SOCKET_ENV).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{PRODUCER_SOCKET_ENV} is not set"),
            )
        })?;
        Self::connect(PathBuf::from(path)).await
    }

    /// Returns a new handle; `name` prefixes every record it sends (empty = none).
    pub fn handle(&self, name: &str) -> ProducerHandle {
        ProducerHandle::new(self.sender.clone(), name)
    }

    /// Writes out every parcel already queued, then closes the connection.
    ///
    /// Sends through handles that outlive the link fail with `ChannelClosed`.
    pub async fn close(self) {
        let RemoteLink {
            sender,
            forwarder,
            token,
        } = self;
        drop(sender);
        token.cancel();
        if let Err(e) = forwarder.await {
            tracing::warn!(error = %e, "link forwarder failed");
        }
    }
}
