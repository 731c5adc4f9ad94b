//! # Multi-producer channel into the sink.
//!
//! [`channel`] returns a cloneable [`ParcelSender`] and a single
//! [`ParcelQueue`]. It is a thin wrapper around [`tokio::sync::mpsc`] that
//! carries already-encoded frames.
//!
//! ## Architecture
//! ```text
//! Writers (many):                        Reader (one):
//!   ProducerHandle ──┐
//!   ProducerHandle ──┼──► ParcelSender ──► ParcelQueue ──► forwarder ──► sink stdin
//!   Supervisor     ──┘   (bounded mpsc)
//! ```
//!
//! ## Rules
//! - **Atomic**: a parcel is encoded before it is queued, and one forwarder
//!   writes whole frames, so concurrent sends never interleave on the pipe.
//! - **FIFO per writer**: sequential sends from one writer arrive in order.
//! - **Backpressure**: `send` waits while the queue is full; nothing is dropped.
//! - **Closed**: once the queue is gone, `send` fails with `ChannelClosed`.

use bytes::Bytes;
use tokio::sync::mpsc;

use super::{Parcel, codec};
use crate::error::SendError;

/// Creates a channel with the given capacity (clamped to at least 1) and
/// per-parcel size limit.
pub fn channel(capacity: usize, max_parcel_bytes: usize) -> (ParcelSender, ParcelQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ParcelSender {
            tx,
            limit: max_parcel_bytes,
        },
        ParcelQueue { rx },
    )
}

/// Send side of the channel. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ParcelSender {
    tx: mpsc::Sender<Bytes>,
    limit: usize,
}

impl ParcelSender {
    /// Encodes and enqueues a parcel, waiting for space when the queue is full.
    pub async fn send(&self, parcel: &Parcel) -> Result<(), SendError> {
        let frame = codec::encode(parcel, self.limit)?;
        self.tx
            .send(frame)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Enqueues a frame that was encoded by another process.
    pub(crate) async fn send_frame(&self, frame: Bytes) -> Result<(), SendError> {
        if frame.len() > self.limit {
            return Err(SendError::ParcelTooLarge {
                size: frame.len(),
                limit: self.limit,
            });
        }
        self.tx
            .send(frame)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Blocking variant of [`send`](Self::send) for plain OS threads.
    ///
    /// # Panics
    /// Panics when called from within an async execution context, like
    /// [`mpsc::Sender::blocking_send`].
    pub fn send_blocking(&self, parcel: &Parcel) -> Result<(), SendError> {
        let frame = codec::encode(parcel, self.limit)?;
        self.tx
            .blocking_send(frame)
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Returns `true` once the queue has been closed or dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Frame size limit enforced by this sender.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Receive side of the channel. Exactly one exists per channel.
#[derive(Debug)]
pub struct ParcelQueue {
    rx: mpsc::Receiver<Bytes>,
}

impl ParcelQueue {
    /// Waits for the next frame; `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Blocking [`recv`](Self::recv) for plain OS threads.
    pub fn blocking_recv(&mut self) -> Option<Bytes> {
        self.rx.blocking_recv()
    }

    /// Closes the queue so further sends fail with `ChannelClosed`.
    ///
    /// Frames already queued can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
