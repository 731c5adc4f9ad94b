//! # Forwarder: drains a parcel queue into one byte stream.
//!
//! One forwarder per stream: the sink's stdin on the supervisor side, or the
//! producer socket inside a child process. It is the only writer on that
//! stream, so frames from concurrent producers are written whole and in
//! queue order.
//!
//! ```text
//! ParcelQueue ──recv()──► FramedWrite<W, LengthDelimitedCodec> ──► stream
//!      ▲                         │
//!      └── close() on exit ◄─────┘ (write error, or all senders gone)
//! ```
//!
//! Cancellation closes the queue, so later sends fail with `ChannelClosed`,
//! then writes out the frames already queued. A broken stream ends the
//! forwarder at once and closes the queue the same way.

use bytes::Bytes;
use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;

use crate::parcel::{ParcelQueue, codec};

/// Runs until every sender is gone (or the queue is drained after
/// cancellation), or until the stream breaks.
pub(crate) async fn forward<W>(
    mut queue: ParcelQueue,
    writer: W,
    max_parcel_bytes: usize,
    token: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    let mut frames = FramedWrite::new(writer, codec::frame_codec(max_parcel_bytes));
    let mut forwarded: u64 = 0;
    let mut draining = false;

    loop {
        let frame = if draining {
            queue.recv().await
        } else {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    queue.close();
                    draining = true;
                    continue;
                }
                frame = queue.recv() => frame,
            }
        };
        let Some(frame) = frame else {
            break;
        };
        if let Err(e) = frames.send(frame).await {
            tracing::warn!(error = %e, forwarded, "stream closed; dropping channel");
            break;
        }
        forwarded += 1;
    }

    queue.close();
    if let Err(e) = SinkExt::<Bytes>::close(&mut frames).await {
        tracing::debug!(error = %e, "closing stream failed");
    }
    tracing::debug!(forwarded, "forwarder stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SendError;
    use crate::parcel::{Level, Parcel, channel};
    use futures::StreamExt;
    use tokio_util::codec::FramedRead;

    #[tokio::test]
    async fn test_frames_arrive_in_order() {
        let (tx, rx) = channel(4, codec::DEFAULT_MAX_PARCEL_BYTES);
        let (w, r) = tokio::io::duplex(1024);
        let token = CancellationToken::new();
        let task = tokio::spawn(forward(rx, w, codec::DEFAULT_MAX_PARCEL_BYTES, token));

        for i in 0..3 {
            tx.send(&Parcel::record(Level::INFO, format!("n{i}")))
                .await
                .unwrap();
        }
        tx.send(&Parcel::Shutdown).await.unwrap();
        drop(tx);

        let mut reader = FramedRead::new(r, codec::frame_codec(codec::DEFAULT_MAX_PARCEL_BYTES));
        let mut got = Vec::new();
        while let Some(frame) = reader.next().await {
            got.push(codec::decode(&frame.unwrap()).unwrap());
        }
        task.await.unwrap();

        assert_eq!(got.len(), 4);
        assert_eq!(got[0], Parcel::record(Level::INFO, "n0"));
        assert_eq!(got[3], Parcel::Shutdown);
    }

    #[tokio::test]
    async fn test_broken_pipe_closes_channel() {
        let (tx, rx) = channel(4, codec::DEFAULT_MAX_PARCEL_BYTES);
        let (w, r) = tokio::io::duplex(64);
        drop(r);
        let task = tokio::spawn(forward(
            rx,
            w,
            codec::DEFAULT_MAX_PARCEL_BYTES,
            CancellationToken::new(),
        ));

        tx.send(&Parcel::Shutdown).await.unwrap();
        task.await.unwrap();

        assert!(matches!(
            tx.send(&Parcel::Shutdown).await,
            Err(SendError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_cancel_writes_queued_frames_then_closes() {
        let (tx, rx) = channel(4, codec::DEFAULT_MAX_PARCEL_BYTES);
        let (w, r) = tokio::io::duplex(1024);
        let token = CancellationToken::new();

        tx.send(&Parcel::record(Level::INFO, "queued")).await.unwrap();
        token.cancel();
        let task = tokio::spawn(forward(rx, w, codec::DEFAULT_MAX_PARCEL_BYTES, token));

        let mut reader = FramedRead::new(r, codec::frame_codec(codec::DEFAULT_MAX_PARCEL_BYTES));
        let frame = reader.next().await.unwrap().unwrap();
        assert_eq!(
            codec::decode(&frame).unwrap(),
            Parcel::record(Level::INFO, "queued")
        );
        // Stream closed after the drain, although `tx` is still alive.
        assert!(reader.next().await.is_none());
        task.await.unwrap();
        assert!(matches!(
            tx.send(&Parcel::Shutdown).await,
            Err(SendError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_cancel_stops_forwarder() {
        let (tx, rx) = channel(4, codec::DEFAULT_MAX_PARCEL_BYTES);
        let (w, _r) = tokio::io::duplex(64);
        let token = CancellationToken::new();
        let task = tokio::spawn(forward(rx, w, codec::DEFAULT_MAX_PARCEL_BYTES, token.clone()));

        token.cancel();
        task.await.unwrap();
        assert!(tx.is_closed());
    }
}
