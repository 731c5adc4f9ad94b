//! # Relay: producers in other OS processes.
//!
//! When [`SupervisorConfig::producer_socket`](crate::SupervisorConfig) is set,
//! the supervisor listens on a Unix domain socket. Every accepted connection
//! gets its own task with its own `FramedRead`; validated frames are pushed
//! into the same queue the in-process handles use, so the forwarder stays the
//! only writer on the sink's stdin.
//!
//! ```text
//! child process                              supervisor process
//! RemoteLink ─► forwarder ─► socket ──► connection task ─┐
//! RemoteLink ─► forwarder ─► socket ──► connection task ─┼─► ParcelSender ─► forwarder ─► sink
//!                                       ProducerHandle ──┘
//! ```
//!
//! ## Rules
//! - Frames of one connection keep their order and are never split.
//! - An oversized or malformed frame drops that connection, not the sink.
//! - The listener socket is bound before the sink is spawned, so children
//!   started after `start()` can always connect.
//! - On shutdown frames still unread in a socket are discarded.

use std::io;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::parcel::ParcelSender;

/// A bound but not yet served listener socket.
pub(crate) struct Bound {
    path: PathBuf,
    #[cfg(unix)]
    listener: std::os::unix::net::UnixListener,
}

/// A running accept loop.
pub(crate) struct Relay {
    path: PathBuf,
    task: tokio::task::JoinHandle<()>,
}

/// Binds the producer socket, replacing a stale socket file left at `path`.
#[cfg(unix)]
pub(crate) fn bind(path: &Path) -> io::Result<Bound> {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => std::fs::remove_file(path)?,
        Ok(_) => {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists and is not a socket", path.display()),
            ));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let listener = std::os::unix::net::UnixListener::bind(path)?;
    listener.set_nonblocking(true)?;
    Ok(Bound {
        path: path.to_path_buf(),
        listener,
    })
}

/// Binds the producer socket.
#[cfg(not(unix))]
pub(crate) fn bind(path: &Path) -> io::Result<Bound> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!(
            "producer socket {} needs Unix domain sockets",
            path.display()
        ),
    ))
}

impl Bound {
    /// Starts accepting producers. Must be called inside a tokio runtime.
    #[cfg(unix)]
    pub(crate) fn serve(self, sender: ParcelSender, token: CancellationToken) -> io::Result<Relay> {
        let listener = match tokio::net::UnixListener::from_std(self.listener) {
            Ok(listener) => listener,
            Err(e) => {
                remove_socket(&self.path);
                return Err(e);
            }
        };
        tracing::info!(socket = %self.path.display(), "accepting remote producers");
        let task = tokio::spawn(unix::accept_loop(listener, sender, token));
        Ok(Relay {
            path: self.path,
            task,
        })
    }

    /// Starts accepting producers.
    #[cfg(not(unix))]
    pub(crate) fn serve(self, _sender: ParcelSender, _token: CancellationToken) -> io::Result<Relay> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    /// Closes the socket without serving it.
    pub(crate) fn discard(self) {
        remove_socket(&self.path);
    }
}

impl Relay {
    /// Waits for the accept loop (its token must be cancelled) and removes the socket file.
    pub(crate) async fn stop(self) {
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "relay task failed");
        }
        remove_socket(&self.path);
    }
}

fn remove_socket(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::debug!(socket = %path.display(), error = %e, "producer socket not removed");
    }
}

#[cfg(unix)]
mod unix {
    use futures::StreamExt;
    use tokio::net::{UnixListener, UnixStream};
    use tokio::task::JoinSet;
    use tokio_util::codec::FramedRead;
    use tokio_util::sync::CancellationToken;

    use crate::parcel::{ParcelSender, codec};

    pub(super) async fn accept_loop(
        listener: UnixListener,
        sender: ParcelSender,
        token: CancellationToken,
    ) {
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        connections.spawn(serve_connection(stream, sender.clone(), token.clone()));
                    }
                    Err(e) => tracing::warn!(error = %e, "accepting producer connection failed"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }
        connections.shutdown().await;
        tracing::debug!("relay stopped");
    }

    async fn serve_connection(stream: UnixStream, sender: ParcelSender, token: CancellationToken) {
        let mut frames = FramedRead::new(stream, codec::frame_codec(sender.limit()));
        let mut relayed: u64 = 0;

        loop {
            let frame = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                frame = frames.next() => frame,
            };
            let frame = match frame {
                None => break,
                Some(Ok(frame)) => frame.freeze(),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, relayed, "unreadable frame, dropping producer connection");
                    break;
                }
            };
            match codec::decode(&frame) {
                Ok(parcel) => tracing::trace!(kind = parcel.kind(), "relaying parcel"),
                Err(e) => {
                    tracing::warn!(error = %e, relayed, "malformed parcel, dropping producer connection");
                    break;
                }
            }
            if let Err(e) = sender.send_frame(frame).await {
                tracing::debug!(error = %e, "channel closed, dropping producer connection");
                break;
            }
            relayed += 1;
        }
        tracing::debug!(relayed, "producer connection closed");
    }
}
