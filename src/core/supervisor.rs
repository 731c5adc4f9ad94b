//! # Supervisor: owns the sink process and the send side of the channel.
//!
//! The [`Supervisor`] creates the parcel channel, spawns the `logvisor-sink`
//! program, hands out [`ProducerHandle`]s and performs the message-based
//! shutdown handshake.
//!
//! ## Lifecycle
//! ```text
//!            new(cfg)                start()                   shutdown()
//!   ─────────────────► Idle ──────────────────► Running ──────────────────► Terminated
//!                        │  spawn sink program      │  send Shutdown
//!                        │  spawn forwarder         │  child.wait()  (no timeout)
//!                        │                          │  cancel forwarder, close queue
//!                        ▼                          ▼
//!              handles queue frames       handles reach the sink
//! ```
//!
//! ## Process wiring
//! ```text
//! ProducerHandle ─┐                                   ┌─────────── sink process ───────────┐
//! ProducerHandle ─┼─► ParcelQueue ─► forwarder ─► stdin ─► SinkLoop ─► console (stderr)     │
//! Supervisor     ─┘   (bounded)      (one writer)     │              ├► log file            │
//!                                                     │              └► transcript files    │
//!                                                     └─────────────────────────────────────┘
//! ```
//!
//! With a producer socket configured, [`relay`](super::relay) connections from
//! other processes feed the same queue.
//!
//! ## Rules
//! - `start` runs once; a second call is refused with `AlreadyStarted`.
//! - `shutdown` joins the sink once; a second call is refused with `AlreadyTerminated`.
//! - The producer socket is bound before the sink is spawned and removed on shutdown.
//! - Nothing kills the sink: it exits on `Shutdown`, or on its own fatal error.
//! - After `shutdown` returns, every send fails with `ChannelClosed`.

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::config::{SINK_CONFIG_ENV, SupervisorConfig};
use crate::core::{forwarder, relay};
use crate::error::{SendError, SupervisorError};
use crate::parcel::{Level, Parcel, ParcelQueue, ParcelSender, channel};
use crate::producer::ProducerHandle;

/// Coordinates the sink process and the channel feeding it.
pub struct Supervisor {
    cfg: SupervisorConfig,
    sender: ParcelSender,
    state: SinkState,
}

enum SinkState {
    /// Channel created, no process yet. Frames wait in the queue.
    Idle(ParcelQueue),
    Running(RunningSink),
    Terminated,
}

struct RunningSink {
    child: Child,
    forwarder: JoinHandle<()>,
    relay: Option<relay::Relay>,
    token: CancellationToken,
}

impl Supervisor {
    /// Validates the configuration and creates the channel.
    ///
    /// No process is spawned until [`start`](Self::start).
    pub fn new(cfg: SupervisorConfig) -> Result<Self, SupervisorError> {
        cfg.sink.validate()?;
        let (sender, queue) = channel(cfg.channel_capacity_clamped(), cfg.sink.max_parcel_bytes);
        Ok(Self {
            cfg,
            sender,
            state: SinkState::Idle(queue),
        })
    }

    /// Spawns the sink process and the forwarder feeding its stdin, and
    /// starts accepting remote producers when a socket is configured.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        let queue = match std::mem::replace(&mut self.state, SinkState::Terminated) {
            SinkState::Idle(queue) => queue,
            SinkState::Running(sink) => {
                self.state = SinkState::Running(sink);
                return Err(SupervisorError::AlreadyStarted);
            }
            SinkState::Terminated => return Err(SupervisorError::AlreadyTerminated),
        };

        let bound = match self.cfg.producer_socket.as_deref().map(relay::bind).transpose() {
            Ok(bound) => bound,
            Err(e) => {
                self.state = SinkState::Idle(queue);
                return Err(SupervisorError::Listen(e));
            }
        };

        let mut child = match self.spawn_sink() {
            Ok(child) => child,
            Err(e) => {
                if let Some(bound) = bound {
                    bound.discard();
                }
                self.state = SinkState::Idle(queue);
                return Err(e);
            }
        };
        let Some(stdin) = child.stdin.take() else {
            if let Some(bound) = bound {
                bound.discard();
            }
            self.state = SinkState::Idle(queue);
            return Err(SupervisorError::Spawn(io::Error::other(
                "sink stdin was not captured",
            )));
        };

        let token = CancellationToken::new();
        let forwarder = tokio::spawn(forwarder::forward(
            queue,
            stdin,
            self.cfg.sink.max_parcel_bytes,
            token.clone(),
        ));
        let relay = match bound {
            Some(bound) => match bound.serve(self.sender.clone(), token.clone()) {
                Ok(relay) => Some(relay),
                Err(e) => {
                    tracing::warn!(error = %e, "remote producers disabled");
                    None
                }
            },
            None => None,
        };

        tracing::info!(
            program = %self.cfg.sink_program.display(),
            pid = child.id(),
            "sink process started"
        );
        self.state = SinkState::Running(RunningSink {
            child,
            forwarder,
            relay,
            token,
        });
        Ok(())
    }

    /// Returns a new handle; `name` prefixes every record it sends (empty = none).
    ///
    /// Handles taken before [`start`](Self::start) queue their parcels until the
    /// sink is running.
    pub fn handle(&self, name: &str) -> ProducerHandle {
        ProducerHandle::new(self.sender.clone(), name)
    }

    /// Asks the sink to change the console and file thresholds.
    ///
    /// Takes effect once the sink processes the parcel; records queued earlier
    /// are filtered with the old thresholds.
    pub async fn set_level(&self, level: Level) -> Result<(), SendError> {
        self.sender.send(&Parcel::SetLevel { level }).await
    }

    /// Sends the shutdown sentinel and waits for the sink to exit.
    ///
    /// There is no timeout. The channel is closed afterwards whatever the
    /// outcome, so later sends fail with `ChannelClosed`.
    pub async fn shutdown(&mut self) -> Result<(), SupervisorError> {
        let mut sink = match std::mem::replace(&mut self.state, SinkState::Terminated) {
            SinkState::Running(sink) => sink,
            SinkState::Idle(queue) => {
                self.state = SinkState::Idle(queue);
                return Err(SupervisorError::NotStarted);
            }
            SinkState::Terminated => return Err(SupervisorError::AlreadyTerminated),
        };

        if let Err(e) = self.sender.send(&Parcel::Shutdown).await {
            tracing::warn!(error = %e, "shutdown not delivered, sink is already gone");
        }

        let waited = sink.child.wait().await;
        sink.token.cancel();
        if let Err(e) = sink.forwarder.await {
            tracing::warn!(error = %e, "forwarder task failed");
        }
        if let Some(relay) = sink.relay {
            relay.stop().await;
        }

        let status = waited.map_err(SupervisorError::Wait)?;
        if status.success() {
            tracing::info!(%status, "sink process exited");
            Ok(())
        } else {
            tracing::error!(%status, "sink process failed");
            Err(SupervisorError::SinkExited { status })
        }
    }

    /// Returns the sink's exit status if it has already exited, `None` while it runs.
    pub fn try_status(&mut self) -> Result<Option<ExitStatus>, SupervisorError> {
        match &mut self.state {
            SinkState::Running(sink) => sink.child.try_wait().map_err(SupervisorError::Wait),
            SinkState::Idle(_) => Err(SupervisorError::NotStarted),
            SinkState::Terminated => Err(SupervisorError::AlreadyTerminated),
        }
    }

    /// OS process id of the running sink.
    pub fn sink_pid(&self) -> Option<u32> {
        match &self.state {
            SinkState::Running(sink) => sink.child.id(),
            _ => None,
        }
    }

    /// Socket path remote producers connect to, when one is configured.
    ///
    /// Hand it to child processes in [`PRODUCER_SOCKET_ENV`](crate::PRODUCER_SOCKET_ENV).
    pub fn producer_socket(&self) -> Option<&Path> {
        self.cfg.producer_socket.as_deref()
    }

    fn spawn_sink(&self) -> Result<Child, SupervisorError> {
        let sink_config = self.cfg.sink.to_json()?;
        let console = self
            .cfg
            .console_output
            .stdio()
            .map_err(SupervisorError::Spawn)?;

        Command::new(&self.cfg.sink_program)
            .env(SINK_CONFIG_ENV, sink_config)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(console)
            .spawn()
            .map_err(SupervisorError::Spawn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SinkConfig;
    use crate::parcel::codec;
    use crate::transcript::{RotationPolicy, TranscriptConfig};

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let cfg = SupervisorConfig {
            sink: SinkConfig {
                transcript: Some(
                    TranscriptConfig::default().with_policy(RotationPolicy::ByLineCount { lines: 0 }),
                ),
                ..SinkConfig::default()
            },
            ..SupervisorConfig::default()
        };
        let err = Supervisor::new(cfg).err().unwrap();
        assert_eq!(err.as_label(), "config_zero_line_count");
    }

    #[tokio::test]
    async fn test_shutdown_before_start_is_refused() {
        let mut sup = Supervisor::new(SupervisorConfig::default()).unwrap();
        assert!(matches!(
            sup.shutdown().await,
            Err(SupervisorError::NotStarted)
        ));
        assert!(matches!(sup.try_status(), Err(SupervisorError::NotStarted)));
    }

    #[tokio::test]
    async fn test_missing_program_keeps_supervisor_idle() {
        let mut sup = Supervisor::new(SupervisorConfig::with_program(
            "/nonexistent/logvisor-sink-missing",
        ))
        .unwrap();
        assert!(matches!(sup.start(), Err(SupervisorError::Spawn(_))));
        assert!(sup.sink_pid().is_none());
        // Still idle: the queue survived and handles keep working.
        sup.handle("early").info("queued").await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_spawn_releases_producer_socket() {
        let tmp = tempfile::tempdir().unwrap();
        let socket = tmp.path().join("producers.sock");
        let cfg = SupervisorConfig::with_program("/nonexistent/logvisor-sink-missing")
            .with_producer_socket(&socket);
        let mut sup = Supervisor::new(cfg).unwrap();

        assert!(matches!(sup.start(), Err(SupervisorError::Spawn(_))));
        assert_eq!(sup.producer_socket(), Some(socket.as_path()));
        assert!(!socket.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_occupied_socket_path_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let socket = tmp.path().join("producers.sock");
        std::fs::write(&socket, b"").unwrap();
        let mut sup = Supervisor::new(
            SupervisorConfig::with_program("/nonexistent/logvisor-sink-missing")
                .with_producer_socket(&socket),
        )
        .unwrap();

        let err = sup.start().unwrap_err();
        assert_eq!(err.as_label(), "supervisor_listen");
        assert!(matches!(sup.try_status(), Err(SupervisorError::NotStarted)));
    }

    #[tokio::test]
    async fn test_handles_queue_before_start() {
        let mut sup = Supervisor::new(SupervisorConfig::default()).unwrap();
        sup.handle("a").info("one").await.unwrap();
        sup.set_level(Level::ERROR).await.unwrap();

        let SinkState::Idle(queue) = &mut sup.state else {
            panic!("supervisor should be idle");
        };
        let first = codec::decode(&queue.recv().await.unwrap()).unwrap();
        let second = codec::decode(&queue.recv().await.unwrap()).unwrap();
        assert_eq!(first, Parcel::record(Level::INFO, "a: one"));
        assert_eq!(second, Parcel::SetLevel { level: Level::ERROR });
    }
}
