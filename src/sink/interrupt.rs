//! # Interrupt listener for the sink process.
//!
//! The sink must outlive a Ctrl-C in the terminal: the supervisor decides when
//! it stops. [`Interrupts`] installs a SIGINT listener (which replaces the
//! default "terminate" action) and yields once per received interrupt so the
//! sink loop can log and ignore it.
//!
//! **Unix platforms:** `SIGINT`.
//!
//! **Windows platforms:** `Ctrl-C` via [`tokio::signal::ctrl_c`].

use std::io;

/// Stream of interrupt notifications.
pub struct Interrupts {
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
}

impl Interrupts {
    /// Installs the listener. Must be called inside a tokio runtime.
    #[cfg(unix)]
    pub fn listen() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    /// Installs the listener. Must be called inside a tokio runtime.
    #[cfg(not(unix))]
    pub fn listen() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Waits for the next interrupt; `None` if the listener is gone.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> Option<()> {
        self.sigint.recv().await
    }

    /// Waits for the next interrupt; `None` if the listener is gone.
    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> Option<()> {
        tokio::signal::ctrl_c().await.ok()
    }
}
