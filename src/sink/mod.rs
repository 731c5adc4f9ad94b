//! The sink process: everything that runs on the far side of the pipe.
//!
//! - [`SinkLoop`] reads parcels and owns every output;
//! - [`LogHandler`] one level-filtered line writer (console or file);
//! - [`Interrupts`] SIGINT / Ctrl-C listener, so a terminal interrupt does not
//!   take the sink down before the supervisor asks it to stop.

mod handler;
mod interrupt;
mod sink_loop;

use std::io;
use std::sync::Arc;

pub use handler::LogHandler;
pub use interrupt::Interrupts;
pub use sink_loop::SinkLoop;

use crate::core::config::SinkConfig;
use crate::error::SinkError;
use crate::transcript::LocalClock;

/// Runs the sink loop over the process stdin, with the console on a buffered
/// stderr flushed at the configured cadence.
///
/// Must be called inside a tokio runtime. Returns when `Shutdown` arrives or
/// on the first fatal error (already logged to the console by then).
pub async fn serve_stdin(cfg: &SinkConfig) -> Result<(), SinkError> {
    let sink = SinkLoop::new(
        tokio::io::stdin(),
        cfg,
        Box::new(io::BufWriter::new(io::stderr())),
        Arc::new(LocalClock),
    );
    let sink = match Interrupts::listen() {
        Ok(interrupts) => sink.with_interrupts(interrupts),
        Err(e) => {
            tracing::warn!(error = %e, "interrupt listener not installed");
            sink
        }
    };
    sink.run().await
}
