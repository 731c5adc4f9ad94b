//! Sink process spawned by [`logvisor::Supervisor`].
//!
//! Reads length-delimited parcels from stdin, writes console lines to stderr
//! and exits when the shutdown parcel arrives. Settings come from the
//! `LOGVISOR_SINK_CONFIG` environment variable.
//!
//! Diagnostics of the sink itself go to stderr next to the console lines,
//! or to `diagnostics.path` when it is set. Their filter is
//! `diagnostics.filter` (default `warn`), overridden by `RUST_LOG`.

use std::fs::OpenOptions;
use std::io::{IsTerminal, stderr};
use std::process::ExitCode;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use logvisor::{DiagnosticsConfig, SinkConfig};

fn main() -> ExitCode {
    let cfg = match SinkConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("CRITICAL::invalid sink configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_diagnostics(&cfg.diagnostics);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("CRITICAL::failed to start sink runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(logvisor::serve_stdin(&cfg));
    // The stdin reader may still be parked in a blocking read; don't wait for it.
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(kind = e.as_label(), "sink exiting with failure");
            ExitCode::FAILURE
        }
    }
}

fn init_diagnostics(cfg: &DiagnosticsConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file = cfg.path.as_ref().and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                eprintln!(
                    "WARNING::diagnostics file {} not opened, using stderr: {e}",
                    path.display()
                )
            })
            .ok()
    });
    let (writer, ansi) = match file {
        Some(file) => (BoxMakeWriter::new(Mutex::new(file)), false),
        None => (BoxMakeWriter::new(stderr), stderr().is_terminal()),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(ansi)
                .with_writer(writer),
        )
        .with(filter)
        .init();
}
