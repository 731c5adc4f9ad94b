//! Runtime core: configuration and sink lifecycle.
//!
//! The public API of this module is [`Supervisor`] and the configuration
//! types. Internal modules:
//! - [`config`]: sink and supervisor settings, handed to the child as JSON;
//! - [`supervisor`]: spawns the sink, shuts it down, reports its status;
//! - [`forwarder`]: the single task writing queued frames into one stream;
//! - [`relay`]: accepts producers connecting from other processes.

pub mod config;
pub(crate) mod forwarder;
mod relay;
mod supervisor;

pub use config::{
    ConsoleOutput, DiagnosticsConfig, FileLogConfig, PRODUCER_SOCKET_ENV, SINK_CONFIG_ENV,
    SinkConfig, SupervisorConfig,
};
pub use supervisor::Supervisor;
