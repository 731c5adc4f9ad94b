//! Parcels and the channel that carries them into the sink.
//!
//! This module groups the wire **data model** and the **channel** used by
//! producers and the supervisor to reach the sink process.
//!
//! ## Contents
//! - [`Level`] integer severity with the usual named constants
//! - [`Parcel`] closed set of message kinds (record, transcript, set-level, shutdown)
//! - [`channel`] bounded multi-producer queue ([`ParcelSender`] / [`ParcelQueue`])
//! - [`codec`] length-delimited JSON framing shared by both ends of the pipe
//!
//! ## Quick reference
//! - **Writers**: `ProducerHandle` (records, transcript entries), `Supervisor`
//!   (set-level, shutdown).
//! - **Reader**: the forwarder task drains [`ParcelQueue`] into the sink's stdin;
//!   `SinkLoop` decodes frames on the other side.

mod channel;
pub mod codec;
mod level;
#[allow(clippy::module_inception)]
mod parcel;

pub use channel::{ParcelQueue, ParcelSender, channel};
pub use level::Level;
pub use parcel::Parcel;
