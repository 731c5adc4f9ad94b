//! # Parcel: the unit exchanged over the channel.
//!
//! A [`Parcel`] is one of four kinds, matched exhaustively by the sink loop.
//!
//! ## Wire shape
//! ```text
//! {"kind":"record","level":20,"msg":"hello"}
//! {"kind":"transcript","msg":{"any":"json"}}
//! {"kind":"setlevel","level":30}
//! "shutdown"
//! ```
//! The shutdown sentinel is a bare string, not a structured record.
//!
//! ## Example
//! ```rust
//! use logvisor::{Level, Parcel};
//!
//! let p = Parcel::record(Level::INFO, "hello");
//! let json = serde_json::to_string(&p).unwrap();
//! assert_eq!(json, r#"{"kind":"record","level":20,"msg":"hello"}"#);
//!
//! let back: Parcel = serde_json::from_str(r#""shutdown""#).unwrap();
//! assert_eq!(back, Parcel::Shutdown);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::level::Level;

/// Message unit carried by the channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireParcel", into = "WireParcel")]
pub enum Parcel {
    /// A log line for the console/file handlers.
    Record {
        /// Severity.
        level: Level,
        /// Already attributed message text.
        message: String,
    },
    /// A structured entry for the transcript.
    Transcript {
        /// Arbitrary JSON value.
        payload: Value,
    },
    /// Change the threshold of every handler in the sink.
    SetLevel {
        /// New threshold.
        level: Level,
    },
    /// Stop the sink loop.
    Shutdown,
}

impl Parcel {
    /// Builds a [`Parcel::Record`].
    pub fn record(level: Level, message: impl Into<String>) -> Self {
        Parcel::Record {
            level,
            message: message.into(),
        }
    }

    /// Short kind name, matching the wire `kind` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Parcel::Record { .. } => "record",
            Parcel::Transcript { .. } => "transcript",
            Parcel::SetLevel { .. } => "setlevel",
            Parcel::Shutdown => "shutdown",
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireParcel {
    Sentinel(Sentinel),
    Tagged(Tagged),
}

#[derive(Serialize, Deserialize)]
enum Sentinel {
    #[serde(rename = "shutdown")]
    Shutdown,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Tagged {
    Record { level: Level, msg: String },
    Transcript { msg: Value },
    SetLevel { level: Level },
}

impl From<WireParcel> for Parcel {
    fn from(wire: WireParcel) -> Self {
        match wire {
            WireParcel::Sentinel(Sentinel::Shutdown) => Parcel::Shutdown,
            WireParcel::Tagged(Tagged::Record { level, msg }) => Parcel::Record {
                level,
                message: msg,
            },
            WireParcel::Tagged(Tagged::Transcript { msg }) => Parcel::Transcript { payload: msg },
            WireParcel::Tagged(Tagged::SetLevel { level }) => Parcel::SetLevel { level },
        }
    }
}

impl From<Parcel> for WireParcel {
    fn from(parcel: Parcel) -> Self {
        match parcel {
            Parcel::Shutdown => WireParcel::Sentinel(Sentinel::Shutdown),
            Parcel::Record { level, message } => {
                WireParcel::Tagged(Tagged::Record { level, msg: message })
            }
            Parcel::Transcript { payload } => WireParcel::Tagged(Tagged::Transcript { msg: payload }),
            Parcel::SetLevel { level } => WireParcel::Tagged(Tagged::SetLevel { level }),
        }
    }
}
