//! # Integer severity levels.
//!
//! [`Level`] is a plain integer so producers may use any severity they like;
//! the named constants follow the conventional 10-step ladder. Handlers pass a
//! record when `record.level >= handler.threshold`.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Integer log severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Level(pub u8);

impl Level {
    pub const DEBUG: Level = Level(10);
    pub const INFO: Level = Level(20);
    pub const WARNING: Level = Level(30);
    pub const ERROR: Level = Level(40);
    pub const CRITICAL: Level = Level(50);
    /// Used by the sink for level-change notices so they pass any threshold.
    pub const ANNOUNCE: Level = Level(100);

    /// Returns the display name used in console and file lines.
    ///
    /// Unnamed severities render as `Level {n}`.
    pub fn name(&self) -> Cow<'static, str> {
        match *self {
            Level::DEBUG => Cow::Borrowed("DEBUG"),
            Level::INFO => Cow::Borrowed("INFO"),
            Level::WARNING => Cow::Borrowed("WARNING"),
            Level::ERROR => Cow::Borrowed("ERROR"),
            Level::CRITICAL => Cow::Borrowed("CRITICAL"),
            Level(n) => Cow::Owned(format!("Level {n}")),
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::INFO
    }
}

impl From<u8> for Level {
    fn from(value: u8) -> Self {
        Level(value)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_levels() {
        assert_eq!(Level::WARNING.name(), "WARNING");
        assert_eq!(Level::CRITICAL.to_string(), "CRITICAL");
    }

    #[test]
    fn test_unnamed_level() {
        assert_eq!(Level(25).name(), "Level 25");
        assert_eq!(Level::ANNOUNCE.to_string(), "Level 100");
    }

    #[test]
    fn test_ordering_matches_severity() {
        assert!(Level::DEBUG < Level::INFO);
        assert!(Level(25) > Level::INFO && Level(25) < Level::WARNING);
    }
}
