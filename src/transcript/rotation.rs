//! # Rotation policy for transcripts.
//!
//! [`RotationPolicy`] decides when a transcript closes its file and opens a
//! new one:
//! - [`RotationPolicy::ByElapsedTime`] after a fixed interval from window start;
//! - [`RotationPolicy::ByCalendarDay`] after 24h from local midnight of the window day;
//! - [`RotationPolicy::ByLineCount`] once the line counter reaches `lines`.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use logvisor::RotationPolicy;
//!
//! let p = RotationPolicy::parse("time", 1000, "01:30:00").unwrap();
//! assert_eq!(p, RotationPolicy::ByElapsedTime { every: Duration::from_secs(5400) });
//!
//! assert!(RotationPolicy::parse("weekly", 1000, "01:00:00").is_err());
//! ```

use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Transcript rotation rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "on", rename_all = "snake_case")]
pub enum RotationPolicy {
    /// New file once `every` has elapsed since the window started.
    ByElapsedTime {
        /// Window length.
        every: Duration,
    },
    /// New file every 24h, windows aligned to local midnight.
    ByCalendarDay,
    /// New file once the line counter reaches `lines`.
    ByLineCount {
        /// Lines per file.
        lines: u64,
    },
}

impl Default for RotationPolicy {
    fn default() -> Self {
        RotationPolicy::ByCalendarDay
    }
}

impl RotationPolicy {
    /// Builds a policy from its textual form.
    ///
    /// - `new_file_on`: `"time"`, `"day"` or `"lines"`;
    /// - `lines_per_log`: used by `"lines"`;
    /// - `time_per_log`: `HH:MM:SS`, used by `"time"` (hours may exceed 24).
    pub fn parse(
        new_file_on: &str,
        lines_per_log: u64,
        time_per_log: &str,
    ) -> Result<Self, ConfigError> {
        let policy = match new_file_on {
            "day" => RotationPolicy::ByCalendarDay,
            "lines" => RotationPolicy::ByLineCount {
                lines: lines_per_log,
            },
            "time" => RotationPolicy::ByElapsedTime {
                every: parse_interval(time_per_log)?,
            },
            other => return Err(ConfigError::UnknownRotationPolicy(other.to_string())),
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Rejects policies that would rotate on every entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            RotationPolicy::ByLineCount { lines: 0 } => Err(ConfigError::ZeroLineCount),
            RotationPolicy::ByElapsedTime { every } if every.is_zero() => {
                Err(ConfigError::InvalidInterval(format!("{every:?}")))
            }
            _ => Ok(()),
        }
    }

    /// Window length for the time-based policies.
    pub fn interval(&self) -> Option<Duration> {
        match self {
            RotationPolicy::ByElapsedTime { every } => Some(*every),
            RotationPolicy::ByCalendarDay => Some(DAY),
            RotationPolicy::ByLineCount { .. } => None,
        }
    }

    /// Start of a window opened at `now`.
    pub fn window_start(&self, now: NaiveDateTime) -> NaiveDateTime {
        match self {
            RotationPolicy::ByCalendarDay => now.date().and_time(NaiveTime::MIN),
            _ => now,
        }
    }

    /// Whether the entry numbered `line` (1-based) written at `now` crosses the boundary.
    pub fn should_rotate(&self, line: u64, window_start: NaiveDateTime, now: NaiveDateTime) -> bool {
        match self {
            RotationPolicy::ByLineCount { lines } => line >= *lines,
            _ => {
                let Some(interval) = self.interval() else {
                    return false;
                };
                // A clock that stepped backwards counts as no time elapsed.
                (now - window_start)
                    .to_std()
                    .map(|elapsed| elapsed >= interval)
                    .unwrap_or(false)
            }
        }
    }
}

fn parse_interval(text: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidInterval(text.to_string());
    let parts: Vec<&str> = text.split(':').collect();
    let [h, m, s] = parts.as_slice() else {
        return Err(invalid());
    };
    let h: u64 = h.trim().parse().map_err(|_| invalid())?;
    let m: u64 = m.trim().parse().map_err(|_| invalid())?;
    let s: u64 = s.trim().parse().map_err(|_| invalid())?;
    let total = h
        .checked_mul(3600)
        .and_then(|v| v.checked_add(m.checked_mul(60)?))
        .and_then(|v| v.checked_add(s))
        .ok_or_else(invalid)?;
    if total == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_parse_known_names() {
        assert_eq!(
            RotationPolicy::parse("day", 0, "").unwrap(),
            RotationPolicy::ByCalendarDay
        );
        assert_eq!(
            RotationPolicy::parse("lines", 100, "").unwrap(),
            RotationPolicy::ByLineCount { lines: 100 }
        );
        assert_eq!(
            RotationPolicy::parse("time", 0, "24:00:00").unwrap(),
            RotationPolicy::ByElapsedTime { every: DAY }
        );
    }

    #[test]
    fn test_parse_unknown_name_fails_immediately() {
        let err = RotationPolicy::parse("hourly", 10, "01:00:00").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRotationPolicy(ref n) if n == "hourly"));
    }

    #[test]
    fn test_parse_bad_interval() {
        for text in ["1:00", "aa:00:00", "00:00:00", ""] {
            assert!(
                matches!(
                    RotationPolicy::parse("time", 0, text),
                    Err(ConfigError::InvalidInterval(_))
                ),
                "{text:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_zero_lines_rejected() {
        assert!(matches!(
            RotationPolicy::parse("lines", 0, ""),
            Err(ConfigError::ZeroLineCount)
        ));
    }

    #[test]
    fn test_day_window_starts_at_midnight() {
        assert_eq!(
            RotationPolicy::ByCalendarDay.window_start(at(17, 45, 3)),
            at(0, 0, 0)
        );
        let p = RotationPolicy::ByElapsedTime {
            every: Duration::from_secs(60),
        };
        assert_eq!(p.window_start(at(17, 45, 3)), at(17, 45, 3));
    }

    #[test]
    fn test_elapsed_boundary_is_inclusive() {
        let p = RotationPolicy::ByElapsedTime {
            every: Duration::from_secs(60),
        };
        assert!(!p.should_rotate(1, at(10, 0, 0), at(10, 0, 59)));
        assert!(p.should_rotate(1, at(10, 0, 0), at(10, 1, 0)));
    }

    #[test]
    fn test_clock_going_backwards_never_rotates() {
        let p = RotationPolicy::ByElapsedTime {
            every: Duration::from_secs(1),
        };
        assert!(!p.should_rotate(1, at(10, 0, 0), at(9, 0, 0)));
    }

    #[test]
    fn test_line_count_boundary() {
        let p = RotationPolicy::ByLineCount { lines: 3 };
        assert!(!p.should_rotate(2, at(0, 0, 0), at(0, 0, 0)));
        assert!(p.should_rotate(3, at(0, 0, 0), at(0, 0, 0)));
    }
}
