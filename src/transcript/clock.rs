//! Wall-clock source for the sink.
//!
//! Timestamps are local naive time, rendered in ISO 8601 with microseconds
//! only when they are non-zero (`2024-05-01T13:02:11.004211`,
//! `2024-05-02T00:00:00`).

use std::sync::Arc;

use chrono::{Local, NaiveDateTime, Timelike};

/// Source of "now" for handlers and transcript rotation.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> NaiveDateTime;
}

/// Shared clock handle passed to every component of one sink.
pub type SharedClock = Arc<dyn Clock>;

/// The system's local clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Formats a timestamp in ISO 8601, dropping a zero fraction.
pub fn isoformat(at: &NaiveDateTime) -> String {
    if at.nanosecond() / 1_000 == 0 {
        at.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_isoformat_whole_seconds() {
        let at = NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(isoformat(&at), "2024-05-02T00:00:00");
    }

    #[test]
    fn test_isoformat_micros() {
        let at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_micro_opt(13, 2, 11, 4_211)
            .unwrap();
        assert_eq!(isoformat(&at), "2024-05-01T13:02:11.004211");
    }
}
