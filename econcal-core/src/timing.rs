//! NOW / NEXT / PAST classification of an event against the current instant.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTiming {
    Past,
    Now,
    Next,
}

impl EventTiming {
    /// `Now` from the release instant until `now_window` has passed,
    /// `Past` afterwards, `Next` before it.
    pub fn classify(event_at: DateTime<Utc>, now: DateTime<Utc>, now_window: Duration) -> Self {
        let window = TimeDelta::from_std(now_window).unwrap_or(TimeDelta::MAX);
        let window_end = event_at.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC);

        if now < event_at {
            EventTiming::Next
        } else if now < window_end {
            EventTiming::Now
        } else {
            EventTiming::Past
        }
    }
}

impl fmt::Display for EventTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTiming::Past => write!(f, "PAST"),
            EventTiming::Now => write!(f, "NOW"),
            EventTiming::Next => write!(f, "NEXT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_classify_boundaries() {
        let release = Utc.with_ymd_and_hms(2026, 1, 10, 13, 30, 0).unwrap();
        let window = Duration::from_secs(300);
        let at = |m, s| Utc.with_ymd_and_hms(2026, 1, 10, 13, m, s).unwrap();

        assert_eq!(EventTiming::classify(release, at(29, 59), window), EventTiming::Next);
        assert_eq!(EventTiming::classify(release, at(30, 0), window), EventTiming::Now);
        assert_eq!(EventTiming::classify(release, at(34, 59), window), EventTiming::Now);
        assert_eq!(EventTiming::classify(release, at(35, 0), window), EventTiming::Past);
    }
}
