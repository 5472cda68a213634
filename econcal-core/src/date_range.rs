//! Inclusive range of calendar days for listing events.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::constants::DEFAULT_RANGE_DAYS;
use crate::error::{EconCalError, EconCalResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> EconCalResult<Self> {
        if start > end {
            return Err(EconCalError::Validation(format!(
                "Range start {start} is after range end {end}"
            )));
        }
        Ok(DateRange { start, end })
    }

    /// ±DEFAULT_RANGE_DAYS around `today`.
    pub fn around(today: NaiveDate) -> Self {
        let days = Days::new(DEFAULT_RANGE_DAYS.unsigned_abs());
        DateRange {
            start: today.checked_sub_days(days).unwrap_or(NaiveDate::MIN),
            end: today.checked_add_days(days).unwrap_or(NaiveDate::MAX),
        }
    }

    /// Build from optional YYYY-MM-DD bounds. With neither bound the range
    /// is centered on `today`; with one, the other is a full span away.
    pub fn from_args(from: Option<&str>, to: Option<&str>, today: NaiveDate) -> EconCalResult<Self> {
        let default = Self::around(today);
        let start = from.map(parse_date).transpose()?;
        let end = to.map(parse_date).transpose()?;
        let span = Days::new(2 * DEFAULT_RANGE_DAYS.unsigned_abs());

        let (start, end) = match (start, end) {
            (Some(s), Some(e)) => (s, e),
            (Some(s), None) => (s, s.checked_add_days(span).unwrap_or(NaiveDate::MAX)),
            (None, Some(e)) => (e.checked_sub_days(span).unwrap_or(NaiveDate::MIN), e),
            (None, None) => (default.start, default.end),
        };

        Self::new(start, end)
    }

    /// First instant of `start` in UTC.
    pub fn from_utc(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// Last representable instant of `end` in UTC, so every event the
    /// store would bucket under `end` falls inside `[from_utc, to_utc]`.
    pub fn to_utc(&self) -> DateTime<Utc> {
        let last_instant =
            NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN);
        self.end.and_time(last_instant).and_utc()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from_utc() && at <= self.to_utc()
    }

    /// The range read as local days in `tz`: first and last instant, in UTC.
    /// Midnights skipped by a DST change fall back to the UTC bounds.
    pub fn local_bounds(&self, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
        let first = tz
            .from_local_datetime(&self.start.and_time(NaiveTime::MIN))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| self.from_utc());

        let last = self
            .end
            .checked_add_days(Days::new(1))
            .and_then(|next| tz.from_local_datetime(&next.and_time(NaiveTime::MIN)).earliest())
            .and_then(|next_midnight| {
                next_midnight.with_timezone(&Utc).checked_sub_signed(TimeDelta::nanoseconds(1))
            })
            .unwrap_or_else(|| self.to_utc());

        (first, last)
    }

    /// UTC days touched by the local range in `tz`.
    pub fn utc_days(&self, tz: Tz) -> DateRange {
        let (first, last) = self.local_bounds(tz);
        DateRange {
            start: first.date_naive(),
            end: last.date_naive(),
        }
    }
}

/// Parse YYYY-MM-DD.
pub fn parse_date(s: &str) -> EconCalResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
        EconCalError::Validation(format!("Invalid date format '{s}'. Expected YYYY-MM-DD"))
    })
}
