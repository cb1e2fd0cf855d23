use std::fmt;

use chrono::{Duration, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::{PnlError, PnlResult};

const DATE_FORMAT: &str = "%Y-%m-%d";
const MINUTES_PER_DAY: i64 = 24 * 60;

/// Half-open `[start_ms, end_ms)` query interval in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeWindow {
    pub fn span_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    pub fn contains(&self, ts_ms: i64) -> bool {
        self.start_ms <= ts_ms && ts_ms < self.end_ms
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start_ms, self.end_ms)
    }
}

/// Splits `[start_ms, end_ms)` into ascending, contiguous windows no longer than `max_span_ms`.
///
/// An empty or inverted range yields no windows. The last window is shortened to end
/// exactly at `end_ms`.
pub fn plan_windows(start_ms: i64, end_ms: i64, max_span_ms: i64) -> PnlResult<Vec<TimeWindow>> {
    if max_span_ms <= 0 {
        return Err(PnlError::InvalidConfig(format!(
            "window span must be positive, got {max_span_ms}"
        )));
    }
    if start_ms >= end_ms {
        return Ok(Vec::new());
    }

    let count = end_ms.saturating_sub(start_ms) / max_span_ms + 1;
    let mut windows = Vec::with_capacity(count.min(4096) as usize);
    let mut cursor = start_ms;
    while cursor < end_ms {
        let next = cursor.saturating_add(max_span_ms).min(end_ms);
        windows.push(TimeWindow {
            start_ms: cursor,
            end_ms: next,
        });
        cursor = next;
    }
    Ok(windows)
}

/// Calendar-day range as entered by the user. `end` is exclusive: the query stops at its
/// local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> PnlResult<Self> {
        if end < start {
            return Err(PnlError::InvalidRange(format!(
                "end date {end} is before start date {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parses two `YYYY-MM-DD` strings. Both are required.
    pub fn parse(start: &str, end: &str) -> PnlResult<Self> {
        let start = parse_date(start, "start")?;
        let end = parse_date(end, "end")?;
        Self::new(start, end)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Local midnight of both dates, as epoch milliseconds.
    pub fn to_epoch_millis<Tz: TimeZone>(&self, tz: &Tz) -> PnlResult<(i64, i64)> {
        Ok((local_midnight_ms(self.start, tz)?, local_midnight_ms(self.end, tz)?))
    }
}

fn parse_date(text: &str, label: &str) -> PnlResult<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PnlError::InvalidRange(format!("{label} date is required")));
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|_| {
        PnlError::InvalidRange(format!(
            "{label} date {trimmed:?} is not in YYYY-MM-DD format"
        ))
    })
}

fn local_midnight_ms<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> PnlResult<i64> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| PnlError::InvalidRange(format!("no midnight for {date}")))?;
    // a midnight skipped by a clock change resolves to the first local minute after the gap
    (0..=MINUTES_PER_DAY)
        .filter_map(|minute| midnight.checked_add_signed(Duration::minutes(minute)))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| PnlError::InvalidRange(format!("no local time exists on {date}")))
}
