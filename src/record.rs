use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PnlError, PnlResult};

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// One closed-pnl row as the exchange returns it. Fields stay loosely typed until
/// [`TradeNormalizer::normalize`] checks them; the exchange sends numbers as strings
/// but plain JSON numbers are accepted too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawClosedPnl {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub closed_pnl: Option<Value>,
    #[serde(default)]
    pub created_time: Option<Value>,
    #[serde(default)]
    pub updated_time: Option<Value>,
}

impl RawClosedPnl {
    pub fn new(symbol: &str, closed_pnl: &str, created_time: i64, updated_time: i64) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            closed_pnl: Some(Value::String(closed_pnl.to_string())),
            created_time: Some(Value::String(created_time.to_string())),
            updated_time: Some(Value::String(updated_time.to_string())),
        }
    }
}

/// A validated closed trade. Opening and closing times are kept both as epoch
/// milliseconds and as wall-clock time in the normalizer's zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: String,
    pub pnl: Decimal,
    pub opened_at_ms: i64,
    pub closed_at_ms: i64,
    pub opened_local: NaiveDateTime,
    pub closed_local: NaiveDateTime,
    pub duration_minutes: f64,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.pnl > Decimal::ZERO
    }

    /// Local hour of the opening time, 0..=23.
    pub fn open_hour(&self) -> usize {
        self.opened_local.hour() as usize
    }

    /// Local weekday of the opening time, 0 = Monday .. 6 = Sunday.
    pub fn open_weekday(&self) -> usize {
        self.opened_local.weekday().num_days_from_monday() as usize
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required_text(value: Option<&Value>, label: &str) -> PnlResult<String> {
    let text = value
        .and_then(value_to_string)
        .ok_or_else(|| PnlError::malformed(format!("missing {label}")))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PnlError::malformed(format!("empty {label}")));
    }
    Ok(trimmed.to_string())
}

fn parse_decimal(value: Option<&Value>, label: &str) -> PnlResult<Decimal> {
    let text = required_text(value, label)?;
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| PnlError::malformed(format!("invalid decimal for {label}: {text}")))
}

fn parse_millis(value: Option<&Value>, label: &str) -> PnlResult<i64> {
    let text = required_text(value, label)?;
    text.parse::<i64>()
        .map_err(|_| PnlError::malformed(format!("invalid timestamp for {label}: {text}")))
}

fn millis_to_utc(ts_ms: i64, label: &str) -> PnlResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ts_ms)
        .single()
        .ok_or_else(|| PnlError::malformed(format!("{label} out of range: {ts_ms}")))
}

/// Turns raw rows into [`ClosedTrade`] values, projecting timestamps into `tz`.
#[derive(Debug, Clone)]
pub struct TradeNormalizer<Tz: TimeZone> {
    tz: Tz,
}

impl<Tz: TimeZone> TradeNormalizer<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Rejects missing or non-numeric fields and trades that close before they open.
    pub fn normalize(&self, raw: &RawClosedPnl) -> PnlResult<ClosedTrade> {
        let symbol = raw
            .symbol
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PnlError::malformed("missing symbol"))?
            .to_string();
        let pnl = parse_decimal(raw.closed_pnl.as_ref(), "closedPnl")?;
        let opened_at_ms = parse_millis(raw.created_time.as_ref(), "createdTime")?;
        let closed_at_ms = parse_millis(raw.updated_time.as_ref(), "updatedTime")?;

        if closed_at_ms < opened_at_ms {
            return Err(PnlError::malformed(format!(
                "{symbol} closed at {closed_at_ms} before it opened at {opened_at_ms}"
            )));
        }

        let opened_local = millis_to_utc(opened_at_ms, "createdTime")?
            .with_timezone(&self.tz)
            .naive_local();
        let closed_local = millis_to_utc(closed_at_ms, "updatedTime")?
            .with_timezone(&self.tz)
            .naive_local();

        Ok(ClosedTrade {
            symbol,
            pnl,
            opened_at_ms,
            closed_at_ms,
            opened_local,
            closed_local,
            duration_minutes: (closed_at_ms - opened_at_ms) as f64 / MILLIS_PER_MINUTE,
        })
    }
}
