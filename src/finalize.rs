use chrono::Weekday;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::{add_pnl, PnlReport, SymbolPnl, TradeLogEntry};
use crate::config::ReportConfig;
use crate::error::PnlResult;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// One step of the equity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub opened_at_ms: i64,
    pub entry_time: String,
    pub pnl: Decimal,
    pub cumulative_pnl: Decimal,
}

/// Gains against losses, both as non-negative amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitSplit {
    pub gains: Decimal,
    pub losses: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourPnl {
    pub hour: u32,
    pub pnl: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayPnl {
    pub weekday: Weekday,
    pub pnl: Decimal,
}

/// Presentation-ready views derived from a finished [`PnlReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedViews {
    pub cumulative_series: Vec<EquityPoint>,
    pub top_profitable_symbols: Vec<SymbolPnl>,
    pub longest_trades: Vec<TradeLogEntry>,
    pub fastest_trades: Vec<TradeLogEntry>,
    pub symbol_pnl: Vec<SymbolPnl>,
    pub profit_split: ProfitSplit,
    pub hourly_pnl: Vec<HourPnl>,
    pub weekday_pnl: Vec<WeekdayPnl>,
}

/// Builds the derived views. All orderings use stable sorts, so ties keep the order in
/// which trades and symbols were first seen.
pub fn finalize(report: &PnlReport, config: &ReportConfig) -> PnlResult<FinalizedViews> {
    let (longest_trades, fastest_trades) = duration_rankings(&report.trade_log, config.top_trades);

    Ok(FinalizedViews {
        cumulative_series: cumulative_series(&report.trade_log)?,
        top_profitable_symbols: top_profitable_symbols(&report.pnl_by_symbol, config.top_symbols),
        longest_trades,
        fastest_trades,
        symbol_pnl: report.pnl_by_symbol.clone(),
        profit_split: ProfitSplit {
            gains: report.positive_sum,
            losses: report.negative_sum.abs(),
        },
        hourly_pnl: report
            .pnl_by_hour
            .iter()
            .zip(0u32..)
            .map(|(pnl, hour)| HourPnl { hour, pnl: *pnl })
            .collect(),
        weekday_pnl: report
            .pnl_by_weekday
            .iter()
            .zip(WEEKDAYS)
            .map(|(pnl, weekday)| WeekdayPnl { weekday, pnl: *pnl })
            .collect(),
    })
}

/// Running pnl over trades ordered by opening time. A prefix can overflow even when the
/// final total fits, so each step is checked.
pub fn cumulative_series(trade_log: &[TradeLogEntry]) -> PnlResult<Vec<EquityPoint>> {
    let mut ordered: Vec<&TradeLogEntry> = trade_log.iter().collect();
    ordered.sort_by_key(|entry| entry.opened_at_ms);

    let mut running = Decimal::ZERO;
    ordered
        .into_iter()
        .map(|entry| {
            add_pnl(&mut running, entry.pnl, "cumulative pnl")?;
            Ok(EquityPoint {
                opened_at_ms: entry.opened_at_ms,
                entry_time: entry.entry_time.clone(),
                pnl: entry.pnl,
                cumulative_pnl: running,
            })
        })
        .collect()
}

pub fn top_profitable_symbols(pnl_by_symbol: &[SymbolPnl], limit: usize) -> Vec<SymbolPnl> {
    let mut winners: Vec<SymbolPnl> = pnl_by_symbol
        .iter()
        .filter(|entry| entry.pnl > Decimal::ZERO)
        .cloned()
        .collect();
    winners.sort_by(|a, b| b.pnl.cmp(&a.pnl));
    winners.truncate(limit);
    winners
}

/// Longest and fastest trades, each capped to `limit`.
pub fn duration_rankings(
    trade_log: &[TradeLogEntry],
    limit: usize,
) -> (Vec<TradeLogEntry>, Vec<TradeLogEntry>) {
    let mut longest = trade_log.to_vec();
    longest.sort_by(|a, b| b.duration_minutes.total_cmp(&a.duration_minutes));
    longest.truncate(limit);

    let mut fastest = trade_log.to_vec();
    fastest.sort_by(|a, b| a.duration_minutes.total_cmp(&b.duration_minutes));
    fastest.truncate(limit);

    (longest, fastest)
}
