use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PnlError, PnlResult};
use crate::record::ClosedTrade;

const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Per-trade row kept in arrival order, used for duration rankings and the equity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub symbol: String,
    pub duration_minutes: f64,
    pub pnl: Decimal,
    pub opened_at_ms: i64,
    /// Local opening time, `YYYY-MM-DD HH:MM`
    pub entry_time: String,
    pub exit_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolPnl {
    pub symbol: String,
    pub pnl: Decimal,
}

/// Running totals for one report run.
///
/// `pnl_by_symbol` is kept in first-seen order. The hour and weekday buckets are fixed
/// arrays (hour 0..=23, weekday 0 = Monday .. 6 = Sunday) so empty buckets read as zero.
/// Winners are trades with `pnl > 0`; everything else, break-even included, counts as lost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PnlReport {
    pub total_pnl: Decimal,
    pub positive_sum: Decimal,
    pub negative_sum: Decimal,
    pub won_count: u64,
    pub lost_count: u64,
    pub symbols_seen: BTreeSet<String>,
    pub pnl_by_symbol: Vec<SymbolPnl>,
    pub pnl_by_hour: [Decimal; 24],
    pub pnl_by_weekday: [Decimal; 7],
    pub trade_log: Vec<TradeLogEntry>,
}

impl PnlReport {
    pub fn trade_count(&self) -> u64 {
        self.won_count + self.lost_count
    }

    pub fn is_empty(&self) -> bool {
        self.trade_count() == 0
    }

    /// Share of winning trades, `None` when nothing was traded.
    pub fn win_rate(&self) -> Option<f64> {
        let total = self.trade_count();
        if total == 0 {
            None
        } else {
            Some(self.won_count as f64 / total as f64)
        }
    }

    pub fn symbol_pnl(&self, symbol: &str) -> Option<Decimal> {
        self.pnl_by_symbol
            .iter()
            .find(|entry| entry.symbol == symbol)
            .map(|entry| entry.pnl)
    }
}

pub(crate) fn add_pnl(sum: &mut Decimal, pnl: Decimal, label: &str) -> PnlResult<()> {
    match sum.checked_add(pnl) {
        Some(next) => {
            *sum = next;
            Ok(())
        }
        None => Err(PnlError::Overflow(format!("{label} {sum} + {pnl}"))),
    }
}

/// Single-pass fold of closed trades into a [`PnlReport`]. Each aggregator owns its report.
#[derive(Debug, Default)]
pub struct PnlAggregator {
    report: PnlReport,
    symbol_index: HashMap<String, usize>,
}

impl PnlAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one trade. Fails with [`PnlError::Overflow`] when a sum would leave the
    /// `Decimal` range; the report is unusable afterwards.
    pub fn push(&mut self, trade: &ClosedTrade) -> PnlResult<()> {
        let report = &mut self.report;
        let pnl = trade.pnl;

        add_pnl(&mut report.total_pnl, pnl, "total")?;
        if pnl > Decimal::ZERO {
            add_pnl(&mut report.positive_sum, pnl, "positive sum")?;
            report.won_count += 1;
        } else {
            add_pnl(&mut report.negative_sum, pnl, "negative sum")?;
            report.lost_count += 1;
        }

        report.symbols_seen.insert(trade.symbol.clone());
        match self.symbol_index.get(&trade.symbol) {
            Some(&slot) => add_pnl(&mut report.pnl_by_symbol[slot].pnl, pnl, &trade.symbol)?,
            None => {
                self.symbol_index
                    .insert(trade.symbol.clone(), report.pnl_by_symbol.len());
                report.pnl_by_symbol.push(SymbolPnl {
                    symbol: trade.symbol.clone(),
                    pnl,
                });
            }
        }

        add_pnl(&mut report.pnl_by_hour[trade.open_hour()], pnl, "hour bucket")?;
        add_pnl(&mut report.pnl_by_weekday[trade.open_weekday()], pnl, "weekday bucket")?;

        report.trade_log.push(TradeLogEntry {
            symbol: trade.symbol.clone(),
            duration_minutes: trade.duration_minutes,
            pnl,
            opened_at_ms: trade.opened_at_ms,
            entry_time: trade.opened_local.format(DISPLAY_TIME_FORMAT).to_string(),
            exit_time: trade.closed_local.format(DISPLAY_TIME_FORMAT).to_string(),
        });
        Ok(())
    }

    pub fn finish(self) -> PnlReport {
        self.report
    }
}

/// Folds a fallible trade sequence. The first error aborts the fold and the partial
/// report is dropped.
pub fn aggregate<I>(trades: I) -> PnlResult<PnlReport>
where
    I: IntoIterator<Item = PnlResult<ClosedTrade>>,
{
    let mut aggregator = PnlAggregator::new();
    for trade in trades {
        aggregator.push(&trade?)?;
    }
    Ok(aggregator.finish())
}

/// Folds trades that are already validated, e.g. an in-memory fixture.
pub fn aggregate_trades<'a, I>(trades: I) -> PnlResult<PnlReport>
where
    I: IntoIterator<Item = &'a ClosedTrade>,
{
    let mut aggregator = PnlAggregator::new();
    for trade in trades {
        aggregator.push(trade)?;
    }
    Ok(aggregator.finish())
}
