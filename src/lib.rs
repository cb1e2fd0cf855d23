//! Closed-trade pnl reports over arbitrary date ranges.
//!
//! A date range is split into windows the exchange accepts, every page of closed-pnl
//! rows in each window is read through a [`PageFetcher`], and the normalized trades are
//! folded once into a [`PnlReport`] from which [`FinalizedViews`] are derived.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod fetch;
pub mod finalize;
pub mod pipeline;
pub mod record;
pub mod window;

#[cfg(feature = "python")]
mod python;

pub use aggregate::{aggregate, aggregate_trades, PnlAggregator, PnlReport, SymbolPnl, TradeLogEntry};
pub use config::{ReportConfig, MAX_PAGE_LIMIT, MAX_WINDOW_SPAN_MS};
pub use error::{PageFetchError, PnlError, PnlResult};
pub use fetch::{ClosedPnlPage, ClosedPnlResponse, PageFetcher, PageRequest, TradeStream};
pub use finalize::{finalize, EquityPoint, FinalizedViews, HourPnl, ProfitSplit, WeekdayPnl};
pub use pipeline::{PnlSummary, ReportPipeline};
pub use record::{ClosedTrade, RawClosedPnl, TradeNormalizer};
pub use window::{plan_windows, DateRange, TimeWindow};
