use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::{aggregate, PnlReport};
use crate::config::ReportConfig;
use crate::error::{PnlError, PnlResult};
use crate::fetch::{PageFetcher, TradeStream};
use crate::finalize::{finalize, FinalizedViews};
use crate::record::{RawClosedPnl, TradeNormalizer};
use crate::window::{plan_windows, DateRange, TimeWindow};

/// A finished run: the totals plus their derived views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlSummary {
    pub report: PnlReport,
    pub views: FinalizedViews,
    pub windows: usize,
    pub pages: usize,
}

/// Plans windows for a date range, walks every page through the fetcher and folds the
/// trades. A run either returns a complete summary or an error, never partial totals.
#[derive(Debug, Clone)]
pub struct ReportPipeline<Tz: TimeZone> {
    config: ReportConfig,
    tz: Tz,
}

impl ReportPipeline<Local> {
    pub fn local(config: ReportConfig) -> PnlResult<Self> {
        Self::new(config, Local)
    }
}

impl<Tz: TimeZone> ReportPipeline<Tz> {
    pub fn new(config: ReportConfig, tz: Tz) -> PnlResult<Self> {
        config.validate()?;
        Ok(Self { config, tz })
    }

    pub fn plan(&self, range: &DateRange) -> PnlResult<Vec<TimeWindow>> {
        let (start_ms, end_ms) = range.to_epoch_millis(&self.tz)?;
        plan_windows(start_ms, end_ms, self.config.max_window_span_ms)
    }

    /// Parses the two dates and runs the whole range.
    pub fn run<F: PageFetcher>(
        &self,
        fetcher: &mut F,
        start_date: &str,
        end_date: &str,
    ) -> PnlResult<PnlSummary> {
        let range = DateRange::parse(start_date, end_date)?;
        self.run_range(fetcher, &range)
    }

    pub fn run_range<F: PageFetcher>(
        &self,
        fetcher: &mut F,
        range: &DateRange,
    ) -> PnlResult<PnlSummary> {
        let windows = self.plan(range)?;
        let window_count = windows.len();
        info!(
            start = %range.start,
            end = %range.end,
            windows = window_count,
            "building closed pnl report"
        );

        let mut stream = TradeStream::new(
            fetcher,
            TradeNormalizer::new(self.tz.clone()),
            windows,
            &self.config,
        );
        let report = aggregate(stream.by_ref());
        let pages = stream.pages_fetched();

        report
            .and_then(|report| self.summarise(report, window_count, pages))
            .map_err(aborted)
    }

    /// Folds records that were fetched elsewhere, e.g. handed over by a host process.
    pub fn summarise_records(&self, records: &[RawClosedPnl]) -> PnlResult<PnlSummary> {
        let normalizer = TradeNormalizer::new(self.tz.clone());
        let trades = records.iter().enumerate().map(|(index, raw)| {
            normalizer
                .normalize(raw)
                .map_err(|err| err.located(None, index))
        });
        aggregate(trades)
            .and_then(|report| self.summarise(report, 0, 0))
            .map_err(aborted)
    }

    fn summarise(&self, report: PnlReport, windows: usize, pages: usize) -> PnlResult<PnlSummary> {
        let views = finalize(&report, &self.config)?;
        info!(
            trades = report.trade_count(),
            total_pnl = %report.total_pnl.round_dp(2),
            symbols = report.symbols_seen.len(),
            pages,
            "closed pnl report ready"
        );
        Ok(PnlSummary {
            report,
            views,
            windows,
            pages,
        })
    }
}

fn aborted(err: PnlError) -> PnlError {
    warn!(error = %err, "closed pnl report aborted");
    err
}
