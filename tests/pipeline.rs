use std::str::FromStr;

use chrono::{FixedOffset, TimeZone, Utc};
use closed_pnl::{
    ClosedPnlPage, PageFetchError, PageFetcher, PageRequest, PnlError, RawClosedPnl, ReportConfig,
    ReportPipeline, TimeWindow,
};
use rust_decimal::Decimal;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

fn dec(text: &str) -> Decimal {
    Decimal::from_str(text).unwrap()
}

fn ms(day: u32, hour: u32, minute: u32) -> i64 {
    Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0)
        .unwrap()
        .timestamp_millis()
}

/// In-memory exchange: serves rows whose opening time falls inside the requested window,
/// `page_size` at a time, using the row offset as cursor.
struct ScriptedExchange {
    rows: Vec<RawClosedPnl>,
    opened: Vec<i64>,
    page_size: usize,
    fail_on_window: Option<usize>,
    windows: Vec<TimeWindow>,
    requests: usize,
}

impl ScriptedExchange {
    fn new(rows: Vec<(&str, &str, i64, i64)>) -> Self {
        Self {
            opened: rows.iter().map(|row| row.2).collect(),
            rows: rows
                .into_iter()
                .map(|(symbol, pnl, opened, closed)| RawClosedPnl::new(symbol, pnl, opened, closed))
                .collect(),
            page_size: 100,
            fail_on_window: None,
            windows: Vec::new(),
            requests: 0,
        }
    }

    fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    fn fail_on_window(mut self, index: usize) -> Self {
        self.fail_on_window = Some(index);
        self
    }
}

impl PageFetcher for ScriptedExchange {
    fn fetch_page(&mut self, request: &PageRequest<'_>) -> Result<ClosedPnlPage, PageFetchError> {
        self.requests += 1;
        if self.windows.last() != Some(&request.window) {
            self.windows.push(request.window);
        }
        if self.fail_on_window == Some(self.windows.len() - 1) {
            return Err(PageFetchError::with_code(10016, "Service unavailable"));
        }
        assert_eq!(request.category, "linear");

        let in_window: Vec<&RawClosedPnl> = self
            .rows
            .iter()
            .zip(&self.opened)
            .filter(|(_, opened)| request.window.contains(**opened))
            .map(|(row, _)| row)
            .collect();
        let offset: usize = request.cursor.map_or(0, |c| c.parse().unwrap());
        let end = (offset + self.page_size).min(in_window.len());
        Ok(ClosedPnlPage {
            records: in_window[offset..end].iter().map(|row| (*row).clone()).collect(),
            next_cursor: (end < in_window.len()).then(|| end.to_string()),
        })
    }
}

fn pipeline() -> ReportPipeline<Utc> {
    ReportPipeline::new(ReportConfig::default(), Utc).unwrap()
}

fn scenario_rows() -> Vec<(&'static str, &'static str, i64, i64)> {
    vec![
        ("BTCUSDT", "100", ms(1, 10, 0), ms(1, 10, 30)),
        ("ETHUSDT", "-40", ms(1, 10, 5), ms(1, 11, 5)),
        ("BTCUSDT", "20", ms(2, 9, 0), ms(2, 9, 10)),
    ]
}

#[test]
fn three_trade_scenario_end_to_end() {
    let mut exchange = ScriptedExchange::new(scenario_rows()).page_size(2);
    let summary = pipeline().run(&mut exchange, "2024-01-01", "2024-01-08").unwrap();
    let report = &summary.report;

    assert_eq!(report.total_pnl, dec("80"));
    assert_eq!(report.won_count, 2);
    assert_eq!(report.lost_count, 1);
    assert_eq!(report.symbol_pnl("BTCUSDT"), Some(dec("120")));
    assert_eq!(report.symbol_pnl("ETHUSDT"), Some(dec("-40")));
    assert_eq!(report.pnl_by_hour[10], dec("60"));
    assert_eq!(report.pnl_by_hour[9], dec("20"));

    let curve: Vec<Decimal> = summary
        .views
        .cumulative_series
        .iter()
        .map(|point| point.cumulative_pnl)
        .collect();
    assert_eq!(curve, vec![dec("100"), dec("60"), dec("80")]);

    let top: Vec<&str> = summary
        .views
        .top_profitable_symbols
        .iter()
        .map(|entry| entry.symbol.as_str())
        .collect();
    assert_eq!(top, vec!["BTCUSDT"]);
    assert_eq!(summary.views.longest_trades[0].symbol, "ETHUSDT");
    assert_eq!(summary.views.fastest_trades[0].duration_minutes, 10.0);

    assert_eq!(summary.windows, 1);
    assert_eq!(summary.pages, 2);
    assert_eq!(exchange.requests, 2);
}

#[test]
fn failure_on_second_window_discards_everything() {
    // 19 days: three windows, trades in each
    let rows = vec![
        ("BTCUSDT", "10", ms(2, 12, 0), ms(2, 13, 0)),
        ("ETHUSDT", "5", ms(10, 12, 0), ms(10, 13, 0)),
        ("SOLUSDT", "1", ms(17, 12, 0), ms(17, 13, 0)),
    ];
    let mut exchange = ScriptedExchange::new(rows).fail_on_window(1);
    let result = pipeline().run(&mut exchange, "2024-01-01", "2024-01-20");

    match result {
        Err(PnlError::FetchFailure { window, code, message }) => {
            assert_eq!(window.start_ms, ms(8, 0, 0));
            assert_eq!(code, Some(10016));
            assert_eq!(message, "Service unavailable");
        }
        other => panic!("expected fetch failure, got {other:?}"),
    }
    // the third window is never requested
    assert_eq!(exchange.windows.len(), 2);
    assert_eq!(exchange.requests, 2);
}

#[test]
fn empty_range_is_a_zero_report() {
    let mut exchange = ScriptedExchange::new(scenario_rows());
    let summary = pipeline().run(&mut exchange, "2024-01-01", "2024-01-01").unwrap();

    assert_eq!(exchange.requests, 0);
    assert_eq!(summary.windows, 0);
    assert!(summary.report.is_empty());
    assert_eq!(summary.report.total_pnl, Decimal::ZERO);
    assert!(summary.report.symbols_seen.is_empty());
    assert!(summary.report.pnl_by_hour.iter().all(|v| v.is_zero()));
    assert!(summary.report.pnl_by_weekday.iter().all(|v| v.is_zero()));
    assert_eq!(summary.views.hourly_pnl.len(), 24);
    assert_eq!(summary.views.weekday_pnl.len(), 7);
}

#[test]
fn invalid_range_never_fetches() {
    let mut exchange = ScriptedExchange::new(scenario_rows());
    let result = pipeline().run(&mut exchange, "2024-01-08", "2024-01-01");
    assert!(matches!(result, Err(PnlError::InvalidRange(_))));
    let result = pipeline().run(&mut exchange, "yesterday", "2024-01-01");
    assert!(matches!(result, Err(PnlError::InvalidRange(_))));
    assert_eq!(exchange.requests, 0);
}

#[test]
fn malformed_row_aborts_the_run() {
    let rows = vec![
        ("BTCUSDT", "10", ms(2, 12, 0), ms(2, 13, 0)),
        ("ETHUSDT", "5", ms(3, 12, 0), ms(3, 11, 0)),
    ];
    let mut exchange = ScriptedExchange::new(rows);
    match pipeline().run(&mut exchange, "2024-01-01", "2024-01-05") {
        Err(PnlError::MalformedRecord { window, index, reason }) => {
            assert_eq!(index, 1);
            assert_eq!(window.map(|w| w.start_ms), Some(ms(1, 0, 0)));
            assert!(reason.contains("ETHUSDT"));
        }
        other => panic!("expected malformed record, got {other:?}"),
    }
}

#[test]
fn multi_week_range_reads_every_page() {
    let symbols = ["BTCUSDT", "ETHUSDT", "SOLUSDT"];
    let mut rows = Vec::new();
    for day in 1..=28u32 {
        for hour in [1u32, 7, 13, 19] {
            let symbol = symbols[(day as usize + hour as usize) % 3];
            let pnl = if hour == 13 { "-2.5" } else { "1.25" };
            rows.push((symbol, pnl, ms(day, hour, 0), ms(day, hour, 45)));
        }
    }
    let mut exchange = ScriptedExchange::new(rows).page_size(7);
    let summary = pipeline().run(&mut exchange, "2024-01-01", "2024-01-29").unwrap();
    let report = &summary.report;

    assert_eq!(summary.windows, 4);
    assert_eq!(report.trade_count(), 112);
    assert_eq!(report.won_count, 84);
    assert_eq!(report.lost_count, 28);
    assert_eq!(report.total_pnl, dec("35"));
    assert_eq!(report.total_pnl, report.positive_sum + report.negative_sum);
    let by_symbol: Decimal = report.pnl_by_symbol.iter().map(|e| e.pnl).sum();
    assert_eq!(by_symbol, report.total_pnl);
    assert_eq!(report.pnl_by_hour[13], dec("-70"));
    // 28 trades per window over 7-row pages: 4 pages each
    assert_eq!(summary.pages, 16);
    assert_eq!(
        summary.views.cumulative_series.last().map(|p| p.cumulative_pnl),
        Some(dec("35"))
    );
}

#[test]
fn identical_runs_serialise_identically() {
    let first = pipeline()
        .run(&mut ScriptedExchange::new(scenario_rows()), "2024-01-01", "2024-01-10")
        .unwrap();
    let second = pipeline()
        .run(&mut ScriptedExchange::new(scenario_rows()), "2024-01-01", "2024-01-10")
        .unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn windows_start_at_local_midnight() {
    let plus_eight = FixedOffset::east_opt(8 * 3600).unwrap();
    let pipeline = ReportPipeline::new(ReportConfig::default(), plus_eight).unwrap();
    let range = closed_pnl::DateRange::parse("2024-01-01", "2024-01-03").unwrap();
    let windows = pipeline.plan(&range).unwrap();
    assert_eq!(
        windows,
        vec![TimeWindow {
            start_ms: ms(1, 0, 0) - 8 * 3600 * 1000,
            end_ms: ms(1, 0, 0) - 8 * 3600 * 1000 + 2 * DAY_MS,
        }]
    );
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let config = ReportConfig {
        page_limit: 0,
        ..ReportConfig::default()
    };
    assert!(matches!(
        ReportPipeline::new(config, Utc),
        Err(PnlError::InvalidConfig(_))
    ));
}

#[test]
fn summarises_records_fetched_elsewhere() {
    let records: Vec<RawClosedPnl> = serde_json::from_str(
        r#"[
            {"symbol":"BTCUSDT","closedPnl":"100","createdTime":"1704103200000","updatedTime":"1704105000000"},
            {"symbol":"ETHUSDT","closedPnl":"-40","createdTime":"1704103500000","updatedTime":"1704107100000"},
            {"symbol":"BTCUSDT","closedPnl":"0","createdTime":"1704186000000","updatedTime":"1704186600000"}
        ]"#,
    )
    .unwrap();
    let summary = pipeline().summarise_records(&records).unwrap();
    assert_eq!(summary.report.total_pnl, dec("60"));
    assert_eq!(summary.report.won_count, 1);
    assert_eq!(summary.report.lost_count, 2);
    assert_eq!(summary.views.profit_split.losses, dec("40"));

    let mut broken = records.clone();
    broken[2].closed_pnl = None;
    match pipeline().summarise_records(&broken) {
        Err(PnlError::MalformedRecord { index, window, .. }) => {
            assert_eq!(index, 2);
            assert_eq!(window, None);
        }
        other => panic!("expected malformed record, got {other:?}"),
    }
}

#[test]
fn pnl_beyond_decimal_range_fails_cleanly() {
    let records = vec![
        RawClosedPnl::new("BTCUSDT", "79228162514264337593543950335", ms(1, 10, 0), ms(1, 11, 0)),
        RawClosedPnl::new("BTCUSDT", "1", ms(1, 12, 0), ms(1, 13, 0)),
    ];
    assert!(matches!(
        pipeline().summarise_records(&records),
        Err(PnlError::Overflow(_))
    ));

    let mut exchange = ScriptedExchange::new(vec![
        ("BTCUSDT", "79228162514264337593543950335", ms(1, 10, 0), ms(1, 11, 0)),
        ("ETHUSDT", "1", ms(2, 10, 0), ms(2, 11, 0)),
    ]);
    assert!(matches!(
        pipeline().run(&mut exchange, "2024-01-01", "2024-01-08"),
        Err(PnlError::Overflow(_))
    ));
}
