use std::collections::VecDeque;

use chrono::TimeZone;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ReportConfig;
use crate::error::{PageFetchError, PnlError, PnlResult};
use crate::record::{ClosedTrade, RawClosedPnl, TradeNormalizer};
use crate::window::TimeWindow;

/// Parameters for one closed-pnl page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest<'a> {
    pub category: &'a str,
    pub window: TimeWindow,
    pub limit: u32,
    /// Cursor handed out by the previous page of the same window
    pub cursor: Option<&'a str>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClosedPnlPage {
    pub records: Vec<RawClosedPnl>,
    pub next_cursor: Option<String>,
}

/// Source of closed-pnl pages, usually an authenticated exchange client.
///
/// Timeouts and retries belong to the implementation; any `Err` returned here ends the
/// whole report run.
pub trait PageFetcher {
    fn fetch_page(&mut self, request: &PageRequest<'_>) -> Result<ClosedPnlPage, PageFetchError>;
}

impl<F> PageFetcher for F
where
    F: FnMut(&PageRequest<'_>) -> Result<ClosedPnlPage, PageFetchError>,
{
    fn fetch_page(&mut self, request: &PageRequest<'_>) -> Result<ClosedPnlPage, PageFetchError> {
        self(request)
    }
}

/// Closed-pnl response envelope: `{retCode, retMsg, result: {list, nextPageCursor}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedPnlResponse {
    pub ret_code: i64,
    #[serde(default)]
    pub ret_msg: String,
    #[serde(default)]
    pub result: Option<ClosedPnlResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedPnlResult {
    #[serde(default)]
    pub list: Vec<RawClosedPnl>,
    #[serde(default)]
    pub next_page_cursor: Option<String>,
}

impl ClosedPnlResponse {
    pub fn from_json(text: &str) -> Result<Self, PageFetchError> {
        serde_json::from_str(text)
            .map_err(|err| PageFetchError::new(format!("failed to parse closed pnl response: {err}")))
    }

    /// Maps a non-zero `retCode` to an error carrying `retMsg`.
    pub fn into_page(self) -> Result<ClosedPnlPage, PageFetchError> {
        if self.ret_code != 0 {
            return Err(PageFetchError::with_code(self.ret_code, self.ret_msg));
        }
        let result = self
            .result
            .ok_or_else(|| PageFetchError::with_code(0, "closed pnl response has no result"))?;
        Ok(ClosedPnlPage {
            records: result.list,
            next_cursor: result.next_page_cursor.filter(|cursor| !cursor.is_empty()),
        })
    }
}

#[derive(Debug)]
struct WindowCursor {
    window: TimeWindow,
    cursor: Option<String>,
    pages: u32,
    finished: bool,
}

impl WindowCursor {
    fn new(window: TimeWindow) -> Self {
        Self {
            window,
            cursor: None,
            pages: 0,
            finished: false,
        }
    }
}

/// Lazy sequence of normalized trades over a list of planned windows.
///
/// Windows are fetched in order, one page at a time, only when the consumer asks for
/// more trades. The first error is yielded once and the stream then ends; dropping the
/// stream early leaves the remaining windows unrequested.
pub struct TradeStream<'f, F: PageFetcher, Tz: TimeZone> {
    fetcher: &'f mut F,
    normalizer: TradeNormalizer<Tz>,
    category: String,
    page_limit: u32,
    max_pages_per_window: u32,
    windows: std::vec::IntoIter<TimeWindow>,
    current: Option<WindowCursor>,
    buffered: VecDeque<RawClosedPnl>,
    records_seen: usize,
    pages_fetched: usize,
    done: bool,
}

impl<'f, F: PageFetcher, Tz: TimeZone> TradeStream<'f, F, Tz> {
    pub fn new(
        fetcher: &'f mut F,
        normalizer: TradeNormalizer<Tz>,
        windows: Vec<TimeWindow>,
        config: &ReportConfig,
    ) -> Self {
        Self {
            fetcher,
            normalizer,
            category: config.category.clone(),
            page_limit: config.page_limit,
            max_pages_per_window: config.max_pages_per_window,
            windows: windows.into_iter(),
            current: None,
            buffered: VecDeque::new(),
            records_seen: 0,
            pages_fetched: 0,
            done: false,
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn records_seen(&self) -> usize {
        self.records_seen
    }

    /// Fetches until at least one record is buffered. `Ok(false)` once every window is drained.
    fn fill_buffer(&mut self) -> PnlResult<bool> {
        loop {
            if self.current.as_ref().map_or(true, |state| state.finished) {
                match self.windows.next() {
                    Some(window) => self.current = Some(WindowCursor::new(window)),
                    None => return Ok(false),
                }
            }
            let Some(state) = self.current.as_mut() else {
                return Ok(false);
            };

            if state.pages >= self.max_pages_per_window {
                return Err(PnlError::PageLimitExceeded {
                    window: state.window,
                    pages: state.pages,
                });
            }

            let request = PageRequest {
                category: &self.category,
                window: state.window,
                limit: self.page_limit,
                cursor: state.cursor.as_deref(),
            };
            let page = self
                .fetcher
                .fetch_page(&request)
                .map_err(|err| PnlError::FetchFailure {
                    window: state.window,
                    code: err.code,
                    message: err.message,
                })?;

            state.pages += 1;
            self.pages_fetched += 1;
            debug!(
                window = %state.window,
                page = state.pages,
                records = page.records.len(),
                has_more = page.next_cursor.is_some(),
                "fetched closed pnl page"
            );

            match page.next_cursor.filter(|cursor| !cursor.is_empty()) {
                Some(cursor) => state.cursor = Some(cursor),
                None => state.finished = true,
            }

            if !page.records.is_empty() {
                self.buffered.extend(page.records);
                return Ok(true);
            }
        }
    }
}

impl<'f, F: PageFetcher, Tz: TimeZone> Iterator for TradeStream<'f, F, Tz> {
    type Item = PnlResult<ClosedTrade>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            if let Some(raw) = self.buffered.pop_front() {
                let index = self.records_seen;
                self.records_seen += 1;
                return match self.normalizer.normalize(&raw) {
                    Ok(trade) => Some(Ok(trade)),
                    Err(err) => {
                        self.done = true;
                        let window = self.current.as_ref().map(|state| state.window);
                        Some(Err(err.located(window, index)))
                    }
                };
            }

            match self.fill_buffer() {
                Ok(true) => continue,
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
