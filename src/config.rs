use serde::{Deserialize, Serialize};

use crate::error::{PnlError, PnlResult};

/// Longest span the closed-pnl endpoint accepts in one query.
pub const MAX_WINDOW_SPAN_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Largest page the closed-pnl endpoint hands out.
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub max_window_span_ms: i64,
    /// Product category forwarded to the fetcher ("linear" for USDT perpetuals)
    pub category: String,
    pub page_limit: u32,
    pub max_pages_per_window: u32,
    pub top_symbols: usize,
    pub top_trades: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_window_span_ms: MAX_WINDOW_SPAN_MS,
            category: "linear".to_string(),
            page_limit: MAX_PAGE_LIMIT,
            max_pages_per_window: 1000,
            top_symbols: 10,
            top_trades: 5,
        }
    }
}

impl ReportConfig {
    pub fn from_json(text: &str) -> PnlResult<Self> {
        let config: ReportConfig = serde_json::from_str(text)
            .map_err(|err| PnlError::InvalidConfig(format!("failed to parse config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PnlResult<()> {
        if self.max_window_span_ms <= 0 {
            return Err(PnlError::InvalidConfig(format!(
                "max_window_span_ms must be positive, got {}",
                self.max_window_span_ms
            )));
        }
        if self.page_limit == 0 || self.page_limit > MAX_PAGE_LIMIT {
            return Err(PnlError::InvalidConfig(format!(
                "page_limit must be within 1..={MAX_PAGE_LIMIT}, got {}",
                self.page_limit
            )));
        }
        if self.max_pages_per_window == 0 {
            return Err(PnlError::InvalidConfig(
                "max_pages_per_window must be positive".to_string(),
            ));
        }
        if self.top_symbols == 0 || self.top_trades == 0 {
            return Err(PnlError::InvalidConfig(format!(
                "top_symbols and top_trades must be positive, got {} and {}",
                self.top_symbols, self.top_trades
            )));
        }
        if self.category.trim().is_empty() {
            return Err(PnlError::InvalidConfig("category must not be empty".to_string()));
        }
        Ok(())
    }
}
