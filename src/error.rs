use thiserror::Error;

use crate::window::TimeWindow;

pub type PnlResult<T> = Result<T, PnlError>;

/// Errors that end a report run. Any of them means no report is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PnlError {
    /// Caller-supplied dates could not be turned into a query range
    #[error("invalid date range: {0}")]
    InvalidRange(String),

    #[error("invalid report config: {0}")]
    InvalidConfig(String),

    /// The page fetcher reported a non-success status for a window
    #[error("closed pnl fetch failed for {window}: {message}")]
    FetchFailure {
        window: TimeWindow,
        code: Option<i64>,
        message: String,
    },

    /// A window kept handing out cursors past the configured page cap
    #[error("closed pnl fetch for {window} exceeded {pages} pages")]
    PageLimitExceeded { window: TimeWindow, pages: u32 },

    /// A raw record could not be normalized; `index` counts records across the whole run
    #[error("malformed closed pnl record #{index}: {reason}")]
    MalformedRecord {
        window: Option<TimeWindow>,
        index: usize,
        reason: String,
    },

    /// A running pnl sum left the range `Decimal` can represent
    #[error("pnl overflow: {0}")]
    Overflow(String),
}

impl PnlError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        PnlError::MalformedRecord {
            window: None,
            index: 0,
            reason: reason.into(),
        }
    }

    /// Attaches the record position to a malformed-record error; other errors pass through.
    pub(crate) fn located(self, window: Option<TimeWindow>, index: usize) -> Self {
        match self {
            PnlError::MalformedRecord { reason, .. } => PnlError::MalformedRecord {
                window,
                index,
                reason,
            },
            other => other,
        }
    }
}

/// Failure reported by a [`crate::fetch::PageFetcher`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PageFetchError {
    pub code: Option<i64>,
    pub message: String,
}

impl PageFetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

#[cfg(feature = "python")]
impl From<PnlError> for pyo3::PyErr {
    fn from(err: PnlError) -> Self {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}
