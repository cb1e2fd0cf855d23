use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyAny, PyDict};

use crate::config::ReportConfig;
use crate::error::PageFetchError;
use crate::fetch::{ClosedPnlPage, ClosedPnlResponse, PageRequest};
use crate::pipeline::{PnlSummary, ReportPipeline};
use crate::record::RawClosedPnl;

fn load_config(config_json: Option<&str>) -> PyResult<ReportConfig> {
    match config_json {
        Some(text) => Ok(ReportConfig::from_json(text)?),
        None => Ok(ReportConfig::default()),
    }
}

fn summary_to_py(py: Python<'_>, summary: &PnlSummary) -> PyResult<PyObject> {
    let text = serde_json::to_string(summary)
        .map_err(|err| PyValueError::new_err(format!("Failed to encode pnl report: {err}")))?;
    let json = py.import("json")?;
    Ok(json.call_method1("loads", (text,))?.into())
}

/// Calls the host's closed-pnl function and returns the response serialised as JSON.
fn call_fetch_page(
    py: Python<'_>,
    fetch_page: &PyAny,
    json: &PyModule,
    request: &PageRequest<'_>,
) -> PyResult<String> {
    let kwargs = PyDict::new(py);
    kwargs.set_item("category", request.category)?;
    kwargs.set_item("startTime", request.window.start_ms)?;
    kwargs.set_item("endTime", request.window.end_ms)?;
    kwargs.set_item("limit", request.limit)?;
    if let Some(cursor) = request.cursor {
        kwargs.set_item("cursor", cursor)?;
    }
    let response = fetch_page.call((), Some(kwargs))?;
    json.call_method1("dumps", (response,))?.extract()
}

/// Builds a report by driving `fetch_page(category=, startTime=, endTime=, limit=, cursor=)`
/// over the local-time range `[start_date, end_date)`.
#[pyfunction]
#[pyo3(signature = (fetch_page, start_date, end_date, config_json=None))]
fn fetch_pnl_report(
    py: Python<'_>,
    fetch_page: &PyAny,
    start_date: &str,
    end_date: &str,
    config_json: Option<&str>,
) -> PyResult<PyObject> {
    let pipeline = ReportPipeline::local(load_config(config_json)?)?;
    let json = py.import("json")?;

    let mut fetcher = |request: &PageRequest<'_>| -> Result<ClosedPnlPage, PageFetchError> {
        let text = call_fetch_page(py, fetch_page, json, request)
            .map_err(|err| PageFetchError::new(format!("fetch_page raised: {err}")))?;
        ClosedPnlResponse::from_json(&text)?.into_page()
    };

    let summary = pipeline.run(&mut fetcher, start_date, end_date)?;
    summary_to_py(py, &summary)
}

/// Builds a report from closed-pnl rows the host already fetched.
#[pyfunction]
#[pyo3(signature = (records, config_json=None))]
fn summarise_closed_pnl(
    py: Python<'_>,
    records: &PyAny,
    config_json: Option<&str>,
) -> PyResult<PyObject> {
    let json = py.import("json")?;
    let records_json: String = json.call_method1("dumps", (records,))?.extract()?;
    let records: Vec<RawClosedPnl> = serde_json::from_str(&records_json)
        .map_err(|err| PyValueError::new_err(format!("Failed to parse closed pnl records: {err}")))?;

    let pipeline = ReportPipeline::local(load_config(config_json)?)?;
    let summary = pipeline.summarise_records(&records)?;
    summary_to_py(py, &summary)
}

#[pymodule]
fn closed_pnl(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(fetch_pnl_report, m)?)?;
    m.add_function(wrap_pyfunction!(summarise_closed_pnl, m)?)?;
    m.add("__doc__", "Closed-trade pnl reports over exchange date ranges")?;
    Ok(())
}
