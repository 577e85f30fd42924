//! JSON save/load of completed runs.

use crate::report::RunReport;
use snafu::Snafu;
use std::fs;
use std::path::Path;

/// Errors from report export.
#[derive(Debug, Snafu)]
pub enum ExportError {
    #[snafu(display("I/O error"), context(false))]
    Io { source: std::io::Error },

    #[snafu(display("JSON error"), context(false))]
    Json { source: serde_json::Error },
}

/// Save a run report as pretty-printed JSON.
pub fn save_report<P: AsRef<Path>>(path: P, report: &RunReport) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}

/// Load a run report written by [`save_report`].
pub fn load_report<P: AsRef<Path>>(path: P) -> Result<RunReport, ExportError> {
    let json = fs::read_to_string(path)?;
    let report = serde_json::from_str(&json)?;
    Ok(report)
}
