//! Export functionality for simulation reports
//!
//! Reports go out as JSON (any `Serialize` value) or as CSV (one row per
//! entity and state) for spreadsheet and pandas analysis.

pub mod csv;
pub mod json;

pub use self::csv::{CsvExporter, StateRow};
pub use self::json::JsonExporter;

use crate::error::MetricsError;
use serde::Serialize;
use std::path::Path;

/// Trait for exporting reports to different formats
pub trait ReportExporter<T: ?Sized> {
    /// Export `report` to the configured destination
    fn export(&self, report: &T) -> Result<(), MetricsError>;
}

/// Export a report to a JSON file
///
/// ```no_run
/// use line_metrics::export::export_json;
/// use line_metrics::Stats;
///
/// let stats = Stats::default();
/// export_json(&stats, "results/stats.json", true).unwrap();
/// ```
pub fn export_json<T: Serialize + ?Sized>(
    report: &T,
    path: impl AsRef<Path>,
    pretty: bool,
) -> Result<(), MetricsError> {
    JsonExporter::new(path.as_ref(), pretty).export(report)
}

/// Export state rows to a CSV file
pub fn export_csv(rows: &[StateRow], path: impl AsRef<Path>) -> Result<(), MetricsError> {
    CsvExporter::new(path.as_ref()).export(rows)
}
