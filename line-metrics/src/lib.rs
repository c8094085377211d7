//! Time-in-state accounting for simulated stations
//!
//! A [`StatTracker`] follows one station through its states, closing an
//! interval on every transition. The closed intervals per state form a
//! [`Stats`] (total plus ordered visit durations) from which the derived
//! figures (min, max, mean, percentiles) are computed. The
//! [`export`] module writes reports out as JSON or CSV.

pub mod error;
pub mod export;
pub mod stats;

pub use error::MetricsError;
pub use export::{CsvExporter, JsonExporter, ReportExporter, StateRow};
pub use stats::{StatTracker, Stats, StatsSummary};
