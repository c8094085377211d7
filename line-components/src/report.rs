//! Read-only results of a finished run
//!
//! Station components expose their results through [`Reportable`]; the
//! [`Line`](crate::Line) collects them, together with every buffer's
//! [`BufferReport`], into a [`LineReport`]. Reports serialize to JSON (times
//! in seconds), render as text through `Display`, and flatten to
//! [`StateRow`]s for CSV export.

use crate::status::Status;
use line_core::SimTime;
use line_metrics::{StateRow, Stats};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// An entity that can describe what it did during a run.
pub trait Reportable {
    type Report: Serialize + fmt::Display;

    fn name(&self) -> &str;

    fn report(&self) -> Self::Report;
}

static NO_VISITS: Stats = Stats::EMPTY;

/// `part / whole`, zero when nothing was recorded.
fn share(part: Duration, whole: Duration) -> f64 {
    if whole.is_zero() {
        0.0
    } else {
        part.as_secs_f64() / whole.as_secs_f64()
    }
}

fn average(total: Duration, items: u64) -> Duration {
    if items == 0 {
        Duration::ZERO
    } else {
        Duration::from_nanos((total.as_nanos() / u128::from(items)) as u64)
    }
}

fn write_header(f: &mut fmt::Formatter<'_>, name: &str, kind: &str, items: u64, failures: u64) -> fmt::Result {
    writeln!(f, "{name} ({kind})")?;
    writeln!(f, "  {:<18}{items}", "items processed")?;
    writeln!(f, "  {:<18}{failures}", "failures")
}

fn write_state(f: &mut fmt::Formatter<'_>, status: Status, stats: &Stats, whole: Duration) -> fmt::Result {
    writeln!(
        f,
        "  {:<18}{:>10.3} ({:>6.2}%)  visits={}",
        format!("time {status}"),
        stats.total().as_secs_f64(),
        share(stats.total(), whole) * 100.0,
        stats.len()
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineReport {
    pub name: String,
    pub items_processed: u64,
    pub failures: u64,
    pub time_starved: Stats,
    pub time_processing: Stats,
    pub time_blocked: Stats,
    pub time_broken: Stats,
    /// Ended the run holding an item it had not finished.
    pub holds_unprocessed: bool,
    /// Ended the run holding a finished item it could not deliver.
    pub holds_processed: bool,
}

impl MachineReport {
    pub fn stats(&self, status: Status) -> &Stats {
        match status {
            Status::Starving => &self.time_starved,
            Status::Processing => &self.time_processing,
            Status::Blocked => &self.time_blocked,
            Status::Failed => &self.time_broken,
        }
    }

    /// Time accounted for across all states.
    pub fn total_time(&self) -> Duration {
        Status::ALL.iter().map(|s| self.stats(*s).total()).sum()
    }

    /// Fraction of the accounted time spent in `status`.
    pub fn share_of(&self, status: Status) -> f64 {
        share(self.stats(status).total(), self.total_time())
    }

    /// Processing time per completed item, zero if nothing was completed.
    pub fn average_processing_time(&self) -> Duration {
        average(self.time_processing.total(), self.items_processed)
    }

    pub fn state_rows(&self) -> Vec<StateRow> {
        Status::ALL
            .iter()
            .map(|s| StateRow::new(&self.name, "machine", s.as_str(), self.stats(*s)))
            .collect()
    }
}

impl fmt::Display for MachineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_header(f, &self.name, "machine", self.items_processed, self.failures)?;
        let whole = self.total_time();
        for status in Status::ALL {
            write_state(f, status, self.stats(status), whole)?;
        }
        writeln!(
            f,
            "  {:<18}{:.3}",
            "avg processing",
            self.average_processing_time().as_secs_f64()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub name: String,
    /// Items created.
    pub items_processed: u64,
    pub failures: u64,
    pub time_processing: Stats,
    pub time_blocked: Stats,
    pub time_broken: Stats,
    /// Ended the run holding a created item it could not deliver.
    pub holds_undelivered: bool,
}

impl SourceReport {
    const STATES: [Status; 3] = [Status::Processing, Status::Blocked, Status::Failed];

    /// Per-state stats; a source never starves, so that is always empty.
    pub fn stats(&self, status: Status) -> &Stats {
        match status {
            Status::Starving => &NO_VISITS,
            Status::Processing => &self.time_processing,
            Status::Blocked => &self.time_blocked,
            Status::Failed => &self.time_broken,
        }
    }

    pub fn total_time(&self) -> Duration {
        Self::STATES.iter().map(|s| self.stats(*s).total()).sum()
    }

    pub fn share_of(&self, status: Status) -> f64 {
        share(self.stats(status).total(), self.total_time())
    }

    /// Creation time per item, zero if nothing was created.
    pub fn average_processing_time(&self) -> Duration {
        average(self.time_processing.total(), self.items_processed)
    }

    pub fn state_rows(&self) -> Vec<StateRow> {
        Self::STATES
            .iter()
            .map(|s| StateRow::new(&self.name, "source", s.as_str(), self.stats(*s)))
            .collect()
    }
}

impl fmt::Display for SourceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_header(f, &self.name, "source", self.items_processed, self.failures)?;
        let whole = self.total_time();
        for status in Self::STATES {
            write_state(f, status, self.stats(status), whole)?;
        }
        Ok(())
    }
}

/// Buffer counters at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BufferReport {
    pub name: String,
    pub capacity: usize,
    /// Items stored when the run ended.
    pub content: usize,
    pub peak: usize,
    pub total_in: u64,
    pub total_out: u64,
}

impl fmt::Display for BufferReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} (buffer)\n  content {}/{}  peak {}  in {}  out {}",
            self.name, self.content, self.capacity, self.peak, self.total_in, self.total_out
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StationReport {
    Source(SourceReport),
    Machine(MachineReport),
}

impl StationReport {
    pub fn name(&self) -> &str {
        match self {
            StationReport::Source(report) => &report.name,
            StationReport::Machine(report) => &report.name,
        }
    }

    pub fn items_processed(&self) -> u64 {
        match self {
            StationReport::Source(report) => report.items_processed,
            StationReport::Machine(report) => report.items_processed,
        }
    }

    pub fn state_rows(&self) -> Vec<StateRow> {
        match self {
            StationReport::Source(report) => report.state_rows(),
            StationReport::Machine(report) => report.state_rows(),
        }
    }
}

impl fmt::Display for StationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationReport::Source(report) => fmt::Display::fmt(report, f),
            StationReport::Machine(report) => fmt::Display::fmt(report, f),
        }
    }
}

fn as_secs<S: Serializer>(time: &SimTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(time.as_secs_f64())
}

/// Everything a line reports after [`simulate`](crate::Line::simulate).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineReport {
    pub name: String,
    #[serde(serialize_with = "as_secs")]
    pub horizon: SimTime,
    pub events_processed: u64,
    /// In registration order.
    pub stations: Vec<StationReport>,
    pub buffers: Vec<BufferReport>,
}

impl LineReport {
    pub fn machine(&self, name: &str) -> Option<&MachineReport> {
        self.stations.iter().find_map(|station| match station {
            StationReport::Machine(report) if report.name == name => Some(report),
            _ => None,
        })
    }

    pub fn source(&self, name: &str) -> Option<&SourceReport> {
        self.stations.iter().find_map(|station| match station {
            StationReport::Source(report) if report.name == name => Some(report),
            _ => None,
        })
    }

    pub fn buffer(&self, name: &str) -> Option<&BufferReport> {
        self.buffers.iter().find(|buffer| buffer.name == name)
    }

    pub fn machines(&self) -> impl Iterator<Item = &MachineReport> {
        self.stations.iter().filter_map(|station| match station {
            StationReport::Machine(report) => Some(report),
            StationReport::Source(_) => None,
        })
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.stations.iter().filter_map(|station| match station {
            StationReport::Source(report) => Some(report),
            StationReport::Machine(_) => None,
        })
    }

    /// One CSV row per station and state.
    pub fn state_rows(&self) -> Vec<StateRow> {
        self.stations.iter().flat_map(StationReport::state_rows).collect()
    }
}

impl fmt::Display for LineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} at {}", self.name, self.horizon)?;
        for station in &self.stations {
            write!(f, "{station}")?;
        }
        for buffer in &self.buffers {
            write!(f, "{buffer}")?;
        }
        Ok(())
    }
}
