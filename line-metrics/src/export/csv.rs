//! CSV export for per-state summaries
//!
//! One row per `(entity, state)` pair with the derived figures of that
//! state's visits.

use crate::error::MetricsError;
use crate::export::ReportExporter;
use crate::stats::{Stats, StatsSummary};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const HEADER: &str = "entity,kind,state,visits,total,mean,min,max,p50,p95";

/// One CSV row: the summary of one state of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct StateRow {
    pub entity: String,
    pub kind: String,
    pub state: String,
    pub summary: StatsSummary,
}

impl StateRow {
    pub fn new(entity: &str, kind: &str, state: &str, stats: &Stats) -> Self {
        Self {
            entity: entity.to_string(),
            kind: kind.to_string(),
            state: state.to_string(),
            summary: stats.summary(),
        }
    }

    fn write_to(&self, out: &mut impl Write) -> std::io::Result<()> {
        let s = &self.summary;
        writeln!(
            out,
            "{},{},{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            escape(&self.entity),
            escape(&self.kind),
            escape(&self.state),
            s.count,
            s.total,
            s.mean,
            s.min,
            s.max,
            s.p50,
            s.p95
        )
    }
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// CSV exporter for state rows
#[derive(Debug)]
pub struct CsvExporter {
    path: PathBuf,
}

impl CsvExporter {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Write the header and `rows` to any writer.
    pub fn write_rows(out: &mut impl Write, rows: &[StateRow]) -> Result<(), MetricsError> {
        writeln!(out, "{HEADER}")?;
        for row in rows {
            row.write_to(out)?;
        }
        Ok(())
    }
}

impl ReportExporter<[StateRow]> for CsvExporter {
    fn export(&self, rows: &[StateRow]) -> Result<(), MetricsError> {
        let mut out = BufWriter::new(File::create(&self.path)?);
        Self::write_rows(&mut out, rows)?;
        out.flush()?;
        info!(path = %self.path.display(), rows = rows.len(), "Exported CSV report");
        Ok(())
    }
}
