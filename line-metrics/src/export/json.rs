//! JSON export for reports

use crate::error::MetricsError;
use crate::export::ReportExporter;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// JSON exporter for anything serializable, typically a line report
#[derive(Debug)]
pub struct JsonExporter {
    path: PathBuf,
    pretty: bool,
}

impl JsonExporter {
    /// Create a new JSON exporter
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `pretty` - Whether to pretty-print the JSON (adds whitespace for readability)
    pub fn new(path: &Path, pretty: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            pretty,
        }
    }

    /// Render `report` without touching the filesystem.
    pub fn render<T: Serialize + ?Sized>(&self, report: &T) -> Result<String, MetricsError> {
        let json = if self.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        Ok(json)
    }
}

impl<T: Serialize + ?Sized> ReportExporter<T> for JsonExporter {
    fn export(&self, report: &T) -> Result<(), MetricsError> {
        let json = self.render(report)?;
        let mut file = File::create(&self.path)?;
        file.write_all(json.as_bytes())?;
        info!(path = %self.path.display(), bytes = json.len(), "Exported JSON report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Stats;
    use std::time::Duration;

    #[test]
    fn test_json_export() {
        let mut stats = Stats::default();
        stats.record(Duration::from_secs(2));
        stats.record(Duration::from_secs(3));

        let temp_file = std::env::temp_dir().join("line_metrics_test_stats.json");
        let exporter = JsonExporter::new(&temp_file, true);
        exporter.export(&stats).unwrap();

        let json_content = std::fs::read_to_string(&temp_file).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json_content).unwrap();
        assert_eq!(parsed["total"], 5.0);
        assert_eq!(parsed["values"][1], 3.0);

        std::fs::remove_file(&temp_file).ok();
    }

    #[test]
    fn test_compact_render() {
        let exporter = JsonExporter::new(Path::new("unused.json"), false);
        assert_eq!(exporter.render(&Stats::default()).unwrap(), r#"{"total":0.0,"values":[]}"#);
    }
}
