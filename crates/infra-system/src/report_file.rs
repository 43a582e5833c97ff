// CSV report file sink
// The report is staged next to its destination and renamed into place
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use netmon_core::application::Reporter;
use netmon_core::domain::Batch;
use netmon_core::port::ReportSink;
use netmon_core::Result;

/// Writes each batch as a CSV file, optionally echoing it to stdout
pub struct FileReportSink {
    path: PathBuf,
    echo: bool,
}

impl FileReportSink {
    pub fn new(path: impl Into<PathBuf>, echo: bool) -> Self {
        Self {
            path: path.into(),
            echo,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "netmon.csv".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ReportSink for FileReportSink {
    fn publish(&self, batch: &Batch) -> Result<()> {
        let csv = Reporter::to_csv(batch)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = self.staging_path();
        fs::write(&staging, &csv)?;
        fs::rename(&staging, &self.path)?;

        info!(
            batch_id = %batch.id,
            path = %self.path.display(),
            rows = batch.len(),
            "Report written"
        );

        if self.echo {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            out.write_all(csv.as_bytes())?;
            out.flush()?;
        }
        Ok(())
    }
}
