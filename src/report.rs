//! Batch results: JSON export and a human-readable summary.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;

use crate::error::{ResizeError, Result};
use crate::processor::ProcessedFile;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub generated_at: String,
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub outputs: Vec<ProcessedFile>,
    pub failed_files: Vec<FailedFile>,
    pub skipped_files: Vec<PathBuf>,
}

impl BatchReport {
    pub fn new(
        total: usize,
        outputs: Vec<ProcessedFile>,
        failed_files: Vec<FailedFile>,
        skipped_files: Vec<PathBuf>,
    ) -> Self {
        debug_assert_eq!(
            outputs.len() + failed_files.len() + skipped_files.len(),
            total,
            "every input must be resized, failed or skipped"
        );
        Self {
            generated_at: Local::now().to_rfc3339(),
            total,
            processed: outputs.len(),
            failed: failed_files.len(),
            skipped: skipped_files.len(),
            outputs,
            failed_files,
            skipped_files,
        }
    }

    pub fn empty() -> Self {
        Self::new(0, Vec::new(), Vec::new(), Vec::new())
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| ResizeError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| ResizeError::io(path, e.into()))?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(|e| ResizeError::io(path, e))
    }

    /// Totals followed by at most `limit` failures.
    pub fn summary_lines(&self, limit: usize) -> Vec<String> {
        let mut lines = vec![
            format!("Total files: {}", self.total),
            format!("Resized: {}", self.processed),
            format!("Failed: {}", self.failed),
        ];
        if self.skipped > 0 {
            lines.push(format!("Skipped: {}", self.skipped));
        }

        if !self.failed_files.is_empty() {
            lines.push("Failed files:".to_string());
            for failed in self.failed_files.iter().take(limit) {
                let name = failed
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| failed.path.display().to_string());
                lines.push(format!("  - {}: {}", name, failed.reason));
            }
            if self.failed_files.len() > limit {
                lines.push(format!(
                    "  ... and {} more failed files",
                    self.failed_files.len() - limit
                ));
            }
        }

        lines
    }
}
