//! Run journal - the last run's report, persisted as JSON
//!
//! Written after every run so a partially completed release can be
//! inspected. The write is atomic: a crash never leaves a truncated file.

use crate::core::model::RunReport;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const JOURNAL_FILE: &str = ".release-state.json";

/// Location of the run journal for one project
#[derive(Debug, Clone)]
pub struct RunJournal {
    path: PathBuf,
}

impl RunJournal {
    pub fn new<P: AsRef<Path>>(project_path: P) -> Self {
        Self {
            path: project_path.as_ref().join(JOURNAL_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the journal with `report`
    pub async fn save(&self, report: &RunReport) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        // Atomic write: write to temp file, then rename
        let temp_file = self.path.with_extension("json.tmp");
        fs::write(&temp_file, json).await?;
        fs::rename(&temp_file, &self.path).await?;

        tracing::debug!(path = %self.path.display(), "run journal written");
        Ok(())
    }

    /// Report of the previous run, if a readable journal exists
    pub async fn load(&self) -> Result<Option<RunReport>, std::io::Error> {
        if !fs::try_exists(&self.path).await? {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).await?;
        match serde_json::from_str(&content) {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "ignoring corrupted run journal: {}", e);
                Ok(None)
            }
        }
    }
}
