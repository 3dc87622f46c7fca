//! Location and retrieval of per-runfolder conversion logs. The job queue is
//! pointed at these paths for stdout/stderr when a job starts.

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

pub struct LogFileProvider {
    logs_path: PathBuf,
}

impl LogFileProvider {
    pub fn new(logs_path: impl AsRef<Path>) -> LogFileProvider {
        LogFileProvider {
            logs_path: logs_path.as_ref().to_path_buf(),
        }
    }

    pub fn log_path_for(&self, runfolder: &str) -> PathBuf {
        self.logs_path.join(format!("{runfolder}.log"))
    }

    /// Read the log text for a runfolder, failing with an I/O error if no
    /// log exists yet.
    pub fn read_log(&self, runfolder: &str) -> Result<String> {
        Ok(fs::read_to_string(self.log_path_for(runfolder))?)
    }
}
