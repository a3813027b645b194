// Append-only operational error log (`timestamp,error_message`)

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TradingError, TradingResult};

const ERROR_LOG_HEADERS: [&str; 2] = ["timestamp", "error_message"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    #[serde(with = "crate::ledger::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub error_message: String,
}

#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    /// Write an empty log with headers. Returns false if the file already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> TradingResult<bool> {
        let path = path.as_ref();
        if path.exists() {
            return Ok(false);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| TradingError::FileWrite(format!("{}: {}", parent.display(), e)))?;
        }

        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| TradingError::LedgerWrite(format!("{}: {}", path.display(), e)))?;
        writer
            .write_record(ERROR_LOG_HEADERS)
            .and_then(|_| writer.flush().map_err(csv::Error::from))
            .map_err(|e| TradingError::LedgerWrite(format!("{}: {}", path.display(), e)))?;
        Ok(true)
    }

    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, error_message: &str) -> TradingResult<()> {
        Self::create(&self.path)?;

        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| TradingError::LedgerWrite(format!("{}: {}", self.path.display(), e)))?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        let entry = ErrorEntry {
            timestamp: Utc::now(),
            error_message: error_message.to_string(),
        };
        writer.serialize(&entry)?;
        writer.flush()?;

        debug!("Recorded '{}' in {}", error_message, self.path.display());
        Ok(())
    }

    pub fn entries(&self) -> TradingResult<Vec<ErrorEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)
            .map_err(|e| TradingError::LedgerRead(format!("{}: {}", self.path.display(), e)))?;
        reader
            .deserialize()
            .collect::<Result<Vec<ErrorEntry>, _>>()
            .map_err(|e| TradingError::LedgerRead(format!("{}: {}", self.path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_preserves_history() {
        let dir = TempDir::new().unwrap();
        let log = ErrorLog::new(dir.path().join("error_log.csv"));

        log.append("OrderNotFound").unwrap();
        log.append("InsufficientFunds").unwrap();

        let messages: Vec<_> = log
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.error_message)
            .collect();
        assert_eq!(messages, vec!["OrderNotFound", "InsufficientFunds"]);

        let raw = std::fs::read_to_string(log.path()).unwrap();
        assert!(raw.starts_with("timestamp,error_message"));
    }
}
