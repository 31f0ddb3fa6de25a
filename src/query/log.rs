//! Query log.
//!
//! Records every executed query with bounded retention and optional JSON
//! persistence.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use crate::api::ResultSet;
use crate::error::{ConsoleError, Result};

/// Default number of entries kept.
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// Who caused a query to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    /// Typed and run by the user.
    UserLogs,
    /// Issued by the console itself, e.g. data previews.
    ActionLogs,
}

/// What a logged query produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggedResult {
    Data(Arc<ResultSet>),
    Error(String),
}

/// A query log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub sql: String,
    pub result: LoggedResult,
    pub connection_name: String,
    pub log_type: LogType,
}

/// Bounded, shared query history. The oldest entry is evicted first.
#[derive(Debug)]
pub struct QueryLog {
    capacity: usize,
    entries: Mutex<VecDeque<QueryLogEntry>>,
}

impl QueryLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, entry: QueryLogEntry) {
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Vec<QueryLogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn of_type(&self, log_type: LogType) -> Vec<QueryLogEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.log_type == log_type)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Writes all entries to a JSON file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries())
            .map_err(|e| ConsoleError::internal(format!("Failed to serialize query log: {e}")))?;
        std::fs::write(path, json)
            .map_err(|e| ConsoleError::internal(format!("Failed to write query log: {e}")))
    }

    /// Loads entries written by [`QueryLog::save_to_file`].
    ///
    /// A missing file yields an empty log. Only the newest `capacity` entries are kept.
    pub fn load_from_file(path: &Path, capacity: usize) -> Result<Self> {
        let log = Self::new(capacity);
        if !path.exists() {
            return Ok(log);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConsoleError::internal(format!("Failed to read query log: {e}")))?;
        let entries: Vec<QueryLogEntry> = serde_json::from_str(&content).map_err(|e| {
            ConsoleError::internal(format!("Corrupt query log {}: {e}", path.display()))
        })?;

        for entry in entries {
            log.push(entry);
        }
        Ok(log)
    }
}

impl Default for QueryLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
