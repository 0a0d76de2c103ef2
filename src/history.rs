//! Durable conversation log
//!
//! Appends one JSON record per line to `logs/history.jsonl`. Each record is
//! serialized in full before a single write, then flushed, so a crash loses at
//! most the in-flight record and never leaves a partial line behind.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::session::Role;

/// Role column of a log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRole {
    System,
    User,
    Assistant,
    /// Lifecycle events (`end`, `clear`, `reload`)
    Meta,
}

impl From<Role> for LogRole {
    fn from(role: Role) -> Self {
        match role {
            Role::System => Self::System,
            Role::User => Self::User,
            Role::Assistant => Self::Assistant,
        }
    }
}

/// A record as submitted by callers; the timestamp is added on write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub session: String,
    pub role: LogRole,
    pub content: Option<String>,
    pub event: Option<String>,
    pub model: Option<String>,
}

impl LogRecord {
    /// A conversation message record
    pub fn message(session: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            role: role.into(),
            content: Some(content.into()),
            event: None,
            model: None,
        }
    }

    /// A `meta` lifecycle record
    pub fn meta(session: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            role: LogRole::Meta,
            content: None,
            event: Some(event.into()),
            model: None,
        }
    }

    /// Attach the active model name
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// One line of `history.jsonl`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub session: String,
    pub role: LogRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub ts: String,
}

/// Append-only JSONL writer
#[derive(Debug)]
pub struct HistoryLog {
    path: PathBuf,
    last_ts: Option<DateTime<Utc>>,
}

impl HistoryLog {
    /// Create a logger writing to `path`; nothing is touched until the first write
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_ts: None,
        }
    }

    /// Location of the log file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stamp, serialize and append a record
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or the write fails
    pub fn log(&mut self, record: LogRecord) -> Result<LogEntry> {
        let ts = self.next_timestamp();
        let entry = LogEntry {
            session: record.session,
            role: record.role,
            content: record.content,
            event: record.event,
            model: record.model,
            ts: ts.to_rfc3339_opts(SecondsFormat::Micros, true),
        };

        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;

        self.last_ts = Some(ts);
        tracing::trace!(session_id = %entry.session, role = ?entry.role, "history record written");
        Ok(entry)
    }

    /// Current UTC time, never earlier than the previous record's
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.last_ts {
            Some(last) if last > now => last,
            _ => now,
        }
    }
}

/// Read every record back from a log file
///
/// # Errors
///
/// Returns error if the file cannot be read or a line is not a valid record
pub fn read_entries(path: &Path) -> Result<Vec<LogEntry>> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Into::into))
        .collect()
}
