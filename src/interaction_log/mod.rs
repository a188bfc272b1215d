// Interaction log module
// Append-only JSON record of answered questions


use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO-8601; kept as text so entries written by other tools still load
    pub timestamp: String,
    pub question: String,
    pub generated_answer: String,
}

/// Question/answer log persisted as a single JSON array
#[derive(Debug, Clone)]
pub struct InteractionLog {
    path: PathBuf,
}

impl InteractionLog {
    #[inline]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry stamped with the current time and rewrite the file.
    ///
    /// A missing or unreadable log is replaced by one holding just this entry.
    #[inline]
    pub fn append(&self, question: &str, answer: &str) -> Result<LogEntry> {
        let entry = LogEntry {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            question: question.to_string(),
            generated_answer: answer.to_string(),
        };

        let mut entries = self.entries();
        entries.push(entry.clone());
        self.write_all(&entries)?;

        debug!("Logged interaction #{} to {}", entries.len(), self.path.display());
        Ok(entry)
    }

    /// Every entry in insertion order; missing or malformed logs read as empty
    #[inline]
    pub fn entries(&self) -> Vec<LogEntry> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Could not read interaction log {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(
                "Interaction log {} is malformed, treating as empty: {}",
                self.path.display(),
                e
            );
            Vec::new()
        })
    }

    /// The last `count` entries, oldest first
    #[inline]
    pub fn recent(&self, count: usize) -> Vec<LogEntry> {
        let mut entries = self.entries();
        let skip = entries.len().saturating_sub(count);
        entries.drain(..skip);
        entries
    }

    fn write_all(&self, entries: &[LogEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_string_pretty(entries)?)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}
