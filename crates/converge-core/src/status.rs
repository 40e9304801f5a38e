//! Backend status normalization
//!
//! Every backend reports progress in its own vocabulary ("RUNNING",
//! "FINISHED", "0", "1", ...). A [`StatusMap`] translates that vocabulary
//! into [`TaskStatus`] at the boundary so the converge loop only ever sees
//! the four normalized states.

use crate::error::StatusError;
use crate::task::{PollResult, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-backend mapping table from raw status strings to [`TaskStatus`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMap {
    backend: String,
    entries: HashMap<String, TaskStatus>,
}

impl StatusMap {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            entries: HashMap::new(),
        }
    }

    /// Build a table from raw entries (e.g., loaded from a settings file)
    pub fn from_entries<I, K>(backend: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, TaskStatus)>,
        K: AsRef<str>,
    {
        let mut map = Self::new(backend);
        for (raw, status) in entries {
            map.insert(raw.as_ref(), status);
        }
        map
    }

    pub fn with(mut self, raw: &str, status: TaskStatus) -> Self {
        self.insert(raw, status);
        self
    }

    pub fn insert(&mut self, raw: &str, status: TaskStatus) {
        self.entries.insert(normalize(raw), status);
    }

    /// Add every entry of `other`, overriding duplicates
    pub fn merge(&mut self, other: &StatusMap) {
        for (raw, status) in &other.entries {
            self.entries.insert(raw.clone(), *status);
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a raw status string. Matching ignores case and surrounding
    /// whitespace; an unmapped value is an error.
    pub fn resolve(&self, raw: &str) -> Result<TaskStatus, StatusError> {
        self.entries
            .get(&normalize(raw))
            .copied()
            .ok_or_else(|| StatusError::UnknownStatus {
                backend: self.backend.clone(),
                raw: raw.to_string(),
            })
    }

    /// Resolve a raw status into a [`PollResult`]
    pub fn poll_result(
        &self,
        raw: &str,
        message: Option<String>,
    ) -> Result<PollResult, StatusError> {
        let status = self.resolve(raw)?;
        Ok(PollResult { status, message })
    }

    /// PENDING / RUNNING / SUCCESS / FAILED plus common synonyms
    pub fn standard() -> Self {
        Self::new("standard")
            .with("PENDING", TaskStatus::Pending)
            .with("QUEUED", TaskStatus::Pending)
            .with("WAITING", TaskStatus::Pending)
            .with("RUNNING", TaskStatus::Running)
            .with("PROCESSING", TaskStatus::Running)
            .with("IN_PROGRESS", TaskStatus::Running)
            .with("SUCCESS", TaskStatus::Success)
            .with("SUCCEEDED", TaskStatus::Success)
            .with("COMPLETED", TaskStatus::Success)
            .with("FAILED", TaskStatus::Failed)
            .with("FAILURE", TaskStatus::Failed)
            .with("ERROR", TaskStatus::Failed)
    }

    /// Job-style vocabulary used by asynchronous job endpoints
    pub fn job() -> Self {
        Self::new("job")
            .with("INITIAL", TaskStatus::Pending)
            .with("INIT", TaskStatus::Pending)
            .with("RUNNING", TaskStatus::Running)
            .with("FINISHED", TaskStatus::Success)
            .with("FAILED", TaskStatus::Failed)
            .with("KILLED", TaskStatus::Failed)
            .with("PAUSED", TaskStatus::Failed)
    }

    /// Numeric status codes: 0 running, 1 success, 2 / -1 failed
    pub fn numeric() -> Self {
        Self::new("numeric")
            .with("0", TaskStatus::Running)
            .with("1", TaskStatus::Success)
            .with("2", TaskStatus::Failed)
            .with("-1", TaskStatus::Failed)
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}
