//! Operation and task types

use crate::error::TransitionError;
use serde::{Deserialize, Serialize};

/// Identifier assigned by the remote system to a tracked operation
///
/// Backends hand these out as strings or integers; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// Normalized task status shared by every backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted but not started
    Pending,
    /// In progress
    Running,
    /// Finished successfully
    Success,
    /// Finished with an error
    Failed,
}

impl TaskStatus {
    /// SUCCESS and FAILED are terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "PENDING"),
            TaskStatus::Running => write!(f, "RUNNING"),
            TaskStatus::Success => write!(f, "SUCCESS"),
            TaskStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// A single user-requested mutation against a remote resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Action name (e.g., "start-replication", "switch-master")
    pub action: String,

    /// Target resource identifier
    pub target: String,

    /// Action parameters, passed through to the backend untouched
    #[serde(default)]
    pub params: serde_json::Value,

    /// Idempotency key; defaults to the target identifier
    pub idempotency_key: String,
}

impl Operation {
    pub fn new(action: impl Into<String>, target: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            action: action.into(),
            idempotency_key: target.clone(),
            target,
            params: serde_json::Value::Null,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = key.into();
        self
    }

    /// Get the full operation key (action:target)
    pub fn key(&self) -> String {
        format!("{}:{}", self.action, self.target)
    }
}

/// Outcome of one status check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResult {
    pub status: TaskStatus,
    pub message: Option<String>,
}

impl PollResult {
    pub fn new(status: TaskStatus) -> Self {
        Self {
            status,
            message: None,
        }
    }

    pub fn pending() -> Self {
        Self::new(TaskStatus::Pending)
    }

    pub fn running() -> Self {
        Self::new(TaskStatus::Running)
    }

    pub fn success() -> Self {
        Self::new(TaskStatus::Success)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(TaskStatus::Failed).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Server-side handle tracking completion of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncTask {
    pub id: TaskId,
    pub status: TaskStatus,
    pub message: Option<String>,

    /// Number of status changes observed while polling
    pub transitions: u32,
}

impl AsyncTask {
    pub fn new(id: impl Into<TaskId>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Pending,
            message: None,
            transitions: 0,
        }
    }

    /// Record a poll result.
    ///
    /// Returns whether the status changed. A terminal task never moves to a
    /// different status.
    pub fn observe(&mut self, result: &PollResult) -> Result<bool, TransitionError> {
        if self.status.is_terminal() && result.status != self.status {
            return Err(TransitionError {
                task_id: self.id.clone(),
                from: self.status,
                to: result.status,
            });
        }

        if let Some(message) = &result.message {
            self.message = Some(message.clone());
        }

        if result.status == self.status {
            return Ok(false);
        }

        tracing::debug!("Task {}: {} -> {}", self.id, self.status, result.status);
        self.status = result.status;
        self.transitions += 1;
        Ok(true)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
