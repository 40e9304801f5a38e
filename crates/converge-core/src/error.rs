//! Convergence error types

use crate::task::{TaskId, TaskStatus};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a single convergence run
///
/// `E` is the backend's own error type. Transient and permanent failures
/// carry it as their source; backend failures and timeouts are reported by
/// the remote task itself.
#[derive(Error, Debug)]
pub enum ConvergeError<E: std::error::Error + 'static> {
    #[error("Transient error persisted after {attempts} submit attempt(s): {source}")]
    Transient {
        attempts: u32,
        #[source]
        source: E,
    },

    #[error("Permanent error: {0}")]
    Permanent(#[source] E),

    #[error("Task {task_id} failed: {message}")]
    BackendFailure { task_id: TaskId, message: String },

    #[error(
        "Timeout: task {task_id} still {last_status} after {elapsed:?}; the remote operation may still complete"
    )]
    Timeout {
        task_id: TaskId,
        elapsed: Duration,
        last_status: TaskStatus,
    },

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
}

impl<E: std::error::Error + 'static> ConvergeError<E> {
    /// The deadline passed while the task was still pending or running
    pub fn is_timeout(&self) -> bool {
        matches!(self, ConvergeError::Timeout { .. })
    }

    /// The remote side reported a terminal FAILED status
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, ConvergeError::BackendFailure { .. })
    }

    /// Task identifier, if the submit step got far enough to produce one
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            ConvergeError::BackendFailure { task_id, .. }
            | ConvergeError::Timeout { task_id, .. } => Some(task_id),
            ConvergeError::InvalidTransition(e) => Some(&e.task_id),
            ConvergeError::Transient { .. } | ConvergeError::Permanent(_) => None,
        }
    }
}

/// A terminal task was observed moving to a different status
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid status transition for task {task_id}: {from} -> {to}")]
pub struct TransitionError {
    pub task_id: TaskId,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Status normalization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("Unknown status '{raw}' from backend '{backend}'")]
    UnknownStatus { backend: String, raw: String },
}

pub type ConvergeResult<T, E> = std::result::Result<T, ConvergeError<E>>;
