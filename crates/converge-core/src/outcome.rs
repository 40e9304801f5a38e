//! Result of a successful convergence

use crate::task::{AsyncTask, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task that reached SUCCESS before its deadline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Convergence {
    /// Final task state
    pub task: AsyncTask,

    /// Submit calls made, including the successful one
    pub submit_attempts: u32,

    /// Poll calls made, including ones that failed transiently
    pub polls: u32,

    /// Total execution time in milliseconds
    pub duration_ms: u64,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Convergence {
    pub fn is_success(&self) -> bool {
        self.task.status == TaskStatus::Success
    }
}

impl std::fmt::Display for Convergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "task {} {} after {} poll(s), {} submit attempt(s), {}ms",
            self.task.id, self.task.status, self.polls, self.submit_attempts, self.duration_ms
        )
    }
}
