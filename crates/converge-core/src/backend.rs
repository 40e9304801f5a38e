//! Task backend trait definition

use crate::task::{Operation, PollResult, TaskId};
use async_trait::async_trait;

/// A remote system that accepts mutations and reports their progress
///
/// Implementations hold their own client handle; callers pass the backend
/// explicitly to [`Converger::run`](crate::Converger::run).
#[async_trait]
pub trait TaskBackend: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the backend name (e.g., "cloud-db")
    fn name(&self) -> &str;

    /// Issue the state-changing call and return the task tracking it
    async fn submit(&self, operation: &Operation) -> Result<TaskId, Self::Error>;

    /// Check the task's current status once
    async fn poll(&self, task_id: &TaskId) -> Result<PollResult, Self::Error>;

    /// Whether an error from `submit` or `poll` is worth retrying
    fn is_retryable(&self, error: &Self::Error) -> bool;
}
