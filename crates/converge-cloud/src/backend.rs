//! TaskBackend implementations over [`CloudClient`]

use crate::client::CloudClient;
use crate::error::CloudError;
use async_trait::async_trait;
use converge_core::{Operation, PollResult, Retryable, StatusMap, TaskBackend, TaskId, TaskStatus};

/// Name of the built-in task status table
pub const TASK_BACKEND: &str = "cloud-db";

/// Instance states that mean a wait will never succeed
const INSTANCE_FAILURE_STATES: &[&str] = &["error", "failed", "isolated", "deleted"];

/// Status vocabulary of the `/tasks` endpoint
pub fn task_status_map() -> StatusMap {
    let mut map = StatusMap::new(TASK_BACKEND);
    map.merge(&StatusMap::standard());
    map.merge(&StatusMap::job());
    map.merge(&StatusMap::numeric());
    map
}

/// Submits actions and polls `/tasks/{id}`
pub struct CloudTaskBackend<'a> {
    client: &'a CloudClient,
    statuses: StatusMap,
}

impl<'a> CloudTaskBackend<'a> {
    pub fn new(client: &'a CloudClient, statuses: StatusMap) -> Self {
        Self { client, statuses }
    }
}

#[async_trait]
impl TaskBackend for CloudTaskBackend<'_> {
    type Error = CloudError;

    fn name(&self) -> &str {
        self.statuses.backend()
    }

    async fn submit(&self, operation: &Operation) -> Result<TaskId, CloudError> {
        self.client.submit_action(operation).await
    }

    async fn poll(&self, task_id: &TaskId) -> Result<PollResult, CloudError> {
        let report = self.client.task_status(task_id).await?;
        let result = self
            .statuses
            .poll_result(&report.status.to_string(), report.message)?;
        Ok(result)
    }

    fn is_retryable(&self, error: &CloudError) -> bool {
        error.is_retryable()
    }
}

/// Waits for an instance to reach a target state.
///
/// There is no task to submit: the instance id doubles as the task id and
/// each poll reads the instance itself.
pub struct InstanceStateBackend<'a> {
    client: &'a CloudClient,
    target: String,
}

impl<'a> InstanceStateBackend<'a> {
    pub fn new(client: &'a CloudClient, target: impl Into<String>) -> Self {
        Self {
            client,
            target: target.into(),
        }
    }

    fn classify(&self, status: &str) -> PollResult {
        let status = status.trim();
        if status.eq_ignore_ascii_case(&self.target) {
            PollResult::success()
        } else if INSTANCE_FAILURE_STATES
            .iter()
            .any(|s| s.eq_ignore_ascii_case(status))
        {
            PollResult::failed(format!(
                "instance entered '{}' while waiting for '{}'",
                status, self.target
            ))
        } else {
            PollResult::running().with_message(status.to_string())
        }
    }
}

#[async_trait]
impl TaskBackend for InstanceStateBackend<'_> {
    type Error = CloudError;

    fn name(&self) -> &str {
        "instance-state"
    }

    async fn submit(&self, operation: &Operation) -> Result<TaskId, CloudError> {
        Ok(TaskId::new(operation.target.clone()))
    }

    async fn poll(&self, task_id: &TaskId) -> Result<PollResult, CloudError> {
        let info = self.client.instance_status(task_id.as_str()).await?;
        let result = self.classify(&info.status);
        if result.status == TaskStatus::Running {
            tracing::debug!("Instance {} is {}", info.id, info.status);
        }
        Ok(result)
    }

    fn is_retryable(&self, error: &CloudError) -> bool {
        error.is_retryable()
    }
}
