//! Database service: mutations driven to convergence

use crate::backend::{CloudTaskBackend, InstanceStateBackend, task_status_map};
use crate::client::CloudClient;
use crate::error::CloudError;
use crate::mutation::Mutation;
use converge_core::{ConvergeResult, Convergence, Converger, Operation, StatusMap};

/// Runs database mutations and instance waits through a [`Converger`]
pub struct DatabaseService {
    converger: Converger,
    statuses: StatusMap,
}

impl DatabaseService {
    pub fn new(converger: Converger) -> Self {
        Self {
            converger,
            statuses: task_status_map(),
        }
    }

    /// Add entries for a backend whose task vocabulary differs from the default
    pub fn with_status_map(mut self, extra: &StatusMap) -> Self {
        self.statuses.merge(extra);
        self
    }

    pub fn converger(&self) -> &Converger {
        &self.converger
    }

    /// Submit `mutation` and wait for its task to settle
    pub async fn mutate<M>(
        &self,
        client: &CloudClient,
        mutation: &M,
    ) -> ConvergeResult<Convergence, CloudError>
    where
        M: Mutation + ?Sized,
    {
        let operation = mutation.to_operation();
        let backend = CloudTaskBackend::new(client, self.statuses.clone());
        self.converger.run(&backend, &operation).await
    }

    /// Wait until `instance_id` reports `target` (e.g., "running")
    pub async fn wait_for_instance(
        &self,
        client: &CloudClient,
        instance_id: &str,
        target: &str,
    ) -> ConvergeResult<Convergence, CloudError> {
        let operation = Operation::new(format!("wait-{}", target), instance_id);
        let backend = InstanceStateBackend::new(client, target);
        self.converger.run(&backend, &operation).await
    }
}
