use crate::model::{TaskDescriptor, TaskStatus, WorkerRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Opaque plan configuration as it arrives over the wire: a plan name plus
/// an undecoded payload (§3). Decoding the payload into whatever shape a
/// specific plan type needs is the plan definition's job, not the core's.
#[derive(Clone, Debug)]
pub struct PlanConfiguration {
    pub name: String,
    pub payload: Vec<u8>,
}

/// Resolves a plan configuration into tasks, and later joins per-task
/// results into one aggregated result. The plan-definition registry is an
/// external collaborator — the core depends only on this trait boundary,
/// never on a concrete catalog of plan types.
///
/// `expand` and `join` are async: expansion in particular may issue
/// outbound RPCs (resolving component metadata, picking placements) and
/// must run under the ambient call-context isolation the facade installs
/// around it (§4.H, §9).
#[async_trait]
pub trait PlanDefinition: Send + Sync {
    /// Expands `config` into the list of tasks to run, choosing a target
    /// worker for each from the `workers` snapshot taken at admission time
    /// (§9 Open Question: workers registered later do not retroactively
    /// receive tasks from this plan).
    async fn expand(
        &self,
        config: &PlanConfiguration,
        workers: &[WorkerRecord],
    ) -> Result<Vec<TaskDescriptor>, String>;

    /// Joins the final per-task statuses (all terminal, since this is only
    /// called once the plan's roll-up state has just become COMPLETED)
    /// into one aggregated result payload.
    async fn join(&self, results: &[TaskStatus]) -> Result<Option<Vec<u8>>, String>;

    /// Whether an empty expansion (no tasks) should be treated as an
    /// immediately-COMPLETED plan rather than an error.
    fn trivially_complete_on_empty(&self) -> bool {
        true
    }

    /// Whether the plan is safe to retry wholesale after a worker carrying
    /// one of its tasks is lost (informational; the core does not act on
    /// this by itself today — see DESIGN.md Open Question).
    fn is_retriable(&self) -> bool {
        false
    }
}

/// Looks a plan configuration's name up to the definition that knows how
/// to expand/join it (§1, §3).
pub trait PlanDefinitionRegistry: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<dyn PlanDefinition>>;
}

/// A simple in-memory registry, sufficient for embedding a handful of
/// statically-known plan types (the production plan catalog remains an
/// external collaborator).
#[derive(Default)]
pub struct InMemoryPlanDefinitionRegistry {
    definitions: HashMap<String, Arc<dyn PlanDefinition>>,
}

impl InMemoryPlanDefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, definition: Arc<dyn PlanDefinition>) {
        self.definitions.insert(name.into(), definition);
    }
}

impl PlanDefinitionRegistry for InMemoryPlanDefinitionRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<dyn PlanDefinition>> {
        self.definitions.get(name).cloned()
    }
}

/// Example plan definition used by scenario S1 and the crate's own tests:
/// assigns one task per worker in the snapshot, round-robin over however
/// many tasks the configuration payload asks for, and joins results by
/// concatenating each task's result bytes in task-id order.
pub struct EchoPlanDefinition {
    pub task_count: usize,
}

#[async_trait]
impl PlanDefinition for EchoPlanDefinition {
    async fn expand(
        &self,
        config: &PlanConfiguration,
        workers: &[WorkerRecord],
    ) -> Result<Vec<TaskDescriptor>, String> {
        if workers.is_empty() {
            return Err("no workers registered to expand the echo plan onto".to_string());
        }
        let mut tasks = Vec::with_capacity(self.task_count);
        for task_id in 0..self.task_count as u32 {
            let worker = &workers[task_id as usize % workers.len()];
            tasks.push(TaskDescriptor {
                task_id,
                worker_id: worker.id,
                worker_host: worker.address.host.clone(),
                arg: config.payload.clone(),
            });
        }
        Ok(tasks)
    }

    async fn join(&self, results: &[TaskStatus]) -> Result<Option<Vec<u8>>, String> {
        let mut ordered: Vec<&TaskStatus> = results.iter().collect();
        ordered.sort_by_key(|t| t.task_id);
        let mut joined = Vec::new();
        for status in ordered {
            if let Some(result) = &status.result {
                joined.extend_from_slice(result);
            }
        }
        Ok(Some(joined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkerAddress;
    use test_r::test;

    fn worker(id: u64, host: &str) -> WorkerRecord {
        WorkerRecord {
            id: crate::model::WorkerId(id),
            address: WorkerAddress {
                host: host.to_string(),
                rpc_port: 9000,
                data_port: 9001,
                web_port: 9002,
                domain_socket: None,
            },
            last_heartbeat_ms: 0,
        }
    }

    #[test]
    async fn echo_expands_one_task_per_worker() {
        let def = EchoPlanDefinition { task_count: 2 };
        let config = PlanConfiguration {
            name: "echo".to_string(),
            payload: vec![],
        };
        let workers = vec![worker(1, "w1"), worker(2, "w2")];
        let tasks = def.expand(&config, &workers).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].worker_id, crate::model::WorkerId(1));
        assert_eq!(tasks[1].worker_id, crate::model::WorkerId(2));
    }

    #[test]
    async fn echo_rejects_empty_worker_list() {
        let def = EchoPlanDefinition { task_count: 1 };
        let config = PlanConfiguration {
            name: "echo".to_string(),
            payload: vec![],
        };
        assert!(def.expand(&config, &[]).await.is_err());
    }
}
