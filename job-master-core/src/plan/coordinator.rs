use crate::command_manager::CommandManager;
use crate::model::{PlanId, PlanStatus, TaskId, TaskReport, TaskState, TaskStatus, WorkerId};
use crate::plan::definition::{PlanConfiguration, PlanDefinition};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Pure roll-up function (§3, §4.E): derives a plan's state from its
/// tasks' states. `states` being empty means the plan has no tasks left to
/// look at (a caller-level decision, not represented here) — callers that
/// admit a zero-task plan decide completion separately at construction.
pub fn roll_up(states: &[TaskState]) -> TaskState {
    if states.iter().any(|s| matches!(s, TaskState::Canceled)) {
        return TaskState::Canceled;
    }
    if states.iter().any(|s| matches!(s, TaskState::Failed)) {
        return TaskState::Failed;
    }
    if !states.is_empty() && states.iter().all(|s| matches!(s, TaskState::Completed)) {
        return TaskState::Completed;
    }
    if states.iter().any(|s| matches!(s, TaskState::Running)) {
        return TaskState::Running;
    }
    TaskState::Created
}

struct CoordinatorState {
    tasks: HashMap<TaskId, TaskStatus>,
    state: TaskState,
    error_message: Option<String>,
    result: Option<Vec<u8>>,
    last_status_change_ms: u64,
    finished_time_ms: Option<u64>,
}

impl CoordinatorState {
    /// Applies one report, enforcing terminal stickiness (§3). Returns
    /// `true` if the report actually mutated stored state (used only for
    /// diagnostics, the roll-up is always recomputed after a batch).
    fn apply_report(&mut self, report: TaskReport, now_ms: u64) -> bool {
        let Some(existing) = self.tasks.get(&report.task_id) else {
            tracing::error!(
                task_id = report.task_id,
                "report for unknown task id, dropping"
            );
            return false;
        };
        if existing.state.is_terminal() {
            tracing::debug!(
                task_id = report.task_id,
                "ignoring report for already-terminal task"
            );
            return false;
        }
        let worker_host = existing.worker_host.clone();
        let worker_id = existing.worker_id;
        self.tasks.insert(
            report.task_id,
            TaskStatus {
                plan_id: report.plan_id,
                task_id: report.task_id,
                worker_id,
                worker_host,
                state: report.state,
                error_message: report.error_message,
                result: report.result,
                last_updated_ms: now_ms,
            },
        );
        true
    }
}

/// One instance per admitted plan: owns plan state and drives the task
/// state machine from worker reports (§4.F).
pub struct PlanCoordinator {
    pub id: PlanId,
    pub name: String,
    definition: Option<Arc<dyn PlanDefinition>>,
    state: Mutex<CoordinatorState>,
    pub creation_time_ms: u64,
}

impl PlanCoordinator {
    /// Resolves nothing itself — the caller (the plan tracker) has already
    /// resolved `definition` from the registry, because an unresolvable
    /// plan name is a pre-admission `UNKNOWN_PLAN` error, distinct from an
    /// expansion failure on a known plan type (§4.F, §7). Expansion errors
    /// are caught here: the coordinator is constructed in state FAILED
    /// rather than propagating, so admission always succeeds once a name
    /// is known.
    pub async fn create(
        command_manager: &CommandManager,
        workers: &[crate::model::WorkerRecord],
        id: PlanId,
        config: PlanConfiguration,
        definition: Arc<dyn PlanDefinition>,
        now_ms: u64,
    ) -> Arc<Self> {
        let name = config.name.clone();
        let (state, error_message, tasks, descriptors) =
            match definition.expand(&config, workers).await
        {
            Ok(descriptors) if descriptors.is_empty() && definition.trivially_complete_on_empty() => {
                (TaskState::Completed, None, HashMap::new(), Vec::new())
            }
            Ok(descriptors) => {
                let mut tasks = HashMap::with_capacity(descriptors.len());
                for d in &descriptors {
                    tasks.insert(
                        d.task_id,
                        TaskStatus {
                            plan_id: id,
                            task_id: d.task_id,
                            worker_id: d.worker_id,
                            worker_host: d.worker_host.clone(),
                            state: TaskState::Created,
                            error_message: None,
                            result: None,
                            last_updated_ms: now_ms,
                        },
                    );
                }
                (TaskState::Created, None, tasks, descriptors)
            }
            Err(message) => {
                tracing::error!(plan_id = %id, error = %message, "plan expansion failed");
                (TaskState::Failed, Some(message), HashMap::new(), Vec::new())
            }
        };

        let finished_time_ms = if state.is_terminal() { Some(now_ms) } else { None };
        let definition = if matches!(state, TaskState::Failed) {
            None
        } else {
            Some(definition)
        };

        let coordinator = Arc::new(Self {
            id,
            name,
            definition,
            state: Mutex::new(CoordinatorState {
                tasks,
                state,
                error_message,
                result: None,
                last_status_change_ms: now_ms,
                finished_time_ms,
            }),
            creation_time_ms: now_ms,
        });

        for d in &descriptors {
            command_manager.submit_run_task(d.worker_id, id, d.task_id, d.arg.clone());
        }

        coordinator
    }

    /// Applies a batch of per-task reports atomically with respect to
    /// roll-up (§5): every report in the batch is applied before the
    /// roll-up is recomputed once.
    pub async fn update_tasks(&self, reports: Vec<TaskReport>, now_ms: u64) {
        {
            let mut state = self.state.lock().expect("coordinator lock poisoned");

            // Per-task terminal stickiness is enforced inside `apply_report`;
            // the coordinator still records the latest report for any task
            // that wasn't already terminal even once the plan's own roll-up
            // has reached a terminal state (S6: a CANCEL in flight does not
            // stop a late COMPLETED report from being stored on its task, it
            // just can't change the plan's already-CANCELED roll-up).
            for report in reports {
                let _ = state.apply_report(report, now_ms);
            }
        }

        self.recompute_roll_up(now_ms).await;
    }

    /// Recomputes the roll-up from current task states and, if it just
    /// became COMPLETED, joins the per-task results. The coordinator's
    /// `std::sync::Mutex` guard is never held across the `.await` on
    /// `definition.join` (§9 lock discipline): phase one recomputes and
    /// snapshots under the lock, phase two awaits the join unlocked, phase
    /// three re-locks briefly to store the outcome.
    async fn recompute_roll_up(&self, now_ms: u64) {
        let results_snapshot = {
            let mut state = self.state.lock().expect("coordinator lock poisoned");
            // Terminal stickiness (§3 invariant, property 5): once the plan's
            // own roll-up is terminal, no later report may move it again, even
            // if individual non-terminal tasks keep reporting (e.g. a task
            // that was RUNNING when the plan already failed on a sibling
            // task's lost worker later posts a legitimate CANCELED).
            if state.state.is_terminal() {
                return;
            }
            let states: Vec<TaskState> = state.tasks.values().map(|t| t.state).collect();
            let new_state = roll_up(&states);
            if new_state == state.state {
                return;
            }

            let was_completed = matches!(state.state, TaskState::Completed);
            state.state = new_state;
            state.last_status_change_ms = now_ms;

            if new_state.is_terminal() && state.finished_time_ms.is_none() {
                state.finished_time_ms = Some(now_ms);
            }

            if matches!(new_state, TaskState::Completed) && !was_completed && self.definition.is_some()
            {
                Some(state.tasks.values().cloned().collect::<Vec<TaskStatus>>())
            } else {
                None
            }
        };

        let Some(results) = results_snapshot else {
            return;
        };
        let Some(definition) = &self.definition else {
            return;
        };

        match definition.join(&results).await {
            Ok(result) => {
                let mut state = self.state.lock().expect("coordinator lock poisoned");
                state.result = result;
            }
            Err(message) => {
                tracing::error!(plan_id = %self.id, error = %message, "plan join failed");
                let mut state = self.state.lock().expect("coordinator lock poisoned");
                state.error_message = Some(message);
            }
        }
    }

    /// No-op if already terminal. Otherwise submits a CANCEL command for
    /// every non-terminal task's assigned worker and returns without
    /// waiting for acknowledgement — the roll-up still waits for the
    /// workers' subsequent reports (§4.F).
    pub fn cancel(&self, command_manager: &CommandManager) {
        let state = self.state.lock().expect("coordinator lock poisoned");
        if state.state.is_terminal() {
            return;
        }
        for status in state.tasks.values() {
            if !status.state.is_terminal() {
                command_manager.submit_cancel_task(status.worker_id, self.id, status.task_id);
            }
        }
    }

    /// Synthesizes a FAILED report for every non-terminal task assigned to
    /// `worker_id` and applies it through the normal update path (§4.F).
    pub async fn fail_tasks_for_worker(&self, worker_id: WorkerId, reason: &str, now_ms: u64) {
        {
            let mut state = self.state.lock().expect("coordinator lock poisoned");
            let to_fail: Vec<TaskId> = state
                .tasks
                .values()
                .filter(|t| t.worker_id == worker_id && !t.state.is_terminal())
                .map(|t| t.task_id)
                .collect();
            if to_fail.is_empty() {
                return;
            }
            for task_id in to_fail {
                let report = TaskReport {
                    plan_id: self.id,
                    task_id,
                    state: TaskState::Failed,
                    error_message: Some(reason.to_string()),
                    result: None,
                };
                let _ = state.apply_report(report, now_ms);
            }
        }
        self.recompute_roll_up(now_ms).await;
    }

    /// Forces any non-terminal tasks to FAILED with `message`. Used during
    /// master startup to bury leftover in-flight plans (§4.F; a fresh
    /// process never has any, the hook exists for symmetry).
    pub async fn set_job_as_failed(&self, message: &str, now_ms: u64) {
        {
            let mut state = self.state.lock().expect("coordinator lock poisoned");
            let to_fail: Vec<TaskId> = state
                .tasks
                .values()
                .filter(|t| !t.state.is_terminal())
                .map(|t| t.task_id)
                .collect();
            for task_id in to_fail {
                let report = TaskReport {
                    plan_id: self.id,
                    task_id,
                    state: TaskState::Failed,
                    error_message: Some(message.to_string()),
                    result: None,
                };
                let _ = state.apply_report(report, now_ms);
            }
        }
        self.recompute_roll_up(now_ms).await;
    }

    pub fn is_job_finished(&self) -> bool {
        let state = self.state.lock().expect("coordinator lock poisoned");
        state.state.is_terminal()
    }

    pub fn finished_time_ms(&self) -> Option<u64> {
        let state = self.state.lock().expect("coordinator lock poisoned");
        state.finished_time_ms
    }

    /// Returns a copy of the plan status (§3), independent of further
    /// mutation.
    pub fn plan_info_wire(&self) -> PlanStatus {
        let state = self.state.lock().expect("coordinator lock poisoned");
        let mut children: Vec<TaskStatus> = state.tasks.values().cloned().collect();
        children.sort_by_key(|t| t.task_id);
        PlanStatus {
            id: self.id,
            name: self.name.clone(),
            description: self.name.clone(),
            children,
            state: state.state,
            error_message: state.error_message.clone(),
            result: state.result.clone(),
            last_status_change_ms: state.last_status_change_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkerAddress;
    use crate::plan::definition::EchoPlanDefinition;
    use test_r::test;

    fn worker(id: u64, host: &str) -> crate::model::WorkerRecord {
        crate::model::WorkerRecord {
            id: WorkerId(id),
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
    fn roll_up_rules_match_spec() {
        use TaskState::*;
        assert!(matches!(roll_up(&[Created]), Created));
        assert!(matches!(roll_up(&[Running, Created]), Running));
        assert!(matches!(roll_up(&[Completed, Completed]), Completed));
        assert!(matches!(roll_up(&[Completed, Failed]), Failed));
        assert!(matches!(roll_up(&[Failed, Canceled]), Canceled));
        assert!(matches!(roll_up(&[Running, Canceled]), Canceled));
        assert!(matches!(roll_up(&[Running, Failed]), Failed));
    }

    #[test]
    async fn terminal_roll_up_is_sticky_against_later_reports() {
        let command_manager = CommandManager::new();
        let workers = vec![worker(1, "w1"), worker(2, "w2")];
        let config = PlanConfiguration {
            name: "echo".to_string(),
            payload: vec![],
        };
        let coordinator = PlanCoordinator::create(
            &command_manager,
            &workers,
            PlanId(1),
            config,
            Arc::new(EchoPlanDefinition { task_count: 2 }),
            0,
        )
        .await;

        // t0's worker is lost: the plan rolls up to FAILED while t1 is still
        // CREATED.
        coordinator
            .fail_tasks_for_worker(WorkerId(1), "worker heartbeat timed out", 10)
            .await;
        assert!(matches!(coordinator.plan_info_wire().state, TaskState::Failed));
        let change_at_failure = coordinator.plan_info_wire().last_status_change_ms;

        // t1's worker later posts a legitimate CANCELED report (it had
        // received a CANCEL before the plan failed). The already-terminal
        // FAILED roll-up must not flip to CANCELED (property 5).
        coordinator
            .update_tasks(
                vec![TaskReport {
                    plan_id: PlanId(1),
                    task_id: 1,
                    state: TaskState::Canceled,
                    error_message: None,
                    result: None,
                }],
                20,
            )
            .await;

        let status = coordinator.plan_info_wire();
        assert!(matches!(status.state, TaskState::Failed));
        assert_eq!(status.last_status_change_ms, change_at_failure);
    }
}
