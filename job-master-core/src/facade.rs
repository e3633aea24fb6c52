use crate::clock::{Clock, IdGenerator};
use crate::command_manager::CommandManager;
use crate::config::JobMasterConfig;
use crate::error::JobMasterError;
use crate::model::{Command, JobServiceSummary, PlanId, PlanStatus, TaskReport, TaskState, WorkerAddress, WorkerId};
use crate::plan::{PlanConfiguration, PlanDefinitionRegistry, PlanTracker};
use crate::worker_registry::WorkerRegistry;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

tokio::task_local! {
    static CURRENT_CALL_CONTEXT: CallContext;
}

/// Ambient per-request context installed around plan expansion (§4.H, §9):
/// expansion may issue outbound RPCs on the caller's behalf, and those
/// calls must not inherit whatever context the inbound `run` RPC carried.
/// Threaded via `tokio::task_local!` rather than an explicit parameter so
/// `PlanDefinition::expand`/`join` don't need to know it exists.
#[derive(Clone, Copy, Debug)]
pub struct CallContext {
    pub plan_id: PlanId,
}

impl CallContext {
    pub fn fresh(plan_id: PlanId) -> Self {
        Self { plan_id }
    }

    /// Runs `fut` with this context installed as the current one. The
    /// previous binding, if any, is restored automatically when `fut`
    /// completes or panics — `task_local!`'s scope never leaks across
    /// invocations.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CURRENT_CALL_CONTEXT.scope(self, fut).await
    }

    /// The context installed by the innermost enclosing `scope`, if any.
    pub fn current() -> Option<CallContext> {
        CURRENT_CALL_CONTEXT.try_with(|ctx| *ctx).ok()
    }
}

/// The outward surface of the job master (§4.H): admission, registration,
/// heartbeat handling, and queries. Owns every other component and wires
/// them together.
pub struct JobMaster {
    config: JobMasterConfig,
    clock: Arc<dyn Clock>,
    plan_ids: IdGenerator,
    worker_ids: IdGenerator,
    workers: WorkerRegistry,
    command_manager: CommandManager,
    tracker: PlanTracker,
    definitions: Arc<dyn PlanDefinitionRegistry>,
    /// Serializes admission (§5: "a monitor inside the facade serializing
    /// `run` admission"). A `tokio::sync::Mutex` rather than `std::sync`
    /// because it is held across the `.await` on plan expansion.
    run_monitor: AsyncMutex<()>,
}

impl JobMaster {
    pub fn new(
        config: JobMasterConfig,
        clock: Arc<dyn Clock>,
        definitions: Arc<dyn PlanDefinitionRegistry>,
    ) -> Self {
        let tracker = PlanTracker::new(
            config.job_capacity,
            config.finished_job_retention_time.as_millis() as u64,
            config.finished_job_purge_count,
        );
        Self {
            plan_ids: IdGenerator::new(clock.as_ref()),
            worker_ids: IdGenerator::new(clock.as_ref()),
            workers: WorkerRegistry::new(),
            command_manager: CommandManager::new(),
            tracker,
            definitions,
            run_monitor: AsyncMutex::new(()),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &JobMasterConfig {
        &self.config
    }

    pub fn workers(&self) -> &WorkerRegistry {
        &self.workers
    }

    pub fn tracker(&self) -> &PlanTracker {
        &self.tracker
    }

    pub fn command_manager(&self) -> &CommandManager {
        &self.command_manager
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn new_job_id(&self) -> PlanId {
        PlanId(self.plan_ids.next_id())
    }

    /// Admits and runs a plan (§4.H). `UNKNOWN_PLAN` is checked before an
    /// id is even allocated, so a rejected name never consumes one.
    pub async fn run(&self, config: PlanConfiguration) -> Result<PlanId, JobMasterError> {
        let definition = self
            .definitions
            .resolve(&config.name)
            .ok_or_else(|| JobMasterError::UnknownPlan(config.name.clone()))?;

        let id = self.new_job_id();
        let now_ms = self.clock.now_ms();
        let workers = self.workers.iterate();
        let context = CallContext::fresh(id);

        let _guard = self.run_monitor.lock().await;
        let result = context
            .scope(
                self.tracker
                    .run(&self.command_manager, &workers, id, config, definition, now_ms),
            )
            .await;

        result.map(|coordinator| coordinator.id).map_err(|_| JobMasterError::CapacityExceeded)
    }

    pub fn cancel(&self, id: PlanId) -> Result<(), JobMasterError> {
        let coordinator = self
            .tracker
            .get_coordinator(id)
            .ok_or(JobMasterError::NotFound(id))?;
        coordinator.cancel(&self.command_manager);
        Ok(())
    }

    pub fn list(&self) -> Vec<PlanId> {
        self.tracker.jobs()
    }

    pub fn get_status(&self, id: PlanId) -> Result<PlanStatus, JobMasterError> {
        self.tracker
            .get_coordinator(id)
            .map(|coordinator| coordinator.plan_info_wire())
            .ok_or(JobMasterError::NotFound(id))
    }

    /// Snapshot over every live plan's status, grouped by rolled-up state
    /// and ordered within each group by last-status-change descending,
    /// ties broken by id ascending (§4.H).
    pub fn get_summary(&self) -> JobServiceSummary {
        let mut summary = JobServiceSummary::default();
        for coordinator in self.tracker.coordinators() {
            let status = coordinator.plan_info_wire();
            match status.state {
                TaskState::Created => summary.created.push(status),
                TaskState::Running => summary.running.push(status),
                TaskState::Completed => summary.completed.push(status),
                TaskState::Canceled => summary.canceled.push(status),
                TaskState::Failed => summary.failed.push(status),
            }
        }

        let order = |list: &mut Vec<PlanStatus>| {
            list.sort_by(|a, b| {
                b.last_status_change_ms
                    .cmp(&a.last_status_change_ms)
                    .then_with(|| a.id.cmp(&b.id))
            });
        };
        order(&mut summary.created);
        order(&mut summary.running);
        order(&mut summary.completed);
        order(&mut summary.canceled);
        order(&mut summary.failed);
        summary
    }

    /// Exclusive over the worker registry (§5): evicts any prior record at
    /// the same address, failing its in-flight tasks first, then inserts
    /// the fresh record.
    pub async fn register_worker(&self, address: WorkerAddress) -> WorkerId {
        let now_ms = self.clock.now_ms();

        if let Some(old) = self.workers.first_by_addr(&address) {
            for coordinator in self.tracker.coordinators() {
                coordinator
                    .fail_tasks_for_worker(old.id, "worker re-registered at the same address", now_ms)
                    .await;
            }
            self.workers.remove(old.id);
            tracing::info!(worker_id = %old.id, address = %address, "worker evicted by re-registration");
        }

        let id = WorkerId(self.worker_ids.next_id());
        self.workers.insert(crate::model::WorkerRecord {
            id,
            address,
            last_heartbeat_ms: now_ms,
        });
        tracing::info!(worker_id = %id, "worker registered");
        id
    }

    /// Shared over the worker registry (§5). An unknown worker id gets
    /// told to re-register rather than treated as an error: the response
    /// still has to carry a command, and REGISTER is that instruction.
    pub async fn worker_heartbeat(&self, worker_id: WorkerId, reports: Vec<TaskReport>) -> Vec<Command> {
        if self.workers.first_by_id(worker_id).is_none() {
            return vec![Command::Register];
        }

        let now_ms = self.clock.now_ms();
        self.workers.touch(worker_id, now_ms);

        let mut by_plan: HashMap<PlanId, Vec<TaskReport>> = HashMap::new();
        for report in reports {
            by_plan.entry(report.plan_id).or_default().push(report);
        }

        for (plan_id, plan_reports) in by_plan {
            match self.tracker.get_coordinator(plan_id) {
                Some(coordinator) => coordinator.update_tasks(plan_reports, now_ms).await,
                None => tracing::debug!(plan_id = %plan_id, "heartbeat for unknown or purged plan, dropping"),
            }
        }

        self.command_manager.poll_all(worker_id)
    }

    /// Buries any non-finished coordinators at startup (§7). A fresh
    /// process without durable state always finds none; the hook exists
    /// so a future durable backend has somewhere to call into.
    pub async fn fail_unfinished_on_startup(&self, message: &str) {
        let now_ms = self.clock.now_ms();
        for coordinator in self.tracker.coordinators() {
            if !coordinator.is_job_finished() {
                coordinator.set_job_as_failed(message, now_ms).await;
            }
        }
    }
}
