use crate::command_manager::CommandManager;
use crate::model::{PlanHistoryEntry, PlanId, WorkerRecord};
use crate::plan::definition::{PlanConfiguration, PlanDefinition};
use crate::plan::coordinator::PlanCoordinator;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("capacity exceeded")]
    CapacityExceeded,
}

/// Owns the set of live coordinators; enforces capacity and retention over
/// the population (§4.G). `run` is expected to be called under the
/// facade's single admission monitor (§5) — the tracker does not
/// internally serialize admissions, it only guarantees that each
/// individual `run` call observes and maintains the capacity bound.
pub struct PlanTracker {
    capacity: usize,
    retention_ms: u64,
    /// Maximum coordinators purged per admission attempt; negative means
    /// unlimited (§4.G, matching the wire config's `-1 = unlimited`).
    purge_count: i64,
    history_capacity: usize,
    live: RwLock<HashMap<PlanId, Arc<PlanCoordinator>>>,
    history: RwLock<VecDeque<PlanHistoryEntry>>,
}

impl PlanTracker {
    pub fn new(capacity: usize, retention_ms: u64, purge_count: i64) -> Self {
        Self::with_history_capacity(capacity, retention_ms, purge_count, capacity.max(1))
    }

    pub fn with_history_capacity(
        capacity: usize,
        retention_ms: u64,
        purge_count: i64,
        history_capacity: usize,
    ) -> Self {
        Self {
            capacity: capacity.max(1),
            retention_ms,
            purge_count,
            history_capacity,
            live: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
        }
    }

    /// Admission algorithm (§4.G): admit directly if under capacity;
    /// otherwise purge eligible finished coordinators (oldest-finished
    /// first, up to `purge_count`) and retry once.
    pub async fn run(
        &self,
        command_manager: &CommandManager,
        workers: &[WorkerRecord],
        id: PlanId,
        config: PlanConfiguration,
        definition: Arc<dyn PlanDefinition>,
        now_ms: u64,
    ) -> Result<Arc<PlanCoordinator>, TrackerError> {
        if self.live.read().expect("tracker lock poisoned").len() < self.capacity {
            return Ok(self
                .admit(command_manager, workers, id, config, definition, now_ms)
                .await);
        }

        self.purge(now_ms);

        if self.live.read().expect("tracker lock poisoned").len() < self.capacity {
            Ok(self
                .admit(command_manager, workers, id, config, definition, now_ms)
                .await)
        } else {
            Err(TrackerError::CapacityExceeded)
        }
    }

    async fn admit(
        &self,
        command_manager: &CommandManager,
        workers: &[WorkerRecord],
        id: PlanId,
        config: PlanConfiguration,
        definition: Arc<dyn PlanDefinition>,
        now_ms: u64,
    ) -> Arc<PlanCoordinator> {
        // The coordinator's initial START commands (or FAILED state) are
        // fully recorded inside `create` before we publish it into `live`,
        // satisfying the "don't publish until commands enqueued" rule (§5).
        let coordinator =
            PlanCoordinator::create(command_manager, workers, id, config, definition, now_ms)
                .await;
        self.live
            .write()
            .expect("tracker lock poisoned")
            .insert(id, coordinator.clone());
        tracing::info!(plan_id = %id, "plan admitted");
        coordinator
    }

    fn purge(&self, now_ms: u64) {
        let mut finished: Vec<(PlanId, u64)> = self
            .live
            .read()
            .expect("tracker lock poisoned")
            .iter()
            .filter_map(|(id, c)| c.finished_time_ms().map(|finished_at| (*id, finished_at)))
            .collect();
        finished.sort_by_key(|(_, finished_at)| *finished_at);

        let limit = if self.purge_count < 0 {
            finished.len()
        } else {
            self.purge_count as usize
        };

        let mut purged = 0usize;
        for (id, finished_at) in finished {
            if purged >= limit {
                break;
            }
            if now_ms.saturating_sub(finished_at) < self.retention_ms {
                continue;
            }
            let removed = self.live.write().expect("tracker lock poisoned").remove(&id);
            if let Some(coordinator) = removed {
                let info = coordinator.plan_info_wire();
                let entry = PlanHistoryEntry {
                    id,
                    name: info.name,
                    final_state: info.state,
                    error_message: info.error_message,
                    last_updated_ms: info.last_status_change_ms,
                };
                let mut history = self.history.write().expect("tracker lock poisoned");
                if history.len() >= self.history_capacity {
                    history.pop_front();
                }
                history.push_back(entry);
                tracing::info!(plan_id = %id, "finished plan purged");
                purged += 1;
            }
        }
    }

    pub fn get_coordinator(&self, id: PlanId) -> Option<Arc<PlanCoordinator>> {
        self.live.read().expect("tracker lock poisoned").get(&id).cloned()
    }

    /// Ids of every live coordinator plus every id still visible through
    /// the bounded history of purged plans (§4.G, §9).
    pub fn jobs(&self) -> Vec<PlanId> {
        let mut ids: Vec<PlanId> = self
            .live
            .read()
            .expect("tracker lock poisoned")
            .keys()
            .copied()
            .collect();
        ids.extend(
            self.history
                .read()
                .expect("tracker lock poisoned")
                .iter()
                .map(|e| e.id),
        );
        ids
    }

    /// Snapshot of live coordinators, safe to iterate without holding
    /// internal locks (§4.G).
    pub fn coordinators(&self) -> Vec<Arc<PlanCoordinator>> {
        self.live
            .read()
            .expect("tracker lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.live.read().expect("tracker lock poisoned").len()
    }

    pub fn history(&self) -> Vec<PlanHistoryEntry> {
        self.history.read().expect("tracker lock poisoned").iter().cloned().collect()
    }
}
