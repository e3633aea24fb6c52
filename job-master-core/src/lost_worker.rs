use crate::clock::{PeriodicRunner, ScheduleHandle};
use crate::facade::JobMaster;
use crate::model::WorkerId;
use std::sync::Arc;

/// Periodic sweep that fails tasks assigned to workers who have gone
/// silent past the configured timeout (§4.I). Runs on the schedule given
/// by `JobMasterConfig::lost_worker_interval`, driven by the same
/// `PeriodicRunner` as any other scheduled task (§4.A).
pub struct LostWorkerDetector;

impl LostWorkerDetector {
    /// Spawns the sweep onto `runner`. Dropping the returned handle does
    /// not stop it; call `cancel()` explicitly.
    pub fn spawn(runner: &PeriodicRunner, job_master: Arc<JobMaster>) -> ScheduleHandle {
        let interval_ms = job_master.config().lost_worker_interval.as_millis() as u64;
        runner.schedule("lost-worker-detector", interval_ms, move || {
            let job_master = job_master.clone();
            async move { sweep(&job_master).await }
        })
    }
}

/// Two-phase sweep (§4.I): collect candidates under the registry's shared
/// lock, instruct every live coordinator to fail that worker's tasks,
/// then re-check each candidate under the exclusive lock before evicting
/// it — a heartbeat racing the sweep may have already saved it.
async fn sweep(job_master: &JobMaster) {
    let now_ms = job_master.clock().now_ms();
    let timeout_ms = job_master.config().worker_timeout.as_millis() as u64;

    let candidates: Vec<WorkerId> = job_master
        .workers()
        .iterate()
        .into_iter()
        .filter(|w| now_ms.saturating_sub(w.last_heartbeat_ms) > timeout_ms)
        .map(|w| w.id)
        .collect();

    if candidates.is_empty() {
        return;
    }

    for worker_id in &candidates {
        for coordinator in job_master.tracker().coordinators() {
            coordinator
                .fail_tasks_for_worker(*worker_id, "worker heartbeat timed out", now_ms)
                .await;
        }
    }

    for worker_id in candidates {
        if job_master.workers().remove_if_silent(worker_id, now_ms, timeout_ms) {
            tracing::info!(worker_id = %worker_id, "worker evicted after timeout");
        }
    }
}
