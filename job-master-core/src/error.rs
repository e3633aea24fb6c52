use crate::model::PlanId;
use job_master_common::SafeDisplay;

/// Error taxonomy for the facade's outward RPCs (§7). No error escapes the
/// master process beyond this enum — the lost-worker detector and
/// per-report application paths catch and log instead of propagating.
#[derive(Debug, thiserror::Error)]
pub enum JobMasterError {
    #[error("unknown plan name: {0}")]
    UnknownPlan(String),
    #[error("capacity exceeded")]
    CapacityExceeded,
    #[error("plan not found: {0}")]
    NotFound(PlanId),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl SafeDisplay for JobMasterError {
    fn to_safe_string(&self) -> String {
        // Every variant only ever echoes a plan name or id, never a raw
        // task/plan payload, so the safe rendering is just the Display impl.
        self.to_string()
    }
}
