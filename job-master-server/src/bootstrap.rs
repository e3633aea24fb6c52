use crate::config::ServerConfig;
use job_master_core::plan::{InMemoryPlanDefinitionRegistry, PlanDefinitionRegistry};
use job_master_core::{JobMaster, LostWorkerDetector, PeriodicRunner, ScheduleHandle, SystemClock};
use std::sync::Arc;

/// Everything the process needs to serve traffic, built from a config
/// value in one place. Holds the kernel's facade plus the handle for the
/// background sweep it owns.
#[derive(Clone)]
pub struct Services {
    pub job_master: Arc<JobMaster>,
}

impl Services {
    /// Builds the facade over a real `SystemClock` and starts the
    /// lost-worker detector. `definitions` is supplied by the caller
    /// because plan definitions are embedded in the binary, not loaded
    /// from config (§4.H, §9).
    pub fn new(config: &ServerConfig, definitions: Arc<dyn PlanDefinitionRegistry>) -> (Self, ScheduleHandle) {
        let clock = Arc::new(SystemClock);
        let job_master = Arc::new(JobMaster::new(config.job_master.clone(), clock, definitions));

        let runner = PeriodicRunner::new();
        let handle = LostWorkerDetector::spawn(&runner, job_master.clone());

        (Self { job_master }, handle)
    }

    /// Convenience constructor for a process with no registered plan
    /// definitions beyond an empty registry; callers that embed their own
    /// definitions should call `new` directly.
    pub fn with_empty_registry(config: &ServerConfig) -> (Self, ScheduleHandle) {
        Self::new(config, Arc::new(InMemoryPlanDefinitionRegistry::new()))
    }
}
