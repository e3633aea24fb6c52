//! Request/response shapes for the facade's outward RPCs (§6). These are
//! plain `serde`-derived structs over `job_master_core::model` types —
//! encoding them onto an actual wire (protobuf or otherwise) and the
//! transport that carries them remain external collaborators.

use job_master_core::model::{Command, JobServiceSummary, PlanId, PlanStatus, TaskReport, WorkerAddress, WorkerId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRequest {
    pub plan_name: String,
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub plan_id: PlanId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CancelRequest {
    pub plan_id: PlanId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListAllResponse {
    pub plan_ids: Vec<PlanId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetJobStatusRequest {
    pub plan_id: PlanId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetJobStatusResponse {
    pub status: PlanStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetJobServiceSummaryResponse {
    pub summary: JobServiceSummary,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterWorkerRequest {
    pub address: WorkerAddress,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterWorkerResponse {
    pub worker_id: WorkerId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub worker_id: WorkerId,
    pub reports: Vec<TaskReport>,
}

/// A response carrying a single `REGISTER` command means "forget your id
/// and re-register" (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub commands: Vec<Command>,
}
