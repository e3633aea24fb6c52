use serde::{Deserialize, Serialize};
use std::fmt;

/// Locally-assigned, strictly-increasing plan identifier (§4.B).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlanId(pub u64);

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Locally-assigned worker identifier, unique within the registry (§3).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task id, dense and non-negative within one plan (§3).
pub type TaskId = u32;

/// A worker's network address: the second, independent index key in the
/// worker registry (§4.C). Two records with the same address are
/// considered the same worker re-registering.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerAddress {
    pub host: String,
    pub rpc_port: u16,
    pub data_port: u16,
    pub web_port: u16,
    pub domain_socket: Option<String>,
}

impl fmt::Display for WorkerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.rpc_port)
    }
}

/// Mutable worker record held in the registry (§3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub id: WorkerId,
    pub address: WorkerAddress,
    pub last_heartbeat_ms: u64,
}

/// Terminal-or-not task state (§3). Ordering matches the roll-up priority
/// rules: CANCELED beats FAILED beats COMPLETED beats RUNNING beats CREATED.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Created,
    Running,
    Completed,
    Canceled,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Canceled | TaskState::Failed
        )
    }
}

/// Latest known status of one task (§3). `last_updated_ms` is monotonic
/// non-decreasing once the task is terminal (enforced by the coordinator,
/// not by this type).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskStatus {
    pub plan_id: PlanId,
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub worker_host: String,
    pub state: TaskState,
    pub error_message: Option<String>,
    pub result: Option<Vec<u8>>,
    pub last_updated_ms: u64,
}

/// A report posted by a worker heartbeat, or synthesized internally
/// (worker loss, startup cleanup).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskReport {
    pub plan_id: PlanId,
    pub task_id: TaskId,
    pub state: TaskState,
    pub error_message: Option<String>,
    pub result: Option<Vec<u8>>,
}

/// Derived, rolled-up status of an entire plan (§3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanStatus {
    pub id: PlanId,
    pub name: String,
    pub description: String,
    pub children: Vec<TaskStatus>,
    pub state: TaskState,
    pub error_message: Option<String>,
    pub result: Option<Vec<u8>>,
    pub last_status_change_ms: u64,
}

/// A single task assigned during plan expansion (§3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub worker_host: String,
    pub arg: Vec<u8>,
}

/// Outbound master-to-worker message (§3). Ordering to a single worker is
/// FIFO, enforced by the command manager (§4.D).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Command {
    Register,
    Start { task_id: TaskId, arg: Vec<u8> },
    Cancel { task_id: TaskId },
    Setup,
}

/// A compact record of a purged, finished plan, kept in the tracker's
/// bounded history so `list()` still surfaces recently-finished ids (§9).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanHistoryEntry {
    pub id: PlanId,
    pub name: String,
    pub final_state: TaskState,
    pub error_message: Option<String>,
    pub last_updated_ms: u64,
}

/// Grouped, ordered view over every live plan's status (§4.H `get_summary`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JobServiceSummary {
    pub created: Vec<PlanStatus>,
    pub running: Vec<PlanStatus>,
    pub completed: Vec<PlanStatus>,
    pub canceled: Vec<PlanStatus>,
    pub failed: Vec<PlanStatus>,
}
