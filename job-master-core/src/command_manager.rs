use crate::model::{Command, PlanId, TaskId, WorkerId};
use dashmap::DashMap;

/// Per-worker FIFO queues of outbound commands (§4.D). Backed by a
/// `DashMap` sharded by worker id so operations on different workers never
/// contend; operations on the same worker id are serialized by the shard's
/// own lock.
#[derive(Default)]
pub struct CommandManager {
    queues: DashMap<WorkerId, Vec<Command>>,
}

impl CommandManager {
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
        }
    }

    fn submit(&self, worker_id: WorkerId, command: Command) {
        self.queues.entry(worker_id).or_default().push(command);
    }

    pub fn submit_register(&self, worker_id: WorkerId) {
        self.submit(worker_id, Command::Register);
    }

    pub fn submit_run_task(
        &self,
        worker_id: WorkerId,
        _plan_id: PlanId,
        task_id: TaskId,
        arg: Vec<u8>,
    ) {
        self.submit(worker_id, Command::Start { task_id, arg });
    }

    pub fn submit_cancel_task(&self, worker_id: WorkerId, _plan_id: PlanId, task_id: TaskId) {
        self.submit(worker_id, Command::Cancel { task_id });
    }

    /// Atomically drains and returns the queue for `worker_id`, leaving it
    /// empty. Order matches insertion order (§4.D).
    pub fn poll_all(&self, worker_id: WorkerId) -> Vec<Command> {
        match self.queues.get_mut(&worker_id) {
            Some(mut queue) => std::mem::take(queue.value_mut()),
            None => Vec::new(),
        }
    }
}
