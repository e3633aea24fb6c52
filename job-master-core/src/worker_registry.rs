use crate::model::{WorkerAddress, WorkerId, WorkerRecord};
use std::collections::HashMap;
use std::sync::RwLock;

struct Inner {
    by_id: HashMap<WorkerId, WorkerRecord>,
    by_addr: HashMap<WorkerAddress, WorkerId>,
}

/// Worker records indexed simultaneously by id and by network address
/// (§4.C). A reader/writer lock governs the structure; both indices are
/// kept coherent under the exclusive (write) lock — neither index is ever
/// exposed independently of the lock (§9).
pub struct WorkerRegistry {
    inner: RwLock<Inner>,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                by_id: HashMap::new(),
                by_addr: HashMap::new(),
            }),
        }
    }

    /// Inserts a new record. Caller is responsible for having already
    /// removed any prior record at the same address (§3 eviction rule is
    /// enforced one level up, in the facade, so it can fail in-flight
    /// tasks on the evicted id before the id disappears from the index).
    pub fn insert(&self, record: WorkerRecord) {
        let mut inner = self.inner.write().expect("worker registry lock poisoned");
        inner.by_addr.insert(record.address.clone(), record.id);
        inner.by_id.insert(record.id, record);
    }

    pub fn remove(&self, id: WorkerId) -> Option<WorkerRecord> {
        let mut inner = self.inner.write().expect("worker registry lock poisoned");
        let record = inner.by_id.remove(&id)?;
        inner.by_addr.remove(&record.address);
        Some(record)
    }

    pub fn contains_by_addr(&self, addr: &WorkerAddress) -> bool {
        let inner = self.inner.read().expect("worker registry lock poisoned");
        inner.by_addr.contains_key(addr)
    }

    pub fn first_by_addr(&self, addr: &WorkerAddress) -> Option<WorkerRecord> {
        let inner = self.inner.read().expect("worker registry lock poisoned");
        let id = inner.by_addr.get(addr)?;
        inner.by_id.get(id).cloned()
    }

    pub fn first_by_id(&self, id: WorkerId) -> Option<WorkerRecord> {
        let inner = self.inner.read().expect("worker registry lock poisoned");
        inner.by_id.get(&id).cloned()
    }

    /// Stamps the last-heartbeat time for an existing worker. No-op if the
    /// id is unknown (caller must check `first_by_id` first if it needs to
    /// know).
    pub fn touch(&self, id: WorkerId, now_ms: u64) {
        let mut inner = self.inner.write().expect("worker registry lock poisoned");
        if let Some(record) = inner.by_id.get_mut(&id) {
            record.last_heartbeat_ms = now_ms;
        }
    }

    /// Re-checks `id`'s staleness and removes it in the same exclusive
    /// critical section (§4.I, §5): closes the race where a heartbeat's
    /// `touch` lands between an earlier read-locked staleness check and a
    /// later write-locked removal, which would otherwise evict a worker
    /// whose fresh heartbeat was never observed. Returns `true` iff the
    /// worker was removed.
    pub fn remove_if_silent(&self, id: WorkerId, now_ms: u64, timeout_ms: u64) -> bool {
        let mut inner = self.inner.write().expect("worker registry lock poisoned");
        let Some(record) = inner.by_id.get(&id) else {
            return false;
        };
        if now_ms.saturating_sub(record.last_heartbeat_ms) <= timeout_ms {
            return false;
        }
        let record = inner.by_id.remove(&id).expect("checked present above");
        inner.by_addr.remove(&record.address);
        true
    }

    /// Snapshot of every record, safe to iterate without holding the lock.
    pub fn iterate(&self) -> Vec<WorkerRecord> {
        let inner = self.inner.read().expect("worker registry lock poisoned");
        inner.by_id.values().cloned().collect()
    }

    pub fn size(&self) -> usize {
        let inner = self.inner.read().expect("worker registry lock poisoned");
        inner.by_id.len()
    }
}
