use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-entity mutual exclusion for load-modify-save sequences.
///
/// Two mutations of the same product never interleave inside one process. Entries are
/// dropped from the map as soon as nobody holds or waits on them.
#[derive(Clone, Default)]
pub struct EntityLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

pub struct EntityGuard {
    locks: EntityLocks,
    id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, id: &str) -> EntityGuard {
        // Clone the mutex out so the shard lock is not held across the await.
        let mutex = self.inner.entry(id.to_string()).or_default().value().clone();
        let guard = mutex.lock_owned().await;
        EntityGuard {
            locks: self.clone(),
            id: id.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of ids currently held or waited on.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Drop for EntityGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .inner
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
