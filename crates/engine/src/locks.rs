//! Per-session mutual exclusion.

use dashmap::DashMap;
use ridelog_core::UploadId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<UploadId, Arc<Mutex<()>>>;

/// One async mutex per session id, created on demand.
///
/// Different sessions never share a lock. An entry lives only while a
/// holder or waiter references it.
#[derive(Clone, Default)]
pub struct SessionLocks {
    inner: Arc<LockMap>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn acquire(&self, id: UploadId) -> SessionGuard {
        let lock = Arc::clone(&self.inner.entry(id).or_default());
        let guard = lock.lock_owned().await;
        SessionGuard {
            id,
            map: Arc::clone(&self.inner),
            guard: Some(guard),
        }
    }

    /// Number of sessions currently held or awaited.
    pub fn in_flight(&self) -> usize {
        self.inner.len()
    }
}

/// Exclusive access to one session. Released on drop.
pub struct SessionGuard {
    id: UploadId,
    map: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SessionGuard {
    pub fn id(&self) -> UploadId {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        // Release first so the guard's reference no longer counts.
        self.guard.take();
        self.map
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
