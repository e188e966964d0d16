//! Snapshot store shared between the refresh loop and the query server
//!
//! The store holds exactly one current snapshot. Publishing swaps the
//! `Arc` under a write lock that is held only for the pointer swap, so a
//! reader either sees the previous snapshot or the new one, never a
//! partially built map. Readers clone the `Arc` and release the lock before
//! serializing.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{RefreshStatus, Snapshot};

/// Holder of the currently published snapshot
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
    status: RwLock<RefreshStatus>,
}

impl SnapshotStore {
    /// Create a store holding an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that starts from `snapshot`
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            status: RwLock::new(RefreshStatus::default()),
        }
    }

    /// Replace the current snapshot as a unit
    pub async fn publish(&self, snapshot: Snapshot) {
        let next = Arc::new(snapshot);
        let previous = {
            let mut current = self.current.write().await;
            std::mem::replace(&mut *current, next)
        };
        // The old snapshot is dropped here, outside the lock, unless a
        // reader still holds it.
        drop(previous);
    }

    /// Snapshot visible at call time
    pub async fn current(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }

    /// Update the refresh bookkeeping
    pub async fn update_status<F>(&self, update: F)
    where
        F: FnOnce(&mut RefreshStatus),
    {
        let mut status = self.status.write().await;
        update(&mut status);
    }

    /// Copy of the refresh bookkeeping
    pub async fn status(&self) -> RefreshStatus {
        self.status.read().await.clone()
    }
}
