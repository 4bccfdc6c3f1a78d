use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::dao::{
    settings_store::SettingsStore,
    storage::{StorageError, StorageResult},
};

/// Holder for the remote store handle, plus the degraded flag tracking its health.
pub struct RemoteSlot {
    store: RwLock<Option<Arc<dyn SettingsStore>>>,
    degraded: watch::Sender<bool>,
}

impl RemoteSlot {
    /// Start in degraded mode until a store is installed.
    pub fn new() -> Self {
        let (degraded_tx, _rx) = watch::channel(true);
        Self {
            store: RwLock::new(None),
            degraded: degraded_tx,
        }
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn current(&self) -> Option<Arc<dyn SettingsStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Like [`Self::current`], failing with [`StorageError::NotConnected`] when no store is installed.
    pub async fn require(&self) -> StorageResult<Arc<dyn SettingsStore>> {
        self.current().await.ok_or(StorageError::NotConnected)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install(&self, store: Arc<dyn SettingsStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.set_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.set_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag; returns whether it changed.
    pub fn set_degraded(&self, value: bool) -> bool {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        })
    }
}

impl Default for RemoteSlot {
    fn default() -> Self {
        Self::new()
    }
}
