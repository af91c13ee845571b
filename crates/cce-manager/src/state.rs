use std::collections::HashMap;
use std::sync::Arc;

use cce_actuator::{ClusterActuator, MachineActuator};
use cce_db::{MachineKey, PgResourceStore};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub store: PgResourceStore,
    pub machines: Arc<MachineActuator>,
    pub clusters: ClusterActuator,
    pub machine_locks: MachineLocks,
    pub config: AppConfig,
}

/// Serializes create/delete of one machine between the API and the
/// reconcile loop.
#[derive(Clone, Default)]
pub struct MachineLocks {
    inner: Arc<Mutex<HashMap<MachineKey, Arc<Mutex<()>>>>>,
}

impl MachineLocks {
    /// Wait for exclusive use of `key`. Callers re-read the machine after
    /// this returns.
    pub async fn lock(&self, key: &MachineKey) -> OwnedMutexGuard<()> {
        let slot = self.inner.lock().await.entry(key.clone()).or_default().clone();
        slot.lock_owned().await
    }

    /// Drop the slot of a machine that no longer exists.
    pub async fn forget(&self, key: &MachineKey) {
        self.inner.lock().await.remove(key);
    }
}
