use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use super::message::{ConnectionId, WatcherHandle};
use crate::location::TenantId;

type TenantWatchers = HashMap<ConnectionId, WatcherHandle>;

/// Tenant id to open watcher connections.
///
/// Each tenant's set has its own lock. The outer map lock is only taken for
/// writing when a tenant entry is created or removed, so membership changes
/// on different tenants do not serialise on each other. A tenant entry never
/// stays in the map with an empty set.
#[derive(Default)]
pub struct Registry {
    tenants: RwLock<HashMap<TenantId, Arc<Mutex<TenantWatchers>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the watcher to the tenant's set, creating it on first member.
    pub fn register(&self, tenant_id: TenantId, watcher: WatcherHandle) {
        {
            let tenants = self.tenants.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = tenants.get(&tenant_id) {
                lock(slot).insert(watcher.id(), watcher);
                return;
            }
        }

        let mut tenants = self.tenants.write().unwrap_or_else(PoisonError::into_inner);
        let slot = tenants.entry(tenant_id).or_default();
        lock(slot).insert(watcher.id(), watcher);
    }

    /// Removes the watcher; drops the tenant entry once its set is empty.
    /// Returns whether the watcher was registered.
    pub fn unregister(&self, tenant_id: TenantId, connection: ConnectionId) -> bool {
        let now_empty = {
            let tenants = self.tenants.read().unwrap_or_else(PoisonError::into_inner);
            let Some(slot) = tenants.get(&tenant_id) else {
                return false;
            };
            let mut members = lock(slot);
            if members.remove(&connection).is_none() {
                return false;
            }
            members.is_empty()
        };

        if now_empty {
            let mut tenants = self.tenants.write().unwrap_or_else(PoisonError::into_inner);
            // A register may have slipped in between the two locks.
            let still_empty = tenants
                .get(&tenant_id)
                .is_some_and(|slot| lock(slot).is_empty());
            if still_empty {
                tenants.remove(&tenant_id);
            }
        }

        true
    }

    /// Copy of the tenant's current watchers, taken without holding any lock
    /// past the return so delivery I/O never runs inside the registry.
    pub fn watchers(&self, tenant_id: TenantId) -> Vec<WatcherHandle> {
        let tenants = self.tenants.read().unwrap_or_else(PoisonError::into_inner);
        tenants
            .get(&tenant_id)
            .map(|slot| lock(slot).values().cloned().collect())
            .unwrap_or_default()
    }

    /// (tenant entries, total watchers)
    pub fn size(&self) -> (usize, usize) {
        let tenants = self.tenants.read().unwrap_or_else(PoisonError::into_inner);
        let watchers = tenants.values().map(|slot| lock(slot).len()).sum();
        (tenants.len(), watchers)
    }
}

fn lock(slot: &Mutex<TenantWatchers>) -> MutexGuard<'_, TenantWatchers> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
