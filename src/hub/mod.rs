//! Broadcast hub: routes persisted location updates to the watchers of a tenant.
//!
//! Reporters publish into a bounded queue that never blocks them; a single
//! delivery task drains it and hands each message to every watcher's own
//! outbox. Watchers write to their sockets from their own tasks, so a slow
//! socket cannot hold up the queue, the registry or other watchers.

mod message;
mod registry;
mod stats;

use log::{debug, info, warn};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::location::TenantId;

pub use message::{BroadcastMessage, ConnectionId, WatcherHandle};
pub use stats::HubStatsSnapshot;

use registry::Registry;
use stats::HubStats;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HubConfig {
    /// Publish queue depth; beyond it new messages are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Per-watcher outbox depth.
    #[serde(default = "default_watcher_buffer")]
    pub watcher_buffer: usize,
}

fn default_queue_capacity() -> usize {
    100
}

fn default_watcher_buffer() -> usize {
    32
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            watcher_buffer: default_watcher_buffer(),
        }
    }
}

pub struct Hub {
    registry: Arc<Registry>,
    queue: mpsc::Sender<BroadcastMessage>,
    stats: Arc<HubStats>,
    watcher_buffer: usize,
}

impl Hub {
    /// Creates the hub and spawns its delivery task on the current runtime.
    ///
    /// The task ends once the hub is dropped and the queue is drained.
    pub fn start(config: HubConfig) -> Arc<Hub> {
        let (queue, rx) = mpsc::channel(config.queue_capacity.max(1));
        let registry = Arc::new(Registry::new());
        let stats = Arc::new(HubStats::default());

        tokio::spawn(run_delivery(rx, registry.clone(), stats.clone()));

        Arc::new(Hub {
            registry,
            queue,
            stats,
            watcher_buffer: config.watcher_buffer.max(1),
        })
    }

    pub fn watcher_buffer(&self) -> usize {
        self.watcher_buffer
    }

    pub fn register(&self, tenant_id: TenantId, watcher: WatcherHandle) {
        let id = watcher.id();
        self.registry.register(tenant_id, watcher);
        info!("Watcher {} registered for tenant {}", id, tenant_id);
    }

    pub fn unregister(&self, tenant_id: TenantId, connection: ConnectionId) {
        if self.registry.unregister(tenant_id, connection) {
            info!("Watcher {} unregistered from tenant {}", connection, tenant_id);
        }
    }

    /// Queues a message for delivery. Never blocks; drops the message when
    /// the queue is full.
    pub fn publish(&self, message: BroadcastMessage) {
        let sequence_id = message.sequence_id;
        match self.queue.try_send(message) {
            Ok(()) => {
                self.stats.record_published();
                debug!("Queued broadcast {}", sequence_id);
            }
            Err(TrySendError::Full(message)) => {
                self.stats.record_dropped();
                warn!(
                    "Broadcast queue full, dropping update {} for tenant {}",
                    message.sequence_id, message.tenant_id
                );
            }
            Err(TrySendError::Closed(message)) => {
                self.stats.record_dropped();
                warn!(
                    "Delivery task stopped, dropping update {} for tenant {}",
                    message.sequence_id, message.tenant_id
                );
            }
        }
    }

    pub fn stats(&self) -> HubStatsSnapshot {
        let (tenants, watchers) = self.registry.size();
        self.stats.snapshot(tenants, watchers)
    }
}

async fn run_delivery(
    mut rx: mpsc::Receiver<BroadcastMessage>,
    registry: Arc<Registry>,
    stats: Arc<HubStats>,
) {
    while let Some(message) = rx.recv().await {
        deliver(&registry, &stats, Arc::new(message));
    }
    info!("Broadcast delivery stopped");
}

fn deliver(registry: &Registry, stats: &HubStats, message: Arc<BroadcastMessage>) {
    let tenant_id = message.tenant_id;

    for watcher in registry.watchers(tenant_id) {
        match watcher.try_deliver(message.clone()) {
            Ok(()) => stats.record_delivered(),
            Err(TrySendError::Full(_)) => {
                stats.record_dropped();
                warn!(
                    "Watcher {} on tenant {} is lagging, dropping update {}",
                    watcher.id(),
                    tenant_id,
                    message.sequence_id
                );
            }
            Err(TrySendError::Closed(_)) => {
                registry.unregister(tenant_id, watcher.id());
                stats.record_evicted();
                warn!(
                    "Watcher {} on tenant {} is gone, removed from hub",
                    watcher.id(),
                    tenant_id
                );
            }
        }
    }
}
