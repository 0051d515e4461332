use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use utoipa::ToSchema;

/// Running counters for the broadcast hub
#[derive(Debug, Default)]
pub struct HubStats {
    /// Messages accepted into the delivery queue
    published: AtomicU64,
    /// Messages shed because the queue or a watcher outbox was full
    dropped: AtomicU64,
    /// Copies handed to watcher outboxes
    delivered: AtomicU64,
    /// Watchers removed after a failed delivery
    evicted: AtomicU64,
}

impl HubStats {
    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, tenants: usize, watchers: usize) -> HubStatsSnapshot {
        HubStatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            tenants,
            watchers,
        }
    }
}

/// Point-in-time copy of [`HubStats`] plus registry size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct HubStatsSnapshot {
    pub published: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub evicted: u64,
    pub tenants: usize,
    pub watchers: usize,
}
