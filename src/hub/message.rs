use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::location::{
    EventType, LocationRecord, ReporterId, SequenceId, TenantId, VehicleId,
};

pub type ConnectionId = Uuid;

/// Live position update fanned out to every watcher of a tenant.
///
/// Built only from a persisted [`LocationRecord`], so watchers never see
/// data that is not in the log.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BroadcastMessage {
    pub reporter_id: ReporterId,
    /// 0 when the reporter has no vehicle assigned.
    pub vehicle_id: VehicleId,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub speed: f64,
    pub bearing: f64,
    pub altitude: f64,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub is_moving: bool,
    pub tenant_id: TenantId,
    pub sequence_id: SequenceId,
}

impl BroadcastMessage {
    pub fn from_record(
        record: &LocationRecord,
        tenant_id: TenantId,
        vehicle_id: Option<VehicleId>,
    ) -> Self {
        Self {
            reporter_id: record.reporter_id,
            vehicle_id: vehicle_id.unwrap_or(0),
            latitude: record.latitude,
            longitude: record.longitude,
            accuracy: record.accuracy,
            speed: record.speed,
            bearing: record.bearing,
            altitude: record.altitude,
            timestamp: record.timestamp,
            event_type: record.event_type,
            is_moving: record.is_moving,
            tenant_id,
            sequence_id: record.sequence_id,
        }
    }
}

/// The hub's only way into a watcher connection: its outbound queue.
#[derive(Debug, Clone)]
pub struct WatcherHandle {
    id: ConnectionId,
    outbox: mpsc::Sender<Arc<BroadcastMessage>>,
}

impl WatcherHandle {
    pub fn new(outbox: mpsc::Sender<Arc<BroadcastMessage>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            outbox,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub(super) fn try_deliver(
        &self,
        message: Arc<BroadcastMessage>,
    ) -> Result<(), mpsc::error::TrySendError<Arc<BroadcastMessage>>> {
        self.outbox.try_send(message)
    }
}
