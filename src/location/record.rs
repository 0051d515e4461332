use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ReporterId, SequenceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Initial,
    Move,
    Stopped,
    Started,
    Periodic,
    Insignificant,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Initial => "initial",
            EventType::Move => "move",
            EventType::Stopped => "stopped",
            EventType::Started => "started",
            EventType::Periodic => "periodic",
            EventType::Insignificant => "insignificant",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A significant sample that has not been persisted yet.
///
/// Only [`Classification::into_record`](super::Classification::into_record)
/// builds one, so a non-significant sample never reaches the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLocationRecord {
    pub reporter_id: ReporterId,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub speed: f64,
    pub bearing: f64,
    pub reported_bearing: Option<f64>,
    pub altitude: f64,
    pub is_moving: bool,
    pub distance_from_last: f64,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
}

impl NewLocationRecord {
    pub fn into_record(self, sequence_id: SequenceId, created_at: DateTime<Utc>) -> LocationRecord {
        LocationRecord {
            sequence_id,
            reporter_id: self.reporter_id,
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy: self.accuracy,
            speed: self.speed,
            bearing: self.bearing,
            reported_bearing: self.reported_bearing,
            altitude: self.altitude,
            is_moving: self.is_moving,
            distance_from_last: self.distance_from_last,
            timestamp: self.timestamp,
            event_type: self.event_type,
            created_at,
        }
    }
}

/// Append-only feed entry for a reporter. `bearing` is server computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub sequence_id: SequenceId,
    pub reporter_id: ReporterId,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub speed: f64,
    pub bearing: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_bearing: Option<f64>,
    pub altitude: f64,
    pub is_moving: bool,
    pub distance_from_last: f64,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub created_at: DateTime<Utc>,
}
