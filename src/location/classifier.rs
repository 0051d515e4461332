use serde::Deserialize;

use super::{EventType, LocationRecord, LocationSample, NewLocationRecord};
use crate::geo;

/// Thresholds deciding whether a sample is worth persisting.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MovementPolicy {
    #[serde(default = "default_min_distance_m")]
    pub min_distance_m: f64,
    #[serde(default = "default_min_elapsed_s")]
    pub min_elapsed_s: f64,
    #[serde(default = "default_min_moving_speed_mps")]
    pub min_moving_speed_mps: f64,
    #[serde(default = "default_max_stopped_speed_mps")]
    pub max_stopped_speed_mps: f64,
    #[serde(default = "default_heartbeat_s")]
    pub heartbeat_s: f64,
}

fn default_min_distance_m() -> f64 {
    5.0
}

fn default_min_elapsed_s() -> f64 {
    10.0
}

fn default_min_moving_speed_mps() -> f64 {
    0.5
}

fn default_max_stopped_speed_mps() -> f64 {
    1.0
}

fn default_heartbeat_s() -> f64 {
    60.0
}

impl Default for MovementPolicy {
    fn default() -> Self {
        Self {
            min_distance_m: default_min_distance_m(),
            min_elapsed_s: default_min_elapsed_s(),
            min_moving_speed_mps: default_min_moving_speed_mps(),
            max_stopped_speed_mps: default_max_stopped_speed_mps(),
            heartbeat_s: default_heartbeat_s(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub significant: bool,
    pub event_type: EventType,
    pub distance_m: f64,
    pub bearing_deg: f64,
    /// Reported speed clamped to be non-negative.
    pub speed_mps: f64,
    pub is_moving: bool,
}

impl Classification {
    /// Builds the record to persist, or `None` when the sample is not significant.
    pub fn into_record(self, sample: &LocationSample) -> Option<NewLocationRecord> {
        if !self.significant {
            return None;
        }
        Some(NewLocationRecord {
            reporter_id: sample.reporter_id,
            latitude: sample.latitude,
            longitude: sample.longitude,
            accuracy: sample.accuracy,
            speed: self.speed_mps,
            bearing: self.bearing_deg,
            reported_bearing: sample.bearing,
            altitude: sample.altitude,
            is_moving: self.is_moving,
            distance_from_last: self.distance_m,
            timestamp: sample.timestamp,
            event_type: self.event_type,
        })
    }
}

impl MovementPolicy {
    /// Decides whether `current` is significant relative to the reporter's last record.
    ///
    /// Rules are checked in order and the first match wins:
    /// no previous record, displacement, stop, start, heartbeat.
    pub fn classify(
        &self,
        previous: Option<&LocationRecord>,
        current: &LocationSample,
    ) -> Classification {
        let speed = current.speed.max(0.0);

        let Some(previous) = previous else {
            return Classification {
                significant: true,
                event_type: EventType::Initial,
                distance_m: 0.0,
                bearing_deg: 0.0,
                speed_mps: speed,
                is_moving: speed >= self.min_moving_speed_mps,
            };
        };

        let distance = geo::distance_meters(
            previous.latitude,
            previous.longitude,
            current.latitude,
            current.longitude,
        );
        let bearing = geo::bearing_degrees(
            previous.latitude,
            previous.longitude,
            current.latitude,
            current.longitude,
        );
        let elapsed =
            (current.timestamp - previous.timestamp).num_milliseconds() as f64 / 1000.0;

        let event_type = if distance >= self.min_distance_m {
            EventType::Move
        } else if previous.is_moving
            && speed < self.max_stopped_speed_mps
            && elapsed >= self.min_elapsed_s
        {
            EventType::Stopped
        } else if !previous.is_moving
            && speed >= self.min_moving_speed_mps
            && elapsed >= self.min_elapsed_s
        {
            EventType::Started
        } else if elapsed >= self.heartbeat_s {
            EventType::Periodic
        } else {
            EventType::Insignificant
        };

        // A stop must clear the flag even when the speed is still above the
        // moving threshold, or the stop rule would fire again on the next sample.
        let is_moving = match event_type {
            EventType::Move | EventType::Started => true,
            EventType::Stopped => false,
            _ => speed >= self.min_moving_speed_mps,
        };

        Classification {
            significant: event_type != EventType::Insignificant,
            event_type,
            distance_m: distance,
            bearing_deg: bearing,
            speed_mps: speed,
            is_moving,
        }
    }
}
