use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use super::{FrameError, ReporterId};

/// One inbound GPS report as sent by a reporter device.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocationSample {
    #[serde(alias = "driver_id")]
    pub reporter_id: ReporterId,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub speed: f64,
    /// Device compass heading. Often absent or noisy, never trusted for broadcast.
    #[serde(default)]
    pub bearing: Option<f64>,
    #[serde(default)]
    pub altitude: f64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    /// Parses a text frame and rejects coordinates the geo math cannot handle.
    pub fn from_json(text: &str) -> Result<Self, FrameError> {
        let sample: LocationSample = serde_json::from_str(text)?;
        sample.validate()?;
        Ok(sample)
    }

    fn validate(&self) -> Result<(), FrameError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(FrameError::Malformed(format!(
                "latitude {} out of range",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(FrameError::Malformed(format!(
                "longitude {} out of range",
                self.longitude
            )));
        }
        Ok(())
    }
}

/// Parses an RFC 3339 timestamp, assuming UTC when no zone designator is present.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty timestamp".to_string());
    }

    let candidate = if has_zone_designator(trimmed) {
        trimmed.to_string()
    } else {
        format!("{}Z", trimmed)
    };

    DateTime::parse_from_rfc3339(&candidate)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp {:?}: {}", raw, e))
}

fn has_zone_designator(ts: &str) -> bool {
    if ts.ends_with('Z') || ts.ends_with('z') {
        return true;
    }
    // Only the time part may carry an offset; the date part is full of '-'.
    let time_part = match ts.find(['T', 't', ' ']) {
        Some(idx) => &ts[idx + 1..],
        None => return false,
    };
    time_part.contains('+') || time_part.contains('-')
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}
