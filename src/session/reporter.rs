use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use futures::{Sink, Stream, StreamExt};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use utoipa::ToSchema;

use super::{send_json, SessionError};
use crate::hub::{BroadcastMessage, Hub};
use crate::location::{
    Classification, EventType, FrameError, LocationRecord, LocationSample, MovementPolicy,
    ReporterId, SequenceId, TenantId,
};
use crate::storage::LocationStore;
use crate::web::api::error::ErrorResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Saved,
    Ignored,
}

/// Reply to every accepted reporter frame.
#[derive(Debug, Serialize, ToSchema)]
pub struct Acknowledgement {
    pub status: AckStatus,
    pub event_type: EventType,
    pub distance: f64,
    pub is_moving: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_id: Option<SequenceId>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Ack(Acknowledgement),
    Error(ErrorResponse),
}

impl Reply {
    fn saved(record: &LocationRecord) -> Self {
        Reply::Ack(Acknowledgement {
            status: AckStatus::Saved,
            event_type: record.event_type,
            distance: record.distance_from_last,
            is_moving: record.is_moving,
            timestamp: record.timestamp,
            sequence_id: Some(record.sequence_id),
        })
    }

    fn ignored(classification: &Classification, sample: &LocationSample) -> Self {
        Reply::Ack(Acknowledgement {
            status: AckStatus::Ignored,
            event_type: classification.event_type,
            distance: classification.distance_m,
            is_moving: classification.is_moving,
            timestamp: sample.timestamp,
            sequence_id: None,
        })
    }

    fn error(code: &str, message: &str) -> Self {
        Reply::Error(ErrorResponse::with_message(code, message))
    }
}

/// Ingests samples from one authenticated reporter device.
pub struct ReporterSession {
    reporter_id: ReporterId,
    tenant_id: TenantId,
    store: Arc<dyn LocationStore>,
    hub: Arc<Hub>,
    policy: MovementPolicy,
}

impl ReporterSession {
    pub fn new(
        reporter_id: ReporterId,
        tenant_id: TenantId,
        store: Arc<dyn LocationStore>,
        hub: Arc<Hub>,
        policy: MovementPolicy,
    ) -> Self {
        Self {
            reporter_id,
            tenant_id,
            store,
            hub,
            policy,
        }
    }

    pub async fn run<W, R>(self, mut writer: W, mut reader: R) -> Result<(), SessionError>
    where
        W: Sink<Message> + Unpin,
        W::Error: Display,
        R: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        info!(
            "Reporter {} connected (tenant {})",
            self.reporter_id, self.tenant_id
        );

        while let Some(frame) = reader.next().await {
            let frame = frame.map_err(|e| SessionError::Transport(e.to_string()))?;
            let reply = match frame {
                Message::Text(text) => self.handle_frame(text.as_str()).await,
                Message::Binary(_) => {
                    Reply::error("unsupported_frame", "location frames must be JSON text")
                }
                Message::Close(_) => break,
                Message::Ping(_) | Message::Pong(_) => continue,
            };
            send_json(&mut writer, &reply).await?;
        }

        info!("Reporter {} disconnected", self.reporter_id);
        Ok(())
    }

    /// Processes one text frame. Every failure here is reported back and
    /// leaves the connection open.
    pub async fn handle_frame(&self, text: &str) -> Reply {
        let sample = match self.accept(text) {
            Ok(sample) => sample,
            Err(e @ FrameError::Malformed(_)) => {
                warn!("Reporter {} sent a malformed frame: {}", self.reporter_id, e);
                return Reply::error("malformed_frame", &e.to_string());
            }
            Err(e @ FrameError::IdentityMismatch { .. }) => {
                warn!("security: rejected frame on reporter connection: {}", e);
                return Reply::error("identity_mismatch", "unauthorized location update");
            }
        };

        let previous = match self.store.last_for_reporter(self.reporter_id) {
            Ok(previous) => previous,
            Err(e) => {
                error!(
                    "Failed to fetch last location for reporter {}: {}",
                    self.reporter_id, e
                );
                return Reply::error("persistence_failure", "could not read last location");
            }
        };

        let classification = self.policy.classify(previous.as_ref(), &sample);
        let Some(new_record) = classification.into_record(&sample) else {
            debug!(
                "Reporter {} sample not significant ({:.2} m, {:.2} m/s)",
                self.reporter_id, classification.distance_m, classification.speed_mps
            );
            return Reply::ignored(&classification, &sample);
        };

        // The journal syncs to disk, so keep it off the runtime's worker threads.
        let store = self.store.clone();
        let appended = tokio::task::spawn_blocking(move || store.append(new_record)).await;
        let record = match appended {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                error!(
                    "Failed to save location for reporter {}: {}",
                    self.reporter_id, e
                );
                return Reply::error("persistence_failure", "failed to save location");
            }
            Err(e) => {
                error!(
                    "Location write task for reporter {} did not complete: {}",
                    self.reporter_id, e
                );
                return Reply::error("persistence_failure", "failed to save location");
            }
        };

        let vehicle_id = self.store.vehicle_for_reporter(self.reporter_id);
        self.hub.publish(BroadcastMessage::from_record(
            &record,
            self.tenant_id,
            vehicle_id,
        ));

        info!(
            "Reporter {} location saved: {} #{} ({:.2} m, bearing {:.2})",
            self.reporter_id,
            record.event_type,
            record.sequence_id,
            record.distance_from_last,
            record.bearing
        );
        Reply::saved(&record)
    }

    fn accept(&self, text: &str) -> Result<LocationSample, FrameError> {
        let sample = LocationSample::from_json(text)?;
        if sample.reporter_id != self.reporter_id {
            return Err(FrameError::IdentityMismatch {
                claimed: sample.reporter_id,
                authenticated: self.reporter_id,
            });
        }
        Ok(sample)
    }
}
