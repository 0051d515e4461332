//! Per-connection protocol loops.
//!
//! The role is resolved once at upgrade time and picks the session variant;
//! the loops themselves never branch on role.

mod reporter;
mod watcher;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream};
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;

use crate::hub::Hub;
use crate::identity::{Identity, Role};
use crate::location::MovementPolicy;
use crate::storage::LocationStore;

pub use reporter::{AckStatus, Acknowledgement, ReporterSession};
pub use watcher::{WatchScope, WatcherSession};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("encoding failure: {0}")]
    Encode(#[from] serde_json::Error),
}

pub enum Session {
    Reporter(ReporterSession),
    Watcher(WatcherSession),
}

impl Session {
    pub fn for_identity(
        identity: &Identity,
        store: Arc<dyn LocationStore>,
        hub: Arc<Hub>,
        policy: MovementPolicy,
    ) -> Session {
        match identity.role {
            Role::Reporter => Session::Reporter(ReporterSession::new(
                identity.reporter_id.unwrap_or(identity.user_id),
                identity.tenant_id,
                store,
                hub,
                policy,
            )),
            Role::TenantWatcher => Session::Watcher(WatcherSession::new(
                WatchScope::Tenant,
                identity.user_id,
                identity.tenant_id,
                hub,
            )),
            Role::RiderWatcher => Session::Watcher(WatcherSession::new(
                WatchScope::Rider,
                identity.user_id,
                identity.tenant_id,
                hub,
            )),
        }
    }

    /// Runs until the peer closes or the transport fails.
    pub async fn run<W, R>(self, writer: W, reader: R) -> Result<(), SessionError>
    where
        W: Sink<Message> + Unpin,
        W::Error: Display,
        R: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        match self {
            Session::Reporter(session) => session.run(writer, reader).await,
            Session::Watcher(session) => session.run(writer, reader).await,
        }
    }
}

async fn send_json<W, T>(writer: &mut W, value: &T) -> Result<(), SessionError>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
    T: Serialize + ?Sized,
{
    let text = serde_json::to_string(value)?;
    writer
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| SessionError::Transport(e.to_string()))
}
