use axum::extract::ws::Message;
use futures::{Sink, Stream, StreamExt};
use log::{info, warn};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{send_json, SessionError};
use crate::hub::{BroadcastMessage, ConnectionId, Hub, WatcherHandle};
use crate::location::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchScope {
    /// Fleet operator watching its own tenant
    Tenant,
    /// Rider following a tenant they picked
    Rider,
}

impl std::fmt::Display for WatchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchScope::Tenant => f.write_str("tenant"),
            WatchScope::Rider => f.write_str("rider"),
        }
    }
}

/// Receive-only connection: forwards hub broadcasts for one tenant.
pub struct WatcherSession {
    scope: WatchScope,
    user_id: u64,
    tenant_id: TenantId,
    hub: Arc<Hub>,
}

/// Unregisters on drop, so every exit path (errors, panics, a cancelled
/// task) leaves the registry clean.
struct Registration {
    hub: Arc<Hub>,
    tenant_id: TenantId,
    connection: ConnectionId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.hub.unregister(self.tenant_id, self.connection);
    }
}

impl WatcherSession {
    pub fn new(scope: WatchScope, user_id: u64, tenant_id: TenantId, hub: Arc<Hub>) -> Self {
        Self {
            scope,
            user_id,
            tenant_id,
            hub,
        }
    }

    pub async fn run<W, R>(self, mut writer: W, mut reader: R) -> Result<(), SessionError>
    where
        W: Sink<Message> + Unpin,
        W::Error: Display,
        R: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        let (tx, mut outbox) = mpsc::channel(self.hub.watcher_buffer());
        let handle = WatcherHandle::new(tx);
        let _registration = Registration {
            hub: self.hub.clone(),
            tenant_id: self.tenant_id,
            connection: handle.id(),
        };
        self.hub.register(self.tenant_id, handle);

        info!(
            "{} watcher (user {}) monitoring tenant {}",
            self.scope, self.user_id, self.tenant_id
        );

        let result = self.pump(&mut writer, &mut reader, &mut outbox).await;

        info!(
            "{} watcher (user {}) on tenant {} disconnected",
            self.scope, self.user_id, self.tenant_id
        );
        result
    }

    async fn pump<W, R>(
        &self,
        writer: &mut W,
        reader: &mut R,
        outbox: &mut mpsc::Receiver<Arc<BroadcastMessage>>,
    ) -> Result<(), SessionError>
    where
        W: Sink<Message> + Unpin,
        W::Error: Display,
        R: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        loop {
            tokio::select! {
                frame = reader.next() => match frame {
                    None | Some(Ok(Message::Close(_))) => return Ok(()),
                    Some(Err(e)) => return Err(SessionError::Transport(e.to_string())),
                    Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                        warn!(
                            "{} watcher (user {}) sent an unexpected message, ignoring",
                            self.scope, self.user_id
                        );
                    }
                    Some(Ok(_)) => {}
                },
                message = outbox.recv() => match message {
                    Some(message) => send_json(writer, message.as_ref()).await?,
                    // The hub dropped us after a failed delivery.
                    None => return Ok(()),
                },
            }
        }
    }
}
