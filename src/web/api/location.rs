use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use log::{info, warn};

use crate::identity::Identity;
use crate::session::Session;
use crate::web::api::error::ErrorResponse;
use crate::web::auth::{AppState, AuthenticatedConnection, ConnectQuery};

#[utoipa::path(
    get,
    path = "/ws/location",
    params(ConnectQuery),
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 101, description = "Switching to the location protocol"),
        (status = 400, description = "Missing or invalid tenant scope", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 403, description = "Role may not open a location connection", body = ErrorResponse)
    ),
    tag = "location"
)]
pub async fn location_socket(
    State(state): State<AppState>,
    AuthenticatedConnection { identity }: AuthenticatedConnection,
    upgrade: WebSocketUpgrade,
) -> Response {
    let session = Session::for_identity(
        &identity,
        state.store.clone(),
        state.hub.clone(),
        state.config.policy,
    );

    let user_id = identity.user_id;
    upgrade
        .on_failed_upgrade(move |e| {
            warn!("WebSocket upgrade failed for user {}: {}", user_id, e);
        })
        .on_upgrade(move |socket| supervise(socket, identity, session))
}

/// Owns the socket for the lifetime of one connection.
async fn supervise(socket: WebSocket, identity: Identity, session: Session) {
    info!(
        "{} connection opened (user {}, tenant {})",
        identity.role.as_str(),
        identity.user_id,
        identity.tenant_id
    );

    let (mut writer, mut reader) = socket.split();
    match session.run(&mut writer, &mut reader).await {
        Ok(()) => info!(
            "{} connection closed (user {})",
            identity.role.as_str(),
            identity.user_id
        ),
        Err(e) => warn!(
            "{} connection (user {}) ended with error: {}",
            identity.role.as_str(),
            identity.user_id,
            e
        ),
    }

    // The peer may already be gone.
    let _ = writer.close().await;
}
