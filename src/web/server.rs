use axum::{routing::get, Router};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::hub::Hub;
use crate::identity::JwtIdentityResolver;
use crate::storage::{JournalStore, StorageError};

use super::api::health as health_handlers;
use super::api::location as location_handlers;
use super::api_doc::ApiDoc;
use super::auth::AppState;
use super::config::Config;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws/location", get(location_handlers::location_socket))
        .route("/api/health", get(health_handlers::health))
        .route("/api/hub/stats", get(health_handlers::hub_stats))
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: Config) -> Result<(), ServerError> {
    let bind_addr = config.web.bind.clone();

    let store = JournalStore::open(config.storage.journal_folder.clone(), config.vehicle_map())?;
    log::info!(
        "Journal opened at {} ({} vehicle assignments)",
        config.storage.journal_folder.display(),
        config.vehicles.len()
    );

    let hub = Hub::start(config.hub);
    let identity = JwtIdentityResolver::new(config.auth.clone());

    let state = AppState {
        config: Arc::new(config),
        store: Arc::new(store),
        hub,
        identity: Arc::new(identity),
    };

    log::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}
