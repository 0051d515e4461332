use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use super::api::error::ErrorResponse;
use super::api::health::HealthResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::location::location_socket,
        super::api::health::health,
        super::api::health::hub_stats,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            crate::hub::HubStatsSnapshot,
            crate::hub::BroadcastMessage,
            crate::location::EventType,
            crate::session::Acknowledgement,
            crate::session::AckStatus,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Fleet Tracker API",
        description = "Real-time vehicle location ingestion and fan-out",
        version = "0.1.0"
    ),
    tags(
        (name = "location", description = "Location WebSocket"),
        (name = "service", description = "Health and hub counters")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
