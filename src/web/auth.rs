use axum::{
    extract::{FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::hub::Hub;
use crate::identity::{AuthError, Identity, IdentityResolver};
use crate::storage::LocationStore;

use super::api::error::ErrorResponse;
use super::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn LocationStore>,
    pub hub: Arc<Hub>,
    pub identity: Arc<dyn IdentityResolver>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::MissingCredential | AuthError::InvalidCredential(_) => {
                (StatusCode::UNAUTHORIZED, "unauthenticated")
            }
            AuthError::UnsupportedRole(_) => (StatusCode::FORBIDDEN, "unauthorized_role"),
            AuthError::MissingScope(_) => (StatusCode::BAD_REQUEST, "missing_scope"),
            AuthError::InvalidScope(_) => (StatusCode::BAD_REQUEST, "invalid_scope"),
        };
        (
            status,
            Json(ErrorResponse::with_message(code, &self.to_string())),
        )
            .into_response()
    }
}

/// Query parameters accepted on the location socket upgrade.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConnectQuery {
    /// Bearer credential, for clients that cannot set headers on an upgrade
    pub token: Option<String>,
    /// Tenant to monitor (rider watchers only)
    #[serde(alias = "sacco_id")]
    pub tenant_id: Option<String>,
}

/// A connection whose credential resolved to a supported identity.
pub struct AuthenticatedConnection {
    pub identity: Identity,
}

impl FromRequestParts<AppState> for AuthenticatedConnection {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<ConnectQuery>::try_from_uri(&parts.uri)
            .map_err(|e| AuthError::InvalidScope(e.body_text()))?;

        let credential = extract_credential(&parts.headers, &query)?;
        let identity = state
            .identity
            .resolve(credential, query.tenant_id.as_deref())
            .inspect_err(|e| log::warn!("Location connection rejected: {}", e))?;

        Ok(AuthenticatedConnection { identity })
    }
}

/// Bearer header first, then the `token` query parameter.
pub fn extract_credential<'a>(
    headers: &'a HeaderMap,
    query: &'a ConnectQuery,
) -> Result<&'a str, AuthError> {
    if let Some(value) = headers.get(AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| AuthError::InvalidCredential("invalid Authorization header".into()))?;
        let token = value.strip_prefix("Bearer ").ok_or_else(|| {
            AuthError::InvalidCredential("invalid Authorization format".into())
        })?;
        return Ok(token.trim());
    }

    match query.token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MissingCredential),
    }
}
