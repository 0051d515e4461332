mod jwt;

use serde::Deserialize;
use thiserror::Error;

use crate::location::{ReporterId, TenantId};

pub use jwt::JwtIdentityResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Reporter,
    TenantWatcher,
    RiderWatcher,
}

impl Role {
    /// Accepts both the canonical names and the legacy driver/sacco/commuter ones.
    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "reporter" | "driver" => Some(Role::Reporter),
            "tenant_watcher" | "sacco" | "fleet" => Some(Role::TenantWatcher),
            "rider_watcher" | "commuter" | "rider" => Some(Role::RiderWatcher),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reporter => "reporter",
            Role::TenantWatcher => "tenant_watcher",
            Role::RiderWatcher => "rider_watcher",
        }
    }
}

/// Who is on the other end of a connection, as established at upgrade time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: u64,
    pub role: Role,
    pub tenant_id: TenantId,
    /// Set for reporters only.
    pub reporter_id: Option<ReporterId>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    #[error("role {0:?} may not open a location connection")]
    UnsupportedRole(String),
    #[error("missing required scope parameter {0}")]
    MissingScope(&'static str),
    #[error("invalid scope parameter {0:?}")]
    InvalidScope(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,
}

fn default_token_ttl_hours() -> u64 {
    72
}

/// Resolves a bearer credential into an [`Identity`].
pub trait IdentityResolver: Send + Sync {
    /// `requested_tenant` is the caller-supplied tenant to monitor; only
    /// rider watchers use it.
    fn resolve(
        &self,
        credential: &str,
        requested_tenant: Option<&str>,
    ) -> Result<Identity, AuthError>;
}
