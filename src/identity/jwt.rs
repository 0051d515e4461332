use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::{AuthConfig, AuthError, Identity, IdentityResolver, Role};
use crate::location::{ReporterId, TenantId};

/// JWT claims carried by location-connection credentials
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter_id: Option<ReporterId>,
    pub exp: usize,
    pub iat: usize,
}

/// HS256 implementation of [`IdentityResolver`]
pub struct JwtIdentityResolver {
    config: AuthConfig,
}

impl JwtIdentityResolver {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Signs a credential for the given identity.
    pub fn issue(
        &self,
        user_id: u64,
        role: Role,
        tenant_id: Option<TenantId>,
        reporter_id: Option<ReporterId>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::hours(self.config.token_ttl_hours as i64);

        let claims = Claims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            tenant_id,
            reporter_id,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
    }
}

impl IdentityResolver for JwtIdentityResolver {
    fn resolve(
        &self,
        credential: &str,
        requested_tenant: Option<&str>,
    ) -> Result<Identity, AuthError> {
        let claims = decode::<Claims>(
            credential,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| AuthError::InvalidCredential(e.to_string()))?
        .claims;

        let user_id: u64 = claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidCredential("subject is not a user id".into()))?;
        let role = Role::parse(&claims.role).ok_or(AuthError::UnsupportedRole(claims.role))?;

        let tenant_id = match role {
            Role::Reporter | Role::TenantWatcher => {
                claims.tenant_id.ok_or(AuthError::MissingScope("tenant_id"))?
            }
            Role::RiderWatcher => {
                let raw = requested_tenant.ok_or(AuthError::MissingScope("tenant_id"))?;
                raw.trim()
                    .parse()
                    .map_err(|_| AuthError::InvalidScope(raw.to_string()))?
            }
        };

        let reporter_id = match role {
            Role::Reporter => Some(claims.reporter_id.unwrap_or(user_id)),
            _ => None,
        };

        Ok(Identity {
            user_id,
            role,
            tenant_id,
            reporter_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-key".to_string(),
            token_ttl_hours: 24,
        }
    }

    fn sign(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn future_exp() -> usize {
        (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize
    }

    #[test]
    fn test_reporter_identity() {
        let resolver = JwtIdentityResolver::new(test_config());
        let token = resolver.issue(10, Role::Reporter, Some(3), Some(77)).unwrap();

        let identity = resolver.resolve(&token, None).unwrap();
        assert_eq!(
            identity,
            Identity {
                user_id: 10,
                role: Role::Reporter,
                tenant_id: 3,
                reporter_id: Some(77),
            }
        );
    }

    #[test]
    fn test_reporter_id_defaults_to_user_id() {
        let resolver = JwtIdentityResolver::new(test_config());
        let token = resolver.issue(10, Role::Reporter, Some(3), None).unwrap();
        assert_eq!(resolver.resolve(&token, None).unwrap().reporter_id, Some(10));
    }

    #[test]
    fn test_tenant_watcher_ignores_requested_tenant() {
        let resolver = JwtIdentityResolver::new(test_config());
        let token = resolver.issue(5, Role::TenantWatcher, Some(3), None).unwrap();
        let identity = resolver.resolve(&token, Some("9")).unwrap();
        assert_eq!(identity.tenant_id, 3);
        assert_eq!(identity.reporter_id, None);
    }

    #[test]
    fn test_tenant_watcher_needs_tenant_claim() {
        let resolver = JwtIdentityResolver::new(test_config());
        let token = resolver.issue(5, Role::TenantWatcher, None, None).unwrap();
        assert_eq!(
            resolver.resolve(&token, None),
            Err(AuthError::MissingScope("tenant_id"))
        );
    }

    #[test]
    fn test_rider_watcher_scope() {
        let resolver = JwtIdentityResolver::new(test_config());
        let token = resolver.issue(8, Role::RiderWatcher, None, None).unwrap();

        assert_eq!(resolver.resolve(&token, Some("12")).unwrap().tenant_id, 12);
        assert_eq!(
            resolver.resolve(&token, None),
            Err(AuthError::MissingScope("tenant_id"))
        );
        assert_eq!(
            resolver.resolve(&token, Some("twelve")),
            Err(AuthError::InvalidScope("twelve".into()))
        );
    }

    #[test]
    fn test_unsupported_role() {
        let claims = Claims {
            sub: "1".into(),
            role: "admin".into(),
            tenant_id: Some(1),
            reporter_id: None,
            exp: future_exp(),
            iat: 0,
        };
        let resolver = JwtIdentityResolver::new(test_config());
        assert_eq!(
            resolver.resolve(&sign(&claims, "test-secret-key"), None),
            Err(AuthError::UnsupportedRole("admin".into()))
        );
    }

    #[test]
    fn test_wrong_secret_is_unauthenticated() {
        let token = JwtIdentityResolver::new(AuthConfig {
            jwt_secret: "different-secret".into(),
            token_ttl_hours: 24,
        })
        .issue(1, Role::Reporter, Some(1), None)
        .unwrap();

        let result = JwtIdentityResolver::new(test_config()).resolve(&token, None);
        assert!(matches!(result, Err(AuthError::InvalidCredential(_))));
    }

    #[test]
    fn test_expired_token_is_unauthenticated() {
        let claims = Claims {
            sub: "1".into(),
            role: "driver".into(),
            tenant_id: Some(1),
            reporter_id: None,
            exp: (chrono::Utc::now() - chrono::Duration::hours(2)).timestamp() as usize,
            iat: 0,
        };
        let resolver = JwtIdentityResolver::new(test_config());
        let result = resolver.resolve(&sign(&claims, "test-secret-key"), None);
        assert!(matches!(result, Err(AuthError::InvalidCredential(_))));
    }

    #[test]
    fn test_garbage_token() {
        let resolver = JwtIdentityResolver::new(test_config());
        assert!(matches!(
            resolver.resolve("not-a-token", None),
            Err(AuthError::InvalidCredential(_))
        ));
    }

    #[test]
    fn test_non_numeric_subject() {
        let claims = Claims {
            sub: "alice".into(),
            role: "driver".into(),
            tenant_id: Some(1),
            reporter_id: None,
            exp: future_exp(),
            iat: 0,
        };
        let resolver = JwtIdentityResolver::new(test_config());
        assert!(matches!(
            resolver.resolve(&sign(&claims, "test-secret-key"), None),
            Err(AuthError::InvalidCredential(_))
        ));
    }
}
