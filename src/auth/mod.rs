//! Authentication boundary.
//!
//! Identity is established by an external provider; this module only
//! verifies the bearer token it issued and resolves the caller into an
//! [`Actor`] carrying a role from a closed set. Every operation in the
//! service layer authorizes against explicit role allow-lists on the
//! `Actor`, independent of how the token was produced.

use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Closed set of caller roles.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Customer,
    Delivery,
    Employee,
    Admin,
}

impl Role {
    /// Staff roles may operate on orders they do not own.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Delivery | Role::Employee | Role::Admin)
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// The authenticated caller, as resolved by the auth boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

/// Claim structure for bearer tokens issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Token verification service.
#[derive(Clone)]
pub struct AuthService {
    decoding_key: Arc<DecodingKey>,
    encoding_key: Arc<EncodingKey>,
}

impl AuthService {
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            decoding_key: Arc::new(DecodingKey::from_secret(jwt_secret.as_bytes())),
            encoding_key: Arc::new(EncodingKey::from_secret(jwt_secret.as_bytes())),
        }
    }

    /// Verifies a bearer token and resolves it into an [`Actor`].
    pub fn verify_token(&self, token: &str) -> Result<Actor, ServiceError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {e}")))?;

        let id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| ServiceError::Unauthorized("invalid subject claim".to_string()))?;

        Ok(Actor::new(id, data.claims.role))
    }

    /// Issues a token for the given actor. Used by tooling and tests; in
    /// production tokens come from the external identity provider.
    pub fn issue_token(&self, actor: Actor, ttl_secs: i64) -> Result<String, ServiceError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: actor.id.to_string(),
            role: actor.role,
            iat: now,
            exp: now + ttl_secs,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::InternalError(format!("token encoding: {e}")))
    }
}

/// Middleware that resolves the `Authorization: Bearer` header into an
/// [`Actor`] request extension. Requests without a valid token are rejected
/// before reaching any handler.
pub async fn auth_middleware(
    axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".to_string()))?;

    let actor = auth.verify_token(token)?;
    debug!(actor_id = %actor.id, role = %actor.role, "Request authenticated");

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .copied()
            .ok_or_else(|| ServiceError::Unauthorized("missing authentication".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_preserves_actor() {
        let auth = AuthService::new("test_secret_key_for_auth_round_trip_checks");
        let actor = Actor::new(Uuid::new_v4(), Role::Delivery);
        let token = auth.issue_token(actor, 60).expect("token");
        let resolved = auth.verify_token(&token).expect("verify");
        assert_eq!(resolved, actor);
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = AuthService::new("test_secret_key_for_auth_expiry_checks_00");
        let actor = Actor::new(Uuid::new_v4(), Role::Customer);
        let token = auth.issue_token(actor, -3600).expect("token");
        assert!(auth.verify_token(&token).is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let auth = AuthService::new("test_secret_key_for_auth_tamper_checks_00");
        let other = AuthService::new("a_different_secret_key_for_tamper_checks0");
        let actor = Actor::new(Uuid::new_v4(), Role::Admin);
        let token = other.issue_token(actor, 60).expect("token");
        assert!(auth.verify_token(&token).is_err());
    }

    #[test]
    fn staff_roles() {
        assert!(!Role::Customer.is_staff());
        assert!(Role::Delivery.is_staff());
        assert!(Role::Employee.is_staff());
        assert!(Role::Admin.is_staff());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Delivery.is_admin());
    }
}
