use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::has_text,
};

/// Claims
///
/// The payload structure expected inside a bearer JWT. Only `sub` and `exp`
/// are required; every identity-describing claim is best-effort and resolved
/// through the fallback chains in `resolve`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the stable opaque user identifier.
    pub sub: String,
    /// Expiration time. An expired credential never resolves.
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
}

/// Actor
///
/// The resolved identity of a request. Ephemeral: derived fresh from the
/// credential on every request and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
}

/// Turns an opaque bearer credential into an `Actor`.
///
/// Fails closed: a missing header, a non-Bearer scheme, a blank token, a
/// structurally invalid or expired JWT, or a token without a subject all
/// yield `None`. Pure function of the credential and the signing secret;
/// issuer/audience trust is delegated to the external identity provider.
pub fn resolve(credential: Option<&str>, jwt_secret: &str) -> Option<Actor> {
    let header = credential?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }

    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    let claims = decode::<Claims>(token, &decoding_key, &validation)
        .ok()?
        .claims;
    if !has_text(&claims.sub) {
        return None;
    }

    // Best-effort display fields: first non-empty claim wins, ending at the
    // subject which is always present.
    let email = first_with_text(&[claims.email.as_deref(), claims.upn.as_deref()])
        .unwrap_or(&claims.sub)
        .to_string();
    let display_name = first_with_text(&[
        claims.name.as_deref(),
        claims.nickname.as_deref(),
        claims.preferred_username.as_deref(),
        Some(email.as_str()),
    ])
    .unwrap_or(&claims.sub)
    .to_string();

    Some(Actor {
        user_id: claims.sub,
        email,
        display_name,
    })
}

fn first_with_text<'a>(candidates: &[Option<&'a str>]) -> Option<&'a str> {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|value| has_text(value))
}

/// Resolves an actor from request parts, including the local development
/// bypass: in `Env::Local` an `x-user-id` header stands in for a verified
/// credential, fabricating deterministic identity fields from the raw id.
fn actor_from_parts(parts: &Parts, config: &AppConfig) -> Option<Actor> {
    if config.env == Env::Local {
        if let Some(user_id) = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .filter(|value| has_text(value))
        {
            return Some(Actor {
                user_id: user_id.to_string(),
                email: format!("{}@example.com", user_id),
                display_name: user_id.replace('-', " "),
            });
        }
    }

    let authorization = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    resolve(authorization, &config.jwt_secret)
}

/// Actor Extractor
///
/// Usable as a handler argument wherever authentication is required. Rejects
/// with a 401 JSON error body when no actor can be resolved.
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        actor_from_parts(parts, &config)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }
}

/// OptionalActor Extractor
///
/// For endpoints where authentication is optional but affects what the caller
/// may see. Never rejects; an unresolvable credential simply yields `None`.
#[derive(Debug, Clone)]
pub struct OptionalActor(pub Option<Actor>);

impl<S> FromRequestParts<S> for OptionalActor
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        Ok(OptionalActor(actor_from_parts(parts, &config)))
    }
}
