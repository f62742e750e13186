use crate::{errors::ApiError, AppState};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// JWT claims carried by bearer tokens.
///
/// Token issuance lives with the identity provider; this API only
/// verifies. `issue_token` below exists for tooling and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
    /// Staff flag: grants moderation, statistics and catalog writes
    pub staff: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller extracted from a verified bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub is_staff: bool,
}

/// Optional caller: anonymous requests yield `MaybeUser(None)`, while a
/// present-but-invalid token is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

/// Caller that must hold the staff flag.
#[derive(Debug, Clone)]
pub struct StaffUser(pub CurrentUser);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::trim)
}

fn verify(token: &str, secret: &str) -> Result<CurrentUser, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| ApiError::Unauthorized(format!("invalid token: {e}")))?;

    let id = Uuid::parse_str(&data.claims.sub)
        .map_err(|_| ApiError::Unauthorized("invalid token subject".to_string()))?;

    Ok(CurrentUser {
        id,
        email: data.claims.email,
        name: data.claims.name,
        is_staff: data.claims.staff,
    })
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))?;
        verify(token, &state.config.jwt_secret)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) => Ok(MaybeUser(Some(verify(token, &state.config.jwt_secret)?))),
            None => Ok(MaybeUser(None)),
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for StaffUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(ApiError::Forbidden("staff access required".to_string()));
        }
        Ok(StaffUser(user))
    }
}

/// Mint an HS256 token for the given identity. Development and test
/// convenience mirroring what the identity provider issues.
pub fn issue_token(
    secret: &str,
    user_id: Uuid,
    email: &str,
    staff: bool,
    ttl_secs: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        name: None,
        staff,
        iat: now,
        exp: now + ttl_secs,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_key_for_testing_purposes_only";

    #[test]
    fn issued_token_round_trips() {
        let id = Uuid::new_v4();
        let token = issue_token(SECRET, id, "buyer@example.com", false, 3600).unwrap();
        let user = verify(&token, SECRET).expect("token should verify");
        assert_eq!(user.id, id);
        assert_eq!(user.email, "buyer@example.com");
        assert!(!user.is_staff);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = issue_token(SECRET, Uuid::new_v4(), "a@b.c", true, 3600).unwrap();
        assert!(verify(&token, "another_secret_entirely_of_sufficient_len").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token(SECRET, Uuid::new_v4(), "a@b.c", false, -120).unwrap();
        assert!(verify(&token, SECRET).is_err());
    }
}
