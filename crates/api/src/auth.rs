//! Bearer tokens and authentication extractors.
//!
//! A token is `base64url(claims) + "." + hex(HMAC-SHA256(key, base64url(claims)))`
//! where the claims are `{ "sub": <user id>, "exp": <unix seconds> }`. Roles
//! are never carried in the token; the user is reloaded on every request.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use common::UserId;
use domain::{DomainError, Store, User};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::error::ApiError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Longest accepted token lifetime: 30 days.
pub const MAX_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Reasons a token is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid signing key")]
    InvalidKey,
    #[error("token lifetime out of range")]
    InvalidTtl,
    #[error("malformed token")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub exp: i64,
}

/// A freshly signed token and its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies bearer tokens.
#[derive(Clone)]
pub struct TokenSigner {
    mac: HmacSha256,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(key: &[u8], ttl_secs: u64) -> Result<Self, TokenError> {
        let mac = HmacSha256::new_from_slice(key).map_err(|_| TokenError::InvalidKey)?;
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&ttl_secs) {
            return Err(TokenError::InvalidTtl);
        }
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or(TokenError::InvalidTtl)?;
        Ok(Self { mac, ttl })
    }

    /// Issues a token for `user_id` valid until `now + ttl`.
    pub fn issue(&self, user_id: UserId, now: DateTime<Utc>) -> IssuedToken {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user_id,
            exp: expires_at.timestamp(),
        };
        // Serializing a UUID and an integer cannot fail.
        let json = serde_json::to_vec(&claims).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = hex::encode(self.sign(&payload));
        IssuedToken {
            token: format!("{payload}.{signature}"),
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or(expires_at),
        }
    }

    /// Checks the signature and expiry of `token`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)?;
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn sign(&self, payload: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Extracts the bearer token, if an `Authorization` header is present.
fn bearer_token(parts: &Parts) -> Option<Result<&str, ApiError>> {
    let value = parts.headers.get(AUTHORIZATION)?;
    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
        .ok_or_else(ApiError::unauthorized);
    Some(token)
}

async fn authenticate<S: Store>(state: &AppState<S>, token: &str) -> Result<User, ApiError> {
    let claims = state.tokens.verify(token, Utc::now()).map_err(|e| {
        tracing::warn!(reason = %e, "bearer token rejected");
        ApiError::unauthorized()
    })?;

    let user = match state.identity.get_user(claims.sub).await {
        Ok(user) => user,
        Err(DomainError::NotFound { .. }) => {
            tracing::warn!(user_id = %claims.sub, "token subject no longer exists");
            return Err(ApiError::unauthorized());
        }
        Err(e) => return Err(e.into()),
    };
    if !user.is_active {
        tracing::warn!(user_id = %user.id, "token presented for deactivated user");
        return Err(ApiError::unauthorized());
    }
    Ok(user)
}

/// Extractor that requires a valid bearer token for an active user.
pub struct AuthUser(pub User);

impl<S: Store> FromRequestParts<Arc<AppState<S>>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(ApiError::unauthorized)??;
        authenticate(state, token).await.map(Self)
    }
}

/// Extractor for endpoints that are public but show more to admins.
///
/// No header yields `None`; a header with a bad token is still rejected.
pub struct MaybeAuthUser(pub Option<User>);

impl MaybeAuthUser {
    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(User::is_admin)
    }
}

impl<S: Store> FromRequestParts<Arc<AppState<S>>> for MaybeAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            None => Ok(Self(None)),
            Some(token) => {
                let user = authenticate(state, token?).await?;
                Ok(Self(Some(user)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new(b"0123456789abcdef0123456789abcdef", 3600).unwrap()
    }

    #[test]
    fn issued_token_verifies() {
        let signer = signer();
        let now = Utc::now();
        let user_id = UserId::new();

        let issued = signer.issue(user_id, now);
        let claims = signer.verify(&issued.token, now).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
        assert_eq!(issued.expires_at.timestamp(), (now + Duration::seconds(3600)).timestamp());
    }

    #[test]
    fn token_has_payload_and_hex_signature() {
        let issued = signer().issue(UserId::new(), Utc::now());
        let (payload, signature) = issued.token.split_once('.').unwrap();

        let claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
        assert!(claims.get("sub").is_some());
        assert!(claims.get("exp").is_some());
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = signer();
        let issued_at = Utc::now() - Duration::seconds(7200);
        let issued = signer.issue(UserId::new(), issued_at);
        assert_eq!(signer.verify(&issued.token, Utc::now()), Err(TokenError::Expired));
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let signer = signer();
        let now = Utc::now();
        let issued = signer.issue(UserId::new(), now);
        let (_, signature) = issued.token.split_once('.').unwrap();

        let forged = Claims {
            sub: UserId::new(),
            exp: now.timestamp() + 3600,
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let token = format!("{payload}.{signature}");

        assert_eq!(signer.verify(&token, now), Err(TokenError::BadSignature));
    }

    #[test]
    fn token_from_another_key_is_rejected() {
        let other = TokenSigner::new(b"another-key-another-key-another!", 3600).unwrap();
        let now = Utc::now();
        let issued = other.issue(UserId::new(), now);
        assert_eq!(signer().verify(&issued.token, now), Err(TokenError::BadSignature));
    }

    #[test]
    fn lifetime_out_of_range_is_refused() {
        let key = b"0123456789abcdef0123456789abcdef";
        assert!(matches!(
            TokenSigner::new(key, 10_000_000_000_000),
            Err(TokenError::InvalidTtl)
        ));
        assert!(matches!(TokenSigner::new(key, 0), Err(TokenError::InvalidTtl)));

        let longest = TokenSigner::new(key, MAX_TOKEN_TTL_SECS).unwrap();
        let now = Utc::now();
        let issued = longest.issue(UserId::new(), now);
        assert!(longest.verify(&issued.token, now).is_ok());
    }

    #[test]
    fn garbage_is_malformed() {
        let signer = signer();
        let now = Utc::now();
        assert_eq!(signer.verify("no-dot-here", now), Err(TokenError::Malformed));
        assert_eq!(signer.verify("abc.not-hex", now), Err(TokenError::Malformed));
    }
}
