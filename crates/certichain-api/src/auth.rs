//! # Tokens, Caller Identity & Authentication Middleware
//!
//! ## Token Format
//!
//! HS256 JWTs with two audiences:
//!
//! | Audience | Issued by | Claims |
//! |----------|-----------|--------|
//! | `registration` | Initiate | `sub` (email), `name`, `pk` (public key), `jti` (registration nonce) |
//! | `session` | Login | `sub` (email), `name`, `addr` (ledger address), `jti` (session id) |
//!
//! Both carry `iat`/`exp` with a one-hour validity window. A token is only
//! accepted for the audience it was minted for, so a registration link can
//! never be replayed as a session.
//!
//! ## CallerIdentity
//!
//! Every authenticated request gets a [`CallerIdentity`] injected into the
//! request extensions by [`auth_middleware`]. Handlers extract it via the
//! `FromRequestParts` impl.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use certichain_core::{Email, LedgerAddress};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::AppError;
use crate::state::AppState;

/// Name of the HTTP-only session cookie.
pub const SESSION_COOKIE: &str = "certichain_session";

/// Validity window of registration and session tokens.
pub const TOKEN_TTL_SECS: i64 = 3600;

// ── Audience ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Registration,
    Session,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Session => "session",
        }
    }
}

// ── Claims ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Institution email, lowercase.
    pub sub: String,
    /// Institution display name.
    pub name: String,
    /// Public key submitted at registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pk: Option<String>,
    /// Ledger address of an active institution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
    /// Registration nonce or session id, depending on audience.
    pub jti: Uuid,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Token validation failures.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token signing failed: {0}")]
    Signing(String),
}

// ── Secret & Token Service ──────────────────────────────────────────────────

/// HMAC secret for token signing. `Debug` never prints the key.
#[derive(Clone)]
pub struct JwtSecret(Arc<Zeroizing<Vec<u8>>>);

impl JwtSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::new(Zeroizing::new(bytes.into())))
    }

    /// A random 256-bit secret. Tokens signed with it do not survive a
    /// restart.
    pub fn ephemeral() -> Self {
        let mut bytes = vec![0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtSecret([REDACTED])")
    }
}

/// Mints and validates registration and session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("keys", &"[REDACTED]")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl TokenService {
    pub fn new(secret: &JwtSecret) -> Self {
        Self::with_ttl(secret, TOKEN_TTL_SECS)
    }

    pub fn with_ttl(secret: &JwtSecret, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn issue_registration(
        &self,
        email: &Email,
        name: &str,
        public_key: &str,
        nonce: Uuid,
    ) -> Result<String, TokenError> {
        self.issue(Audience::Registration, email, name, Some(public_key), None, nonce)
    }

    pub fn issue_session(
        &self,
        email: &Email,
        name: &str,
        address: &LedgerAddress,
        session_id: Uuid,
    ) -> Result<String, TokenError> {
        self.issue(
            Audience::Session,
            email,
            name,
            None,
            Some(address.as_str()),
            session_id,
        )
    }

    fn issue(
        &self,
        audience: Audience,
        email: &Email,
        name: &str,
        pk: Option<&str>,
        addr: Option<&str>,
        jti: Uuid,
    ) -> Result<String, TokenError> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            sub: email.as_str().to_string(),
            name: name.to_string(),
            pk: pk.map(str::to_string),
            addr: addr.map(str::to_string),
            jti,
            aud: audience.as_str().to_string(),
            iat,
            exp: iat + self.ttl_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Validate signature, expiry and audience.
    pub fn verify(&self, token: &str, audience: Audience) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "aud", "sub"]);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidAudience => {
                    TokenError::Invalid(format!("not a {} token", audience.as_str()))
                }
                ErrorKind::InvalidSignature => TokenError::Invalid("bad signature".into()),
                _ => TokenError::Invalid("malformed token".into()),
            })
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// The authenticated institution behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub email: Email,
    pub name: String,
    pub address: LedgerAddress,
    pub session_id: Uuid,
}

impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::InvalidToken("no caller identity in request context".into()))
    }
}

// ── Cookies ─────────────────────────────────────────────────────────────────

/// The `Set-Cookie` carrying a freshly minted session token.
pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .build()
}

/// An already-expired session cookie; the client discards its token.
pub fn expired_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .build();
    cookie.make_removal();
    cookie
}

/// Session token from `Authorization: Bearer` or the session cookie.
fn presented_token(request: &Request) -> Option<String> {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    bearer.or_else(|| {
        CookieJar::from_headers(request.headers())
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty())
    })
}

// ── Middleware ──────────────────────────────────────────────────────────────

/// Authenticate the session token and inject [`CallerIdentity`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = presented_token(&request) else {
        return AppError::InvalidToken("no session token presented".into()).into_response();
    };

    match crate::session::authenticate(&state, &token).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "request authentication failed");
            AppError::from(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> Email {
        Email::parse("Registrar@Uni.edu").unwrap()
    }

    #[test]
    fn session_token_roundtrip() {
        let tokens = TokenService::new(&JwtSecret::new(b"test-secret".to_vec()));
        let addr = LedgerAddress::parse("0x00000000000000000000000000000000000000aa").unwrap();
        let sid = Uuid::new_v4();
        let token = tokens.issue_session(&email(), "Uni", &addr, sid).unwrap();
        let claims = tokens.verify(&token, Audience::Session).unwrap();
        assert_eq!(claims.sub, "registrar@uni.edu");
        assert_eq!(claims.jti, sid);
        assert_eq!(claims.addr.as_deref(), Some(addr.as_str()));
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECS);
    }

    #[test]
    fn registration_token_is_not_a_session_token() {
        let tokens = TokenService::new(&JwtSecret::new(b"test-secret".to_vec()));
        let token = tokens
            .issue_registration(&email(), "Uni", "PEM", Uuid::new_v4())
            .unwrap();
        assert!(matches!(
            tokens.verify(&token, Audience::Session),
            Err(TokenError::Invalid(_))
        ));
        assert!(tokens.verify(&token, Audience::Registration).is_ok());
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let secret = JwtSecret::new(b"test-secret".to_vec());
        let stale = TokenService::with_ttl(&secret, -60);
        let token = stale
            .issue_registration(&email(), "Uni", "PEM", Uuid::new_v4())
            .unwrap();
        assert!(matches!(
            TokenService::new(&secret).verify(&token, Audience::Registration),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn foreign_signature_is_invalid() {
        let ours = TokenService::new(&JwtSecret::new(b"ours".to_vec()));
        let theirs = TokenService::new(&JwtSecret::new(b"theirs".to_vec()));
        let token = theirs
            .issue_registration(&email(), "Uni", "PEM", Uuid::new_v4())
            .unwrap();
        assert!(matches!(
            ours.verify(&token, Audience::Registration),
            Err(TokenError::Invalid(_))
        ));
        assert!(matches!(
            ours.verify("not-a-jwt", Audience::Registration),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = JwtSecret::new(b"super-secret".to_vec());
        assert!(!format!("{secret:?}").contains("super-secret"));
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("tok".into());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn expired_cookie_clears_value() {
        let cookie = expired_session_cookie();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "");
        assert!(cookie.max_age().is_some_and(|age| age.is_zero()));
    }
}
