//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps the protocol errors of registration, sessions, issuance,
//! verification, revocation and document publishing to HTTP status codes
//! and stable machine-readable codes.
//!
//! Body format: `{"error": {"code", "message", "details"?}}`. Internal and
//! upstream failure details are logged, never returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::auth::TokenError;
use crate::db::StoreError;
use crate::documents::DocumentError;
use crate::issuance::IssuanceError;
use crate::password::PasswordError;
use crate::registration::RegistrationError;
use crate::revocation::RevocationError;
use crate::session::SessionError;
use crate::upstream::UpstreamError;
use crate::verification::VerificationError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "HASH_MISMATCH", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.into(),
                details: None,
            },
        }
    }
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Caller input failed a business rule (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// A verification bundle is incomplete or unparseable (400).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Credentials did not match an active account (401).
    ///
    /// One message for every cause so the response is not an account oracle.
    #[error("invalid email or password")]
    AuthenticationFailed,

    /// The session token was superseded by a newer login or logged out (401).
    #[error("session has been revoked; log in again")]
    SessionRevoked,

    /// Token is malformed, badly signed, or for the wrong audience (401).
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Token is past its validity window (410).
    #[error("token has expired")]
    TokenExpired,

    /// The caller is authenticated but not entitled to the resource (403).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The uploaded document has no signature verification by this caller (403).
    #[error("document has not been signature-verified by this institution")]
    DocumentUnverified,

    /// The institution is not whitelisted on the ledger (403).
    #[error("not whitelisted: {0}")]
    NotWhitelisted(String),

    /// The pending registration is absent, consumed, or superseded (409).
    #[error("registration record not found or already used")]
    RecordNotFound,

    /// An active account already exists for the email (409).
    #[error("an institution with this email is already registered")]
    AlreadyRegistered,

    /// The credential is already revoked (409).
    #[error("certificate {0} is already revoked")]
    AlreadyRevoked(String),

    /// The claimed registration transaction is not successfully mined (409).
    #[error("registration transaction not confirmed: {0}")]
    TxUnconfirmed(String),

    /// Recomputed digest differs from the ledger's record (422).
    #[error("certificate hash does not match the ledger record")]
    HashMismatch,

    /// The credential has been revoked by its issuer (422).
    #[error("certificate has been revoked")]
    Revoked,

    /// The document's embedded signature did not verify (422).
    #[error("document signature is invalid")]
    SignatureInvalid,

    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The issuer has no registered public key on the ledger (404).
    #[error("issuer public key is not registered on the ledger")]
    IssuerKeyMissing,

    /// The source document could not be retrieved (502).
    #[error("content unavailable: {0}")]
    ContentUnavailable(String),

    /// A collaborator exceeded its deadline (504).
    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// A collaborator failed (502). Message is logged but not returned.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Internal server error (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::MalformedInput(_) => (StatusCode::BAD_REQUEST, "MALFORMED_INPUT"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::AuthenticationFailed => (StatusCode::UNAUTHORIZED, "AUTHENTICATION_FAILED"),
            Self::SessionRevoked => (StatusCode::UNAUTHORIZED, "SESSION_REVOKED"),
            Self::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            Self::TokenExpired => (StatusCode::GONE, "TOKEN_EXPIRED"),
            Self::Unauthorized(_) => (StatusCode::FORBIDDEN, "UNAUTHORIZED"),
            Self::DocumentUnverified => (StatusCode::FORBIDDEN, "DOCUMENT_UNVERIFIED"),
            Self::NotWhitelisted(_) => (StatusCode::FORBIDDEN, "NOT_WHITELISTED"),
            Self::RecordNotFound => (StatusCode::CONFLICT, "RECORD_NOT_FOUND"),
            Self::AlreadyRegistered => (StatusCode::CONFLICT, "ALREADY_REGISTERED"),
            Self::AlreadyRevoked(_) => (StatusCode::CONFLICT, "ALREADY_REVOKED"),
            Self::TxUnconfirmed(_) => (StatusCode::CONFLICT, "TX_UNCONFIRMED"),
            Self::HashMismatch => (StatusCode::UNPROCESSABLE_ENTITY, "HASH_MISMATCH"),
            Self::Revoked => (StatusCode::UNPROCESSABLE_ENTITY, "REVOKED"),
            Self::SignatureInvalid => (StatusCode::UNPROCESSABLE_ENTITY, "SIGNATURE_INVALID"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::IssuerKeyMissing => (StatusCode::NOT_FOUND, "ISSUER_KEY_MISSING"),
            Self::ContentUnavailable(_) => (StatusCode::BAD_GATEWAY, "CONTENT_UNAVAILABLE"),
            Self::UpstreamTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT"),
            Self::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal/upstream error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::Upstream(_) => "An upstream service error occurred".to_string(),
            Self::ContentUnavailable(_) => {
                "The credential document could not be retrieved from content storage".to_string()
            }
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Upstream(_) | Self::ContentUnavailable(_) => {
                tracing::error!(error = %self, "upstream collaborator error")
            }
            Self::UpstreamTimeout(_) => tracing::warn!(error = %self, "upstream deadline exceeded"),
            _ => {}
        }

        (status, Json(ErrorBody::new(code, message))).into_response()
    }
}

// ── Domain error conversions ────────────────────────────────────────────────

impl From<UpstreamError> for AppError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Timeout { .. } => Self::UpstreamTimeout(err.to_string()),
            UpstreamError::Failed { .. } => Self::Upstream(err.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::TokenExpired,
            TokenError::Invalid(reason) => Self::InvalidToken(reason),
            TokenError::Signing(reason) => Self::Internal(reason),
        }
    }
}

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::Validation(msg) => Self::Validation(msg),
            RegistrationError::NotWhitelisted(msg) => Self::NotWhitelisted(msg),
            RegistrationError::AlreadyRegistered => Self::AlreadyRegistered,
            RegistrationError::Token(e) => e.into(),
            RegistrationError::RecordNotFound => Self::RecordNotFound,
            RegistrationError::TxUnconfirmed(msg) => Self::TxUnconfirmed(msg),
            RegistrationError::Password(e @ PasswordError::TooShort) => {
                Self::Validation(e.to_string())
            }
            RegistrationError::Password(e @ PasswordError::Hashing(_)) => {
                Self::Internal(e.to_string())
            }
            RegistrationError::Upstream(e) => e.into(),
            RegistrationError::Store(e) => e.into(),
            RegistrationError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::AuthenticationFailed => Self::AuthenticationFailed,
            SessionError::SessionRevoked => Self::SessionRevoked,
            SessionError::Token(e) => e.into(),
            SessionError::Store(e) => e.into(),
            SessionError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<IssuanceError> for AppError {
    fn from(err: IssuanceError) -> Self {
        match err {
            IssuanceError::Validation(msg) => Self::Validation(msg),
            IssuanceError::IssuerKeyMissing => Self::IssuerKeyMissing,
            IssuanceError::Upstream(e) => e.into(),
            IssuanceError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<VerificationError> for AppError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::MalformedInput(msg) => Self::MalformedInput(msg),
            VerificationError::HashMismatch => Self::HashMismatch,
            VerificationError::Revoked => Self::Revoked,
            VerificationError::ContentUnavailable(msg) => Self::ContentUnavailable(msg),
            VerificationError::SignatureInvalid => Self::SignatureInvalid,
            VerificationError::Upstream(e) => e.into(),
        }
    }
}

impl From<RevocationError> for AppError {
    fn from(err: RevocationError) -> Self {
        match err {
            RevocationError::NotFound(id) => Self::NotFound(format!("certificate {id}")),
            RevocationError::Unauthorized => Self::Unauthorized(err.to_string()),
            RevocationError::AlreadyRevoked(id) => Self::AlreadyRevoked(id),
            RevocationError::Upstream(e) => e.into(),
        }
    }
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Validation(msg) => Self::Validation(msg),
            DocumentError::IssuerKeyMissing => Self::IssuerKeyMissing,
            DocumentError::SignatureInvalid => Self::SignatureInvalid,
            DocumentError::Unverified => Self::DocumentUnverified,
            DocumentError::Upstream(e) => e.into(),
        }
    }
}

impl From<certichain_core::CoreError> for AppError {
    fn from(err: certichain_core::CoreError) -> Self {
        if err.is_malformed_bundle() {
            Self::MalformedInput(err.to_string())
        } else {
            Self::Validation(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[test]
    fn workflow_errors_map_to_conflict_or_gone() {
        assert_eq!(
            AppError::RecordNotFound.status_and_code(),
            (StatusCode::CONFLICT, "RECORD_NOT_FOUND")
        );
        assert_eq!(
            AppError::TokenExpired.status_and_code(),
            (StatusCode::GONE, "TOKEN_EXPIRED")
        );
        assert_eq!(
            AppError::AlreadyRevoked("CERT-1".into()).status_and_code(),
            (StatusCode::CONFLICT, "ALREADY_REVOKED")
        );
    }

    #[test]
    fn authenticity_failures_are_unprocessable() {
        for err in [
            AppError::HashMismatch,
            AppError::Revoked,
            AppError::SignatureInvalid,
        ] {
            assert_eq!(err.status_and_code().0, StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn malformed_bundle_is_bad_request() {
        let (status, code) = AppError::MalformedInput("missing field".into()).status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "MALFORMED_INPUT");
    }

    #[test]
    fn core_error_classification() {
        let missing = AppError::from(certichain_core::CoreError::MissingField("subject_name"));
        assert!(matches!(missing, AppError::MalformedInput(_)));
        let email = AppError::from(certichain_core::CoreError::InvalidEmail("x".into()));
        assert!(matches!(email, AppError::Validation(_)));
    }

    #[test]
    fn token_errors_convert() {
        assert!(matches!(
            AppError::from(TokenError::Expired),
            AppError::TokenExpired
        ));
        assert!(matches!(
            AppError::from(TokenError::Invalid("wrong audience".into())),
            AppError::InvalidToken(_)
        ));
    }

    #[tokio::test]
    async fn authentication_failure_message_is_uniform() {
        let (status, body) = response_parts(AppError::AuthenticationFailed).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.error.code, "AUTHENTICATION_FAILED");
        assert_eq!(body.error.message, "invalid email or password");
    }

    #[tokio::test]
    async fn into_response_internal_hides_details() {
        let (status, body) =
            response_parts(AppError::Internal("db connection failed".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert!(!body.error.message.contains("db connection"));
        assert!(body.error.details.is_none());
    }

    #[tokio::test]
    async fn into_response_upstream_hides_collaborator_detail() {
        let (status, body) =
            response_parts(AppError::Upstream("rpc at 10.0.0.5 refused".into())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.error.code, "UPSTREAM_ERROR");
        assert!(!body.error.message.contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn into_response_timeout_is_gateway_timeout() {
        let (status, body) =
            response_parts(AppError::UpstreamTimeout("ledger".into())).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body.error.code, "UPSTREAM_TIMEOUT");
    }

    #[test]
    fn error_body_skips_absent_details() {
        let json = serde_json::to_string(&ErrorBody::new("TEST", "test message")).unwrap();
        assert!(json.contains("TEST"));
        assert!(!json.contains("details"));
    }
}
