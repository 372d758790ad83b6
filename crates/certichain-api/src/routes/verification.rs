//! # Public Verification API
//!
//! - `POST /v1/verify`: verify a scanned QR payload.
//! - `POST /v1/verify/file`: verify an uploaded bundle file (multipart
//!   `file`, optional `certificateId`).
//!
//! Both return the reconciled report on success and a typed error naming the
//! failed stage otherwise.

use axum::extract::multipart::Multipart;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, read_upload, require_non_blank, Validate};
use crate::state::AppState;
use crate::verification::{self, BundleInput, VerificationReport};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPayloadRequest {
    /// Pipe-delimited QR payload.
    #[serde(alias = "qrData")]
    pub payload: String,
}

impl Validate for VerifyPayloadRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank(&[("payload", &self.payload)])
    }
}

/// Multipart form for bundle-file verification (documentation only).
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct VerifyFileForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub certificate_id: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/verify", post(verify_payload))
        .route("/v1/verify/file", post(verify_file))
}

/// POST /v1/verify
#[utoipa::path(
    post,
    path = "/v1/verify",
    request_body = VerifyPayloadRequest,
    responses(
        (status = 200, description = "Credential is authentic", body = VerificationReport),
        (status = 400, description = "Incomplete bundle", body = crate::error::ErrorBody),
        (status = 422, description = "Hash mismatch, revoked, or invalid signature", body = crate::error::ErrorBody),
        (status = 502, description = "Document unavailable", body = crate::error::ErrorBody),
        (status = 504, description = "Collaborator timed out", body = crate::error::ErrorBody),
    ),
    tag = "verification"
)]
async fn verify_payload(
    State(state): State<AppState>,
    body: Result<Json<VerifyPayloadRequest>, JsonRejection>,
) -> Result<Json<VerificationReport>, AppError> {
    let req = extract_validated_json(body)?;
    let payload = strip_line_ending(&req.payload);
    let report = verification::verify(&state, BundleInput::Payload(payload)).await?;
    Ok(Json(report))
}

/// POST /v1/verify/file
#[utoipa::path(
    post,
    path = "/v1/verify/file",
    request_body(content = VerifyFileForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Credential is authentic", body = VerificationReport),
        (status = 400, description = "Incomplete or unparseable bundle file", body = crate::error::ErrorBody),
        (status = 422, description = "Hash mismatch, revoked, or invalid signature", body = crate::error::ErrorBody),
    ),
    tag = "verification"
)]
async fn verify_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<VerificationReport>, AppError> {
    let upload = read_upload(multipart, "file").await?;
    let input = BundleInput::File {
        bytes: &upload.bytes,
        certificate_id: upload.field("certificateId"),
    };
    let report = verification::verify(&state, input).await?;
    Ok(Json(report))
}

/// Scanners and text areas often append a newline. Anything else is part of
/// the first or last field and is hashed as given.
fn strip_line_ending(payload: &str) -> &str {
    payload.trim_end_matches(['\r', '\n'])
}
