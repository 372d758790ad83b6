//! # Credential Issuance and Revocation
//!
//! Authenticated institution endpoints. Each returns an unsigned contract
//! call; the institution's wallet signs and submits it.
//!
//! ## Endpoints
//!
//! - `POST /v1/credentials/issue`: assemble an issuance.
//! - `POST /v1/credentials/deliver`: email the holder their bundle.
//! - `POST /v1/credentials/{id}/revoke`: authorize a revocation.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use certichain_core::{BundleFile, CertificateId, VerificationBundle};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_non_blank, Validate};
use crate::issuance::{self, CredentialDraft};
use crate::revocation;
use crate::routes::TransactionDto;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    /// Content-store locator of the published, signed document.
    pub ipfs_cid: String,
    pub student_name: String,
    pub course_name: String,
    pub issue_date: String,
    #[serde(default)]
    pub grade: Option<String>,
}

impl Validate for IssueRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank(&[
            ("ipfsCid", &self.ipfs_cid),
            ("studentName", &self.student_name),
            ("courseName", &self.course_name),
            ("issueDate", &self.issue_date),
        ])
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    pub certificate_id: String,
    /// `0x`-prefixed canonical digest written by the transaction.
    pub certificate_hash: String,
    pub transaction: TransactionDto,
    /// Bundle file for the holder.
    #[schema(value_type = Object)]
    pub bundle: BundleFile,
    /// Pipe-delimited payload for the credential's QR code.
    pub qr_payload: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliverRequest {
    /// QR payload returned by the issue endpoint.
    pub qr_payload: String,
    pub student_email: String,
}

impl Validate for DeliverRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank(&[
            ("qrPayload", &self.qr_payload),
            ("studentEmail", &self.student_email),
        ])
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevocationResponse {
    pub certificate_id: String,
    pub transaction: TransactionDto,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/credentials/issue", post(issue_credential))
        .route("/v1/credentials/deliver", post(deliver_credential))
        .route("/v1/credentials/{id}/revoke", post(revoke_credential))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/credentials/issue
#[utoipa::path(
    post,
    path = "/v1/credentials/issue",
    request_body = IssueRequest,
    responses(
        (status = 200, description = "Unsigned issuance and holder bundle", body = IssueResponse),
        (status = 404, description = "Issuer key not registered on the ledger", body = crate::error::ErrorBody),
        (status = 422, description = "Missing field", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "credentials"
)]
async fn issue_credential(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<Json<IssueResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let draft = CredentialDraft {
        locator: req.ipfs_cid,
        subject_name: req.student_name,
        program_name: req.course_name,
        issue_date: req.issue_date,
        grade: req.grade,
    };
    let assembled = issuance::assemble(&state, &caller, draft).await?;
    let qr_payload = assembled.qr_payload();
    Ok(Json(IssueResponse {
        certificate_id: assembled.certificate_id.to_string(),
        certificate_hash: assembled.digest.to_string(),
        transaction: assembled.transaction.into(),
        bundle: assembled.bundle.to_file(),
        qr_payload,
    }))
}

/// POST /v1/credentials/deliver
#[utoipa::path(
    post,
    path = "/v1/credentials/deliver",
    request_body = DeliverRequest,
    responses(
        (status = 202, description = "Delivery email sent"),
        (status = 400, description = "Malformed payload", body = crate::error::ErrorBody),
        (status = 502, description = "Mail relay failed", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "credentials"
)]
async fn deliver_credential(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<DeliverRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let req = extract_validated_json(body)?;
    let bundle = VerificationBundle::from_payload(&req.qr_payload)?;
    issuance::deliver(&state, &caller, &bundle, &req.student_email).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /v1/credentials/{id}/revoke
#[utoipa::path(
    post,
    path = "/v1/credentials/{id}/revoke",
    params(("id" = String, Path, description = "Certificate identifier")),
    responses(
        (status = 200, description = "Unsigned revocation", body = RevocationResponse),
        (status = 403, description = "Caller did not issue this certificate", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown certificate", body = crate::error::ErrorBody),
        (status = 409, description = "Already revoked", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "credentials"
)]
async fn revoke_credential(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<RevocationResponse>, AppError> {
    let id = CertificateId::parse(&id).map_err(|e| AppError::Validation(e.to_string()))?;
    let authorization = revocation::authorize(&state, &caller, id).await?;
    Ok(Json(RevocationResponse {
        certificate_id: authorization.certificate_id.to_string(),
        transaction: authorization.transaction.into(),
    }))
}
