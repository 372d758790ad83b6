//! # Signed Document API
//!
//! - `POST /v1/documents/verify-signature`: multipart `pdf`.
//! - `POST /v1/documents/publish`: multipart `pdf`, the same bytes.

use axum::extract::multipart::Multipart;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::CallerIdentity;
use crate::documents::{self, SignatureConfirmation};
use crate::error::AppError;
use crate::extractors::read_upload;
use crate::state::AppState;

const PDF_FIELD: &str = "pdf";

/// Multipart form carrying a PDF (documentation only).
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct PdfForm {
    #[schema(value_type = String, format = Binary)]
    pub pdf: Vec<u8>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    /// Content-store locator (CID) of the published document.
    pub ipfs_cid: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/documents/verify-signature", post(verify_signature))
        .route("/v1/documents/publish", post(publish))
}

/// POST /v1/documents/verify-signature
#[utoipa::path(
    post,
    path = "/v1/documents/verify-signature",
    request_body(content = PdfForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Signature valid; document may be published", body = SignatureConfirmation),
        (status = 404, description = "Issuer key not registered", body = crate::error::ErrorBody),
        (status = 422, description = "Signature invalid", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "documents"
)]
async fn verify_signature(
    State(state): State<AppState>,
    caller: CallerIdentity,
    multipart: Multipart,
) -> Result<Json<SignatureConfirmation>, AppError> {
    let upload = read_upload(multipart, PDF_FIELD).await?;
    let confirmation = documents::verify_signature(&state, &caller, upload.bytes).await?;
    Ok(Json(confirmation))
}

/// POST /v1/documents/publish
#[utoipa::path(
    post,
    path = "/v1/documents/publish",
    request_body(content = PdfForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Document stored", body = PublishResponse),
        (status = 403, description = "Not signature-verified by this institution", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "documents"
)]
async fn publish(
    State(state): State<AppState>,
    caller: CallerIdentity,
    multipart: Multipart,
) -> Result<Json<PublishResponse>, AppError> {
    let upload = read_upload(multipart, PDF_FIELD).await?;
    let file_name = upload
        .file_name
        .clone()
        .unwrap_or_else(|| "certificate.pdf".to_string());
    let locator = documents::publish(&state, &caller, &file_name, upload.bytes).await?;
    Ok(Json(PublishResponse { ipfs_cid: locator }))
}
