//! `GET /v1/certificates/{id}`: public ledger status of a credential.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use certichain_core::CertificateId;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::state::AppState;
use crate::upstream::bounded;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateStatus {
    pub certificate_id: String,
    pub certificate_hash: String,
    pub revoked: bool,
    pub issuer_address: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/certificates/{id}", get(certificate_status))
}

/// GET /v1/certificates/{id}
#[utoipa::path(
    get,
    path = "/v1/certificates/{id}",
    params(("id" = String, Path, description = "Certificate identifier")),
    responses(
        (status = 200, description = "Ledger record", body = CertificateStatus),
        (status = 404, description = "Unknown certificate", body = crate::error::ErrorBody),
    ),
    tag = "verification"
)]
async fn certificate_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CertificateStatus>, AppError> {
    let id = CertificateId::parse(&id).map_err(|e| AppError::Validation(e.to_string()))?;
    let record = bounded("ledger", state.deadline(), state.ledger.credential(&id)).await?;
    if !record.exists() {
        return Err(AppError::NotFound(format!("certificate {id}")));
    }
    Ok(Json(CertificateStatus {
        certificate_id: id.to_string(),
        certificate_hash: record.digest,
        revoked: record.revoked,
        issuer_address: record.issuer.to_string(),
    }))
}
