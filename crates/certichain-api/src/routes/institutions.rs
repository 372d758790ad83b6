//! # Institution Details
//!
//! `GET /v1/institutions/me`: the caller's registration as recorded on the
//! ledger.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::state::AppState;
use crate::upstream::bounded;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionDetails {
    pub name: String,
    pub email: String,
    pub wallet_address: String,
    pub public_key: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/institutions/me", get(institution_details))
}

/// GET /v1/institutions/me
#[utoipa::path(
    get,
    path = "/v1/institutions/me",
    responses(
        (status = 200, description = "Ledger registration of the caller", body = InstitutionDetails),
        (status = 404, description = "Not registered on the ledger", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "institutions"
)]
async fn institution_details(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<InstitutionDetails>, AppError> {
    let record = bounded(
        "ledger",
        state.deadline(),
        state.ledger.institution(&caller.address),
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("institution {}", caller.address)))?;

    Ok(Json(InstitutionDetails {
        name: record.name,
        email: record.email,
        wallet_address: record.address.to_string(),
        public_key: record.public_key,
    }))
}
