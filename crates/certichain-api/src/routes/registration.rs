//! # Institution Registration API
//!
//! - `POST /v1/registration/initiate`: send the email-bound registration link.
//! - `POST /v1/registration/prepare`: bind a wallet, get the unsigned
//!   `registerUniversity` call.
//! - `POST /v1/registration/finalize`: set a password and activate.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_non_blank, Validate};
use crate::registration;
use crate::routes::TransactionDto;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    #[serde(alias = "universityName")]
    pub institution_name: String,
    pub email: String,
    /// PEM-encoded public key the institution signs documents with.
    pub public_key: String,
}

impl Validate for InitiateRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank(&[
            ("institutionName", &self.institution_name),
            ("email", &self.email),
            ("publicKey", &self.public_key),
        ])
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub email: String,
    /// RFC 3339 expiry of the emailed link.
    pub expires_at: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrepareRequest {
    /// Registration token from the emailed link.
    pub token: String,
    pub wallet_address: String,
}

impl Validate for PrepareRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank(&[("token", &self.token), ("walletAddress", &self.wallet_address)])
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub token: String,
    pub password: String,
    /// Hash of the submitted `registerUniversity` transaction.
    pub tx_hash: String,
}

impl Validate for FinalizeRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank(&[("token", &self.token), ("txHash", &self.tx_hash)])
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    pub email: String,
    pub institution_name: String,
    pub wallet_address: String,
    pub state: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/registration/initiate", post(initiate))
        .route("/v1/registration/prepare", post(prepare))
        .route("/v1/registration/finalize", post(finalize))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/registration/initiate
#[utoipa::path(
    post,
    path = "/v1/registration/initiate",
    request_body = InitiateRequest,
    responses(
        (status = 200, description = "Verification email sent", body = InitiateResponse),
        (status = 403, description = "Institution not whitelisted", body = crate::error::ErrorBody),
        (status = 409, description = "Email already registered", body = crate::error::ErrorBody),
        (status = 422, description = "Missing field", body = crate::error::ErrorBody),
    ),
    tag = "registration"
)]
async fn initiate(
    State(state): State<AppState>,
    body: Result<Json<InitiateRequest>, JsonRejection>,
) -> Result<Json<InitiateResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let initiated =
        registration::initiate(&state, &req.institution_name, &req.email, &req.public_key).await?;
    Ok(Json(InitiateResponse {
        email: initiated.email.to_string(),
        expires_at: initiated.expires_at.to_rfc3339(),
    }))
}

/// POST /v1/registration/prepare
#[utoipa::path(
    post,
    path = "/v1/registration/prepare",
    request_body = PrepareRequest,
    responses(
        (status = 200, description = "Unsigned registration transaction", body = TransactionDto),
        (status = 401, description = "Invalid token", body = crate::error::ErrorBody),
        (status = 409, description = "No matching pending registration", body = crate::error::ErrorBody),
        (status = 410, description = "Token expired", body = crate::error::ErrorBody),
    ),
    tag = "registration"
)]
async fn prepare(
    State(state): State<AppState>,
    body: Result<Json<PrepareRequest>, JsonRejection>,
) -> Result<Json<TransactionDto>, AppError> {
    let req = extract_validated_json(body)?;
    let tx = registration::prepare_wallet_tx(&state, &req.token, &req.wallet_address).await?;
    Ok(Json(tx.into()))
}

/// POST /v1/registration/finalize
#[utoipa::path(
    post,
    path = "/v1/registration/finalize",
    request_body = FinalizeRequest,
    responses(
        (status = 200, description = "Account activated", body = FinalizeResponse),
        (status = 409, description = "Already used, never prepared, or tx unconfirmed", body = crate::error::ErrorBody),
        (status = 410, description = "Token expired", body = crate::error::ErrorBody),
        (status = 422, description = "Weak password or malformed tx hash", body = crate::error::ErrorBody),
    ),
    tag = "registration"
)]
async fn finalize(
    State(state): State<AppState>,
    body: Result<Json<FinalizeRequest>, JsonRejection>,
) -> Result<Json<FinalizeResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let account = registration::finalize(&state, &req.token, &req.password, &req.tx_hash).await?;
    Ok(Json(FinalizeResponse {
        email: account.email.to_string(),
        institution_name: account.name,
        wallet_address: account
            .ledger_address
            .map(|a| a.to_string())
            .unwrap_or_default(),
        state: account.state.as_str().to_string(),
    }))
}
