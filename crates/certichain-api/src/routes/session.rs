//! # Session API
//!
//! - `POST /v1/session/login` (public): returns the session token in the
//!   body and as the `certichain_session` cookie.
//! - `POST /v1/session/logout` (authenticated): ends the session and
//!   clears the cookie.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{expired_session_cookie, session_cookie, CallerIdentity, TOKEN_TTL_SECS};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_non_blank, Validate};
use crate::session;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank(&[("email", &self.email), ("password", &self.password)])
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub institution_name: String,
    pub wallet_address: String,
}

/// Login route, mounted behind the rate limiter.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/session/login", post(login))
}

/// Routes requiring an authenticated session.
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/v1/session/logout", post(logout))
}

/// POST /v1/session/login
#[utoipa::path(
    post,
    path = "/v1/session/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session established", body = LoginResponse),
        (status = 401, description = "Invalid email or password", body = crate::error::ErrorBody),
        (status = 429, description = "Rate limited", body = crate::error::ErrorBody),
    ),
    tag = "session"
)]
async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let session = session::login(&state, &req.email, &req.password).await?;
    let jar = CookieJar::new().add(session_cookie(session.token.clone()));
    Ok((
        jar,
        Json(LoginResponse {
            token: session.token,
            token_type: "Bearer".to_string(),
            expires_in: TOKEN_TTL_SECS,
            institution_name: session.identity.name,
            wallet_address: session.identity.address.to_string(),
        }),
    ))
}

/// POST /v1/session/logout
#[utoipa::path(
    post,
    path = "/v1/session/logout",
    responses(
        (status = 204, description = "Session ended"),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "session"
)]
async fn logout(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<(CookieJar, StatusCode), AppError> {
    session::logout(&state, &caller).await?;
    Ok((
        CookieJar::new().add(expired_session_cookie()),
        StatusCode::NO_CONTENT,
    ))
}
