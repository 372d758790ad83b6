//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Registers the session bearer scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token from /v1/session/login, as a bearer header \
                             or the certichain_session cookie.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CertiChain API",
        version = "0.1.0",
        description = "Credential issuance and verification. Institutions register with an \
            email-bound token and a wallet-signed ledger transaction, assemble unsigned \
            issuance and revocation calls, and publish signature-verified documents. \
            Anyone can verify a credential against the ledger, content storage and its \
            embedded signature.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        // Registration
        crate::routes::registration::initiate,
        crate::routes::registration::prepare,
        crate::routes::registration::finalize,
        // Session
        crate::routes::session::login,
        crate::routes::session::logout,
        // Credentials
        crate::routes::credentials::issue_credential,
        crate::routes::credentials::deliver_credential,
        crate::routes::credentials::revoke_credential,
        // Documents
        crate::routes::documents::verify_signature,
        crate::routes::documents::publish,
        // Institutions
        crate::routes::institutions::institution_details,
        // Verification
        crate::routes::verification::verify_payload,
        crate::routes::verification::verify_file,
        crate::routes::certificates::certificate_status,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::TransactionDto,
        crate::routes::registration::InitiateRequest,
        crate::routes::registration::InitiateResponse,
        crate::routes::registration::PrepareRequest,
        crate::routes::registration::FinalizeRequest,
        crate::routes::registration::FinalizeResponse,
        crate::routes::session::LoginRequest,
        crate::routes::session::LoginResponse,
        crate::routes::credentials::IssueRequest,
        crate::routes::credentials::IssueResponse,
        crate::routes::credentials::DeliverRequest,
        crate::routes::credentials::RevocationResponse,
        crate::routes::documents::PdfForm,
        crate::routes::documents::PublishResponse,
        crate::documents::SignatureConfirmation,
        crate::routes::institutions::InstitutionDetails,
        crate::routes::verification::VerifyPayloadRequest,
        crate::routes::verification::VerifyFileForm,
        crate::verification::VerificationReport,
        crate::routes::certificates::CertificateStatus,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "registration", description = "Two-phase institution onboarding"),
        (name = "session", description = "Institution login and logout"),
        (name = "credentials", description = "Issuance and revocation assembly"),
        (name = "documents", description = "Signed document verification and publishing"),
        (name = "institutions", description = "Ledger registration details"),
        (name = "verification", description = "Public credential verification"),
    )
)]
pub struct ApiDoc;

/// Router serving the OpenAPI document.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
