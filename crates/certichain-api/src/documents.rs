//! # Signed Document Publishing
//!
//! An institution uploads its signed PDF twice: first to confirm the
//! embedded signature under its registered public key, then to publish it
//! to content storage. The first step leaves an entry in the
//! [`SignatureCache`](crate::signature_cache::SignatureCache); a successful
//! publish consumes it. A document can therefore only be published by the
//! institution that verified it, once per verification.
//!
//! The entry is held aside while the document is stored and put back if the
//! store call fails, so a failed publish can be retried without verifying
//! again.

use certichain_core::DocumentDigest;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::CallerIdentity;
use crate::state::AppState;
use crate::upstream::{bounded, UpstreamError};

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("{0}")]
    Validation(String),
    #[error("issuer public key is not registered on the ledger")]
    IssuerKeyMissing,
    #[error("document signature is invalid")]
    SignatureInvalid,
    #[error("document has not been signature-verified by this institution")]
    Unverified,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Outcome of a successful signature check.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignatureConfirmation {
    pub valid: bool,
    /// SHA-256 of the document, lowercase hex.
    pub document_digest: String,
    pub signer: Option<String>,
    pub timestamp: Option<String>,
}

/// Check the embedded signature of `document` under the caller's ledger key
/// and remember the result for [`publish`].
#[tracing::instrument(skip_all, fields(caller = %caller.address))]
pub async fn verify_signature(
    state: &AppState,
    caller: &CallerIdentity,
    document: Vec<u8>,
) -> Result<SignatureConfirmation, DocumentError> {
    if document.is_empty() {
        return Err(DocumentError::Validation("document is empty".into()));
    }

    let registration = bounded(
        "ledger",
        state.deadline(),
        state.ledger.institution(&caller.address),
    )
    .await?
    .filter(|r| !r.public_key.trim().is_empty())
    .ok_or(DocumentError::IssuerKeyMissing)?;

    let digest = DocumentDigest::of(&document);
    let report = bounded(
        "signature verifier",
        state.deadline(),
        state.verifier.verify(document, &registration.public_key),
    )
    .await?;
    if !report.valid {
        tracing::info!(document = %digest, "signature check failed");
        return Err(DocumentError::SignatureInvalid);
    }

    state.signature_cache.record(&digest, &caller.address);
    tracing::info!(document = %digest, "signature verified");
    Ok(SignatureConfirmation {
        valid: true,
        document_digest: digest.to_hex(),
        signer: report.signer,
        timestamp: report.timestamp,
    })
}

/// Publish a document the caller has verified. Returns its locator.
#[tracing::instrument(skip_all, fields(caller = %caller.address))]
pub async fn publish(
    state: &AppState,
    caller: &CallerIdentity,
    file_name: &str,
    document: Vec<u8>,
) -> Result<String, DocumentError> {
    let digest = DocumentDigest::of(&document);
    let claim = state
        .signature_cache
        .consume(&digest, &caller.address)
        .ok_or(DocumentError::Unverified)?;

    let locator = match bounded(
        "content store",
        state.deadline(),
        state.content.put(file_name, document),
    )
    .await
    {
        Ok(locator) => locator,
        Err(e) => {
            tracing::warn!(document = %digest, error = %e, "publish failed, verification kept for retry");
            state.signature_cache.restore(claim);
            return Err(e.into());
        }
    };

    metrics::counter!("certichain_documents_published_total").increment(1);
    tracing::info!(document = %digest, %locator, "document published");
    Ok(locator)
}
