//! Revocation authorization.
//!
//! Only the address that issued a credential may revoke it, and only once.
//! The gate checks both against the ledger record and hands back the
//! unsigned `revokeCertificate` call; the caller's wallet signs and submits.

use certichain_client::UnsignedTransaction;
use certichain_core::CertificateId;

use crate::auth::CallerIdentity;
use crate::state::AppState;
use crate::upstream::{bounded, UpstreamError};

#[derive(Debug, thiserror::Error)]
pub enum RevocationError {
    #[error("certificate {0} not found")]
    NotFound(String),
    #[error("only the issuing institution can revoke this certificate")]
    Unauthorized,
    #[error("certificate {0} is already revoked")]
    AlreadyRevoked(String),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Permission to revoke, with the call to sign.
#[derive(Debug, Clone)]
pub struct RevocationAuthorization {
    pub certificate_id: CertificateId,
    pub transaction: UnsignedTransaction,
}

#[tracing::instrument(skip(state, caller), fields(caller = %caller.address))]
pub async fn authorize(
    state: &AppState,
    caller: &CallerIdentity,
    certificate_id: CertificateId,
) -> Result<RevocationAuthorization, RevocationError> {
    let record = bounded(
        "ledger",
        state.deadline(),
        state.ledger.credential(&certificate_id),
    )
    .await?;

    if !record.exists() {
        return Err(RevocationError::NotFound(certificate_id.to_string()));
    }
    // LedgerAddress equality ignores hex case.
    if record.issuer != caller.address {
        tracing::warn!(issuer = %record.issuer, "revocation refused: caller is not the issuer");
        return Err(RevocationError::Unauthorized);
    }
    if record.revoked {
        return Err(RevocationError::AlreadyRevoked(certificate_id.to_string()));
    }

    let transaction = UnsignedTransaction::revoke_credential(
        &caller.address,
        state.ledger.contract_address(),
        &certificate_id,
    );
    tracing::info!("revocation authorized");
    Ok(RevocationAuthorization {
        certificate_id,
        transaction,
    })
}
