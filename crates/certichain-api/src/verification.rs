//! # Verification Pipeline
//!
//! Reconciles a presented bundle against the ledger, the content store and
//! the signature verifier. Stages run in order and the first failure is the
//! result:
//!
//! | # | Stage | Failure |
//! |---|-------|---------|
//! | 1 | Bundle completeness | `MalformedInput` |
//! | 2 | Recomputed digest equals the ledger record | `HashMismatch` |
//! | 3 | Ledger revocation flag is clear | `Revoked` |
//! | 4 | Source document retrievable by locator | `ContentUnavailable` |
//! | 5 | Embedded signature valid under the bundle's public key | `SignatureInvalid` |
//!
//! A [`VerificationReport`] exists only when all five pass. An identifier
//! unknown to the ledger has an empty digest and fails stage 2.

use certichain_client::{CredentialRecord, SignatureReport};
use certichain_core::{BundleFile, CertificateDigest, VerificationBundle};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;
use crate::upstream::{bounded, UpstreamError};

/// Verification failures.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("{0}")]
    MalformedInput(String),
    #[error("certificate hash does not match the ledger record")]
    HashMismatch,
    #[error("certificate has been revoked")]
    Revoked,
    #[error("document unavailable: {0}")]
    ContentUnavailable(String),
    #[error("document signature is invalid")]
    SignatureInvalid,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl VerificationError {
    fn outcome(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "malformed",
            Self::HashMismatch => "hash_mismatch",
            Self::Revoked => "revoked",
            Self::ContentUnavailable(_) => "content_unavailable",
            Self::SignatureInvalid => "signature_invalid",
            Self::Upstream(_) => "upstream_error",
        }
    }
}

/// How the bundle was presented.
#[derive(Debug, Clone)]
pub enum BundleInput<'a> {
    /// Pipe-delimited QR payload.
    Payload(&'a str),
    /// Uploaded JSON bundle file, with an optional separately supplied
    /// certificate identifier.
    File {
        bytes: &'a [u8],
        certificate_id: Option<&'a str>,
    },
}

impl BundleInput<'_> {
    /// Stage 1: completeness.
    pub fn into_bundle(self) -> Result<VerificationBundle, VerificationError> {
        let parsed = match self {
            Self::Payload(payload) => VerificationBundle::from_payload(payload),
            Self::File {
                bytes,
                certificate_id,
            } => BundleFile::from_json(bytes).and_then(|f| f.into_bundle(certificate_id)),
        };
        parsed.map_err(|e| VerificationError::MalformedInput(e.to_string()))
    }
}

/// Reconciled metadata of a verified credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub valid: bool,
    pub certificate_id: String,
    pub subject_name: String,
    pub program_name: String,
    pub issue_date: String,
    pub issuer_name: String,
    /// Issuing address as recorded on the ledger.
    pub issuer_address: String,
    pub signer: Option<String>,
    pub signature_timestamp: Option<String>,
    pub grade: Option<String>,
    pub locator: String,
    /// `0x`-prefixed canonical digest.
    pub digest: String,
}

impl VerificationReport {
    fn reconcile(
        bundle: VerificationBundle,
        digest: CertificateDigest,
        record: CredentialRecord,
        signature: SignatureReport,
    ) -> Self {
        Self {
            valid: true,
            certificate_id: bundle.certificate_id.to_string(),
            subject_name: bundle.subject_name,
            program_name: bundle.program_name,
            issue_date: bundle.issue_date,
            issuer_name: bundle.issuer_name,
            issuer_address: record.issuer.as_str().to_string(),
            signer: signature.signer,
            signature_timestamp: signature.timestamp,
            grade: bundle.grade,
            locator: bundle.locator,
            digest: digest.to_string(),
        }
    }
}

/// Run the full pipeline.
pub async fn verify(
    state: &AppState,
    input: BundleInput<'_>,
) -> Result<VerificationReport, VerificationError> {
    let result = run_stages(state, input).await;
    let outcome = match &result {
        Ok(_) => "valid",
        Err(e) => e.outcome(),
    };
    metrics::counter!("certichain_verifications_total", "outcome" => outcome).increment(1);
    result
}

#[tracing::instrument(skip_all)]
async fn run_stages(
    state: &AppState,
    input: BundleInput<'_>,
) -> Result<VerificationReport, VerificationError> {
    let bundle = input.into_bundle()?;
    let id = bundle.certificate_id.clone();
    tracing::debug!(certificate_id = %id, "bundle complete");

    let digest = bundle.canonical_hash();
    let record = bounded("ledger", state.deadline(), state.ledger.credential(&id)).await?;
    if !digest.matches_reported(&record.digest) {
        tracing::info!(certificate_id = %id, recomputed = %digest, "hash mismatch");
        return Err(VerificationError::HashMismatch);
    }

    if record.revoked {
        tracing::info!(certificate_id = %id, "certificate revoked");
        return Err(VerificationError::Revoked);
    }

    let document = match bounded(
        "content store",
        state.deadline(),
        state.content.get(&bundle.locator),
    )
    .await
    {
        Ok(document) => document,
        Err(e) if e.is_timeout() => return Err(e.into()),
        Err(e) => return Err(VerificationError::ContentUnavailable(e.to_string())),
    };

    let signature = bounded(
        "signature verifier",
        state.deadline(),
        state.verifier.verify(document, &bundle.issuer_public_key),
    )
    .await?;
    if !signature.valid {
        tracing::info!(certificate_id = %id, "embedded signature invalid");
        return Err(VerificationError::SignatureInvalid);
    }

    tracing::info!(certificate_id = %id, signer = ?signature.signer, "certificate verified");
    Ok(VerificationReport::reconcile(bundle, digest, record, signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eight_field_payload_is_complete() {
        let bundle = BundleInput::Payload("cid|Jane|Tech U|CS101|2025-01-01|0xabc|PEM|CERT-1")
            .into_bundle()
            .unwrap();
        assert_eq!(bundle.grade, None);
    }

    #[test]
    fn short_payload_is_malformed() {
        let err = BundleInput::Payload("cid|Jane|Tech U").into_bundle().unwrap_err();
        assert!(matches!(err, VerificationError::MalformedInput(_)));
    }

    #[test]
    fn file_without_identifier_is_malformed() {
        let file = br#"{"ipfsCid":"cid","studentName":"Jane","universityName":"Tech U",
            "courseName":"CS101","issueDate":"2025-01-01","walletAddress":"0xabc",
            "publicKey":"PEM"}"#;
        let err = BundleInput::File {
            bytes: file,
            certificate_id: None,
        }
        .into_bundle()
        .unwrap_err();
        assert!(matches!(err, VerificationError::MalformedInput(_)));

        let bundle = BundleInput::File {
            bytes: file,
            certificate_id: Some("CERT-7"),
        }
        .into_bundle()
        .unwrap();
        assert_eq!(bundle.certificate_id.as_str(), "CERT-7");
    }

    #[test]
    fn unparseable_file_is_malformed() {
        let err = BundleInput::File {
            bytes: b"not json",
            certificate_id: Some("CERT-1"),
        }
        .into_bundle()
        .unwrap_err();
        assert!(matches!(err, VerificationError::MalformedInput(_)));
    }
}
