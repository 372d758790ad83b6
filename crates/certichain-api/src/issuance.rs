//! # Issuance Transaction Assembly
//!
//! Builds everything an institution's wallet needs to write a credential:
//! the canonical digest, a fresh certificate identifier, and the unsigned
//! `issueCertificate(id, digest)` call. The issuer's name and public key are
//! taken from its ledger registration, never from the request, so the
//! hashed tuple always matches what verifiers will see on the ledger.
//!
//! Every hashed field, including the two read from the ledger, must be free
//! of the QR payload separator.
//!
//! Nothing is signed or submitted here.

use certichain_client::{Attachment, OutgoingMail, UnsignedTransaction};
use certichain_core::{CertificateDigest, CertificateId, Email, VerificationBundle};

use crate::auth::CallerIdentity;
use crate::extractors::require_non_blank;
use crate::state::AppState;
use crate::upstream::{bounded, UpstreamError};

/// Subject line of the credential delivery email.
pub const DELIVERY_SUBJECT: &str = "Your Digital Certificate Has Been Issued!";

/// Issuance failures.
#[derive(Debug, thiserror::Error)]
pub enum IssuanceError {
    #[error("{0}")]
    Validation(String),
    #[error("issuer public key is not registered on the ledger")]
    IssuerKeyMissing,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("{0}")]
    Internal(String),
}

/// Holder-facing credential metadata supplied by the issuer.
#[derive(Debug, Clone)]
pub struct CredentialDraft {
    pub locator: String,
    pub subject_name: String,
    pub program_name: String,
    pub issue_date: String,
    pub grade: Option<String>,
}

/// An assembled, unsigned issuance.
#[derive(Debug, Clone)]
pub struct AssembledIssuance {
    pub certificate_id: CertificateId,
    pub digest: CertificateDigest,
    pub transaction: UnsignedTransaction,
    pub bundle: VerificationBundle,
}

impl AssembledIssuance {
    /// Pipe-delimited payload for the credential's QR code.
    pub fn qr_payload(&self) -> String {
        self.bundle.to_payload()
    }
}

/// Assemble the issuance of `draft` by `issuer`.
#[tracing::instrument(skip(state, draft), fields(issuer = %issuer.address))]
pub async fn assemble(
    state: &AppState,
    issuer: &CallerIdentity,
    draft: CredentialDraft,
) -> Result<AssembledIssuance, IssuanceError> {
    require_non_blank(&[
        ("ipfsCid", &draft.locator),
        ("studentName", &draft.subject_name),
        ("courseName", &draft.program_name),
        ("issueDate", &draft.issue_date),
    ])
    .map_err(IssuanceError::Validation)?;

    let registration = bounded(
        "ledger",
        state.deadline(),
        state.ledger.institution(&issuer.address),
    )
    .await?
    .filter(|r| !r.public_key.trim().is_empty())
    .ok_or(IssuanceError::IssuerKeyMissing)?;

    let certificate_id = CertificateId::generate();
    let bundle = VerificationBundle {
        locator: draft.locator,
        subject_name: draft.subject_name,
        issuer_name: registration.name,
        program_name: draft.program_name,
        issue_date: draft.issue_date,
        issuer_address: issuer.address.as_str().to_string(),
        issuer_public_key: registration.public_key,
        certificate_id: certificate_id.clone(),
        grade: draft.grade.filter(|g| !g.is_empty()),
    };
    bundle
        .ensure_encodable()
        .map_err(|e| IssuanceError::Validation(e.to_string()))?;
    let digest = bundle.canonical_hash();
    let transaction = UnsignedTransaction::issue_credential(
        &issuer.address,
        state.ledger.contract_address(),
        &certificate_id,
        &digest,
    );

    metrics::counter!("certichain_issuances_assembled_total").increment(1);
    tracing::info!(certificate_id = %certificate_id, %digest, "issuance assembled");
    Ok(AssembledIssuance {
        certificate_id,
        digest,
        transaction,
        bundle,
    })
}

/// Email the holder their bundle file and QR payload.
#[tracing::instrument(skip(state, bundle), fields(certificate_id = %bundle.certificate_id))]
pub async fn deliver(
    state: &AppState,
    issuer: &CallerIdentity,
    bundle: &VerificationBundle,
    holder_email: &str,
) -> Result<(), IssuanceError> {
    let holder = Email::parse(holder_email).map_err(|e| IssuanceError::Validation(e.to_string()))?;
    if !bundle.issuer_address.eq_ignore_ascii_case(issuer.address.as_str()) {
        return Err(IssuanceError::Validation(
            "bundle names a different issuing address".into(),
        ));
    }

    let file = serde_json::to_vec_pretty(&bundle.to_file())
        .map_err(|e| IssuanceError::Internal(format!("bundle serialization failed: {e}")))?;
    let mail = OutgoingMail {
        to: holder.as_str().to_string(),
        subject: DELIVERY_SUBJECT.to_string(),
        html: delivery_body(bundle),
        attachments: vec![Attachment {
            filename: format!("{}.json", bundle.certificate_id),
            content_type: "application/json".to_string(),
            content: file,
        }],
    };
    bounded("mailer", state.deadline(), state.mailer.send(&mail)).await?;

    tracing::info!(holder = %holder, "credential delivered");
    Ok(())
}

fn delivery_body(bundle: &VerificationBundle) -> String {
    let grade = bundle
        .grade
        .as_deref()
        .map(|g| format!("<li>Grade: {g}</li>"))
        .unwrap_or_default();
    format!(
        "<p>Dear {subject},</p>\
         <p>{issuer} has issued your certificate for {program}.</p>\
         <ul><li>Certificate ID: {id}</li><li>Issue date: {date}</li>{grade}</ul>\
         <p>The attached file and the payload below can be used to verify it:</p>\
         <pre>{payload}</pre>",
        subject = bundle.subject_name,
        issuer = bundle.issuer_name,
        program = bundle.program_name,
        id = bundle.certificate_id,
        date = bundle.issue_date,
        payload = bundle.to_payload(),
    )
}
