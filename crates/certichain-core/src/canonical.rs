//! # Canonical Certificate Hash
//!
//! The certificate digest is SHA-256 over the plain concatenation, in fixed
//! order, of:
//!
//! ```text
//! locator ‖ subject ‖ issuer name ‖ program ‖ issue date ‖ issuer address ‖ issuer public key ‖ grade
//! ```
//!
//! No separators are inserted and no field is trimmed, case-folded or
//! re-encoded. A missing grade contributes the empty string. The digest is
//! rendered as `0x` + lowercase hex.
//!
//! Because fields are concatenated without separators, moving characters
//! across a field boundary yields the same preimage. That property is part of
//! the ledger format already in use and is kept as-is.

use crate::digest::{certificate_digest, CertificateDigest};

/// The eight hashed fields of a certificate, borrowed in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertificateFields<'a> {
    /// Content-store locator (CID) of the signed document.
    pub locator: &'a str,
    pub subject_name: &'a str,
    pub issuer_name: &'a str,
    pub program_name: &'a str,
    pub issue_date: &'a str,
    /// Issuer ledger address, exactly as it will appear in the bundle.
    pub issuer_address: &'a str,
    /// Issuer public key material (PEM).
    pub issuer_public_key: &'a str,
    pub grade: Option<&'a str>,
}

/// The exact byte sequence hashed into a [`CertificateDigest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPreimage(Vec<u8>);

impl CanonicalPreimage {
    pub fn new(fields: &CertificateFields<'_>) -> Self {
        let parts = [
            fields.locator,
            fields.subject_name,
            fields.issuer_name,
            fields.program_name,
            fields.issue_date,
            fields.issuer_address,
            fields.issuer_public_key,
            fields.grade.unwrap_or(""),
        ];
        let mut bytes = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());
        for part in parts {
            bytes.extend_from_slice(part.as_bytes());
        }
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Compute the canonical digest of a certificate's fields.
pub fn canonical_hash(fields: &CertificateFields<'_>) -> CertificateDigest {
    certificate_digest(&CanonicalPreimage::new(fields))
}
