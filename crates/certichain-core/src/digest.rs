//! # Digests
//!
//! [`CertificateDigest`] is the value written to the ledger for every issued
//! credential. It can only be computed from a [`CanonicalPreimage`], which
//! is how issuance and verification are kept on the same construction.
//!
//! [`DocumentDigest`] identifies raw document bytes (the signed PDF) and is
//! used as the key of the verified-signature cache.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalPreimage;
use crate::error::CoreError;
use crate::identity::is_hex_with_prefix;

/// SHA-256 digest of a canonical certificate preimage.
///
/// Renders as `0x` followed by 64 lowercase hex characters, the exact form
/// stored on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CertificateDigest([u8; 32]);

impl CertificateDigest {
    /// Parse a ledger-reported digest string.
    ///
    /// Hex case is ignored. An empty string (the ledger's answer for an
    /// unknown certificate) is an error, not a digest.
    pub fn parse(reported: &str) -> Result<Self, CoreError> {
        if !is_hex_with_prefix(reported, 64) {
            return Err(CoreError::InvalidDigest(reported.to_string()));
        }
        let decoded = hex::decode(&reported[2..])
            .map_err(|_| CoreError::InvalidDigest(reported.to_string()))?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }

    /// Compare against a ledger-reported digest string.
    ///
    /// The comparison is byte-exact against the [`Display`](std::fmt::Display)
    /// form, which is what issuance writes to the ledger. A reported digest
    /// in any other spelling (uppercase hex, no prefix) is a mismatch.
    pub fn matches_reported(&self, reported: &str) -> bool {
        reported.as_bytes() == self.to_string().as_bytes()
    }

    /// Lowercase hex without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for CertificateDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl TryFrom<String> for CertificateDigest {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CertificateDigest> for String {
    fn from(value: CertificateDigest) -> Self {
        value.to_string()
    }
}

/// Compute the certificate digest of a canonical preimage.
///
/// Accepts only `&CanonicalPreimage`, so no code path can hash certificate
/// fields assembled some other way.
pub fn certificate_digest(preimage: &CanonicalPreimage) -> CertificateDigest {
    let hash = Sha256::digest(preimage.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    CertificateDigest(bytes)
}

/// SHA-256 of raw document bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentDigest([u8; 32]);

impl DocumentDigest {
    pub fn of(document: &[u8]) -> Self {
        let hash = Sha256::digest(document);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for DocumentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}
