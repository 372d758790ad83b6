//! # Core Error Types
//!
//! Validation failures raised while constructing identities, parsing
//! verification payloads, or reading ledger-reported digests.

use thiserror::Error;

/// Errors produced by `certichain-core` constructors and parsers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A required field was absent or blank.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Email address failed basic shape validation.
    #[error("invalid email address: {0:?}")]
    InvalidEmail(String),

    /// Ledger address is not `0x` followed by 40 hex characters.
    #[error("invalid ledger address: {0:?}")]
    InvalidAddress(String),

    /// Transaction hash is not `0x` followed by 64 hex characters.
    #[error("invalid transaction hash: {0:?}")]
    InvalidTxHash(String),

    /// Certificate identifier is blank or too long.
    #[error("invalid certificate identifier: {0:?}")]
    InvalidCertificateId(String),

    /// A digest string is not `0x` followed by 64 hex characters.
    #[error("invalid certificate digest: {0:?}")]
    InvalidDigest(String),

    /// The pipe-delimited payload has the wrong number of fields.
    #[error("malformed verification payload: {0}")]
    MalformedPayload(String),

    /// The structured bundle file could not be decoded.
    #[error("invalid bundle file: {0}")]
    InvalidBundleFile(String),

    /// A field value contains the QR payload separator and could not be
    /// encoded as a payload.
    #[error("field {0} must not contain '|'")]
    SeparatorInField(&'static str),
}

impl CoreError {
    /// True for errors caused by an incomplete or unparseable verification
    /// bundle, as opposed to an invalid identity value.
    pub fn is_malformed_bundle(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_)
                | Self::MalformedPayload(_)
                | Self::InvalidBundleFile(_)
                | Self::InvalidCertificateId(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_names_the_field() {
        let err = CoreError::MissingField("subject_name");
        assert!(err.to_string().contains("subject_name"));
        assert!(err.is_malformed_bundle());
    }

    #[test]
    fn identity_errors_are_not_bundle_errors() {
        assert!(!CoreError::InvalidEmail("x".into()).is_malformed_bundle());
        assert!(!CoreError::InvalidAddress("x".into()).is_malformed_bundle());
        assert!(!CoreError::InvalidTxHash("x".into()).is_malformed_bundle());
    }
}
