//! # Identity Newtypes
//!
//! Validated wrappers for the identifiers that cross component boundaries:
//! institution emails, ledger addresses, certificate identifiers and
//! transaction hashes.
//!
//! ## Normalization
//!
//! - [`Email`] is trimmed and lowercased at construction, so every lookup and
//!   uniqueness check is case-insensitive.
//! - [`LedgerAddress`] keeps the text it was given (the canonical hash covers
//!   the address exactly as issued) but compares case-insensitively.

use std::hash::{Hash, Hasher};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ── Email ───────────────────────────────────────────────────────────────────

/// Institution email address, normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Parse and normalize an email address.
    ///
    /// Accepts `local@domain` with non-empty parts, a dot in the domain and
    /// no whitespace. This is a shape check, not deliverability validation.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let normalized = raw.trim().to_ascii_lowercase();
        let valid = match normalized.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !domain.contains('@')
                    && !normalized.chars().any(char::is_whitespace)
            }
            None => false,
        };
        if valid {
            Ok(Self(normalized))
        } else {
            Err(CoreError::InvalidEmail(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── LedgerAddress ───────────────────────────────────────────────────────────

/// A 20-byte ledger account address in `0x`-prefixed hex.
///
/// Equality and hashing ignore hex case, so a checksummed address and its
/// lowercase form are the same account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LedgerAddress(String);

impl LedgerAddress {
    /// The zero address, reported by the ledger for absent records.
    pub const ZERO: &'static str = "0x0000000000000000000000000000000000000000";

    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if is_hex_with_prefix(trimmed, 40) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(CoreError::InvalidAddress(raw.to_string()))
        }
    }

    /// The zero-address sentinel.
    pub fn zero() -> Self {
        Self(Self::ZERO.to_string())
    }

    /// True if this is the zero-address sentinel.
    pub fn is_zero(&self) -> bool {
        self.0[2..].bytes().all(|b| b == b'0')
    }

    /// The address exactly as supplied.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase form, used as a storage key and in ABI encoding.
    pub fn to_lowercase(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// Raw 20 address bytes.
    pub fn to_bytes(&self) -> [u8; 20] {
        let mut out = [0u8; 20];
        // Validated at construction, so decoding cannot fail.
        if let Ok(decoded) = hex::decode(&self.0[2..]) {
            out.copy_from_slice(&decoded);
        }
        out
    }

    /// Build an address from raw bytes (lowercase hex).
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }
}

impl PartialEq for LedgerAddress {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for LedgerAddress {}

impl Hash for LedgerAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_lowercase().hash(state);
    }
}

impl TryFrom<String> for LedgerAddress {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LedgerAddress> for String {
    fn from(value: LedgerAddress) -> Self {
        value.0
    }
}

impl std::fmt::Display for LedgerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── CertificateId ───────────────────────────────────────────────────────────

/// Maximum accepted length for a certificate identifier.
const MAX_CERTIFICATE_ID_LEN: usize = 128;

/// Ledger key for a credential record.
///
/// Freshly minted identifiers have the form `CERT-{unix_millis}-{8 hex}`.
/// Any non-blank identifier up to 128 characters without a `|` is accepted
/// when parsing, since older records use `CERT-{unix_millis}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CertificateId(String);

impl CertificateId {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        if raw.trim().is_empty()
            || raw.len() > MAX_CERTIFICATE_ID_LEN
            || raw.contains(crate::bundle::FIELD_SEPARATOR)
        {
            return Err(CoreError::InvalidCertificateId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// Mint a new time-ordered identifier.
    ///
    /// The random suffix keeps identifiers unique when several are minted
    /// within the same millisecond.
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix: u32 = rand::thread_rng().gen();
        Self(format!("CERT-{millis}-{suffix:08x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CertificateId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CertificateId> for String {
    fn from(value: CertificateId) -> Self {
        value.0
    }
}

impl std::fmt::Display for CertificateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── TxHash ──────────────────────────────────────────────────────────────────

/// A ledger transaction hash (`0x` + 64 hex characters), stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash(String);

impl TxHash {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if is_hex_with_prefix(trimmed, 64) {
            Ok(Self(trimmed.to_ascii_lowercase()))
        } else {
            Err(CoreError::InvalidTxHash(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TxHash {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TxHash> for String {
    fn from(value: TxHash) -> Self {
        value.0
    }
}

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// `0x` followed by exactly `hex_len` hex digits.
pub(crate) fn is_hex_with_prefix(s: &str, hex_len: usize) -> bool {
    s.len() == hex_len + 2
        && (s.starts_with("0x") || s.starts_with("0X"))
        && s[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn email_is_lowercased_and_trimmed() {
        let email = Email::parse("  Registrar@Uni.EDU ").unwrap();
        assert_eq!(email.as_str(), "registrar@uni.edu");
        assert_eq!(email, Email::parse("registrar@uni.edu").unwrap());
    }

    #[test]
    fn email_rejects_bad_shapes() {
        for bad in ["", "no-at-sign", "@uni.edu", "a@", "a@nodot", "a b@uni.edu", "a@.edu"] {
            assert!(Email::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn email_deserializes_through_validation() {
        let email: Email = serde_json::from_str("\"Dean@Uni.edu\"").unwrap();
        assert_eq!(email.as_str(), "dean@uni.edu");
        assert!(serde_json::from_str::<Email>("\"nope\"").is_err());
    }

    #[test]
    fn address_equality_ignores_case() {
        let a = LedgerAddress::parse("0xAbCdEf0000000000000000000000000000000001").unwrap();
        let b = LedgerAddress::parse("0xabcdef0000000000000000000000000000000001").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "0xAbCdEf0000000000000000000000000000000001");

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn address_rejects_wrong_length_or_digits() {
        assert!(LedgerAddress::parse("").is_err());
        assert!(LedgerAddress::parse("0x123").is_err());
        assert!(LedgerAddress::parse("0xzz00000000000000000000000000000000000000").is_err());
        assert!(LedgerAddress::parse("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef00").is_err());
    }

    #[test]
    fn zero_address_is_detected() {
        assert!(LedgerAddress::zero().is_zero());
        assert!(!LedgerAddress::parse("0x0000000000000000000000000000000000000001")
            .unwrap()
            .is_zero());
    }

    #[test]
    fn address_bytes_roundtrip_lowercases() {
        let a = LedgerAddress::parse("0xAB00000000000000000000000000000000000001").unwrap();
        let back = LedgerAddress::from_bytes(a.to_bytes());
        assert_eq!(back.as_str(), "0xab00000000000000000000000000000000000001");
        assert_eq!(a, back);
    }

    #[test]
    fn generated_certificate_ids_are_distinct() {
        let ids: HashSet<_> = (0..256).map(|_| CertificateId::generate()).collect();
        assert_eq!(ids.len(), 256);
        assert!(ids.iter().all(|id| id.as_str().starts_with("CERT-")));
    }

    #[test]
    fn certificate_id_rejects_blank_and_separator() {
        assert!(CertificateId::parse("   ").is_err());
        assert!(CertificateId::parse("CERT-1|2").is_err());
        assert!(CertificateId::parse(&"x".repeat(129)).is_err());
        assert!(CertificateId::parse("CERT-1700000000000").is_ok());
    }

    #[test]
    fn tx_hash_requires_64_hex() {
        let ok = format!("0x{}", "A".repeat(64));
        assert_eq!(TxHash::parse(&ok).unwrap().as_str(), format!("0x{}", "a".repeat(64)));
        assert!(TxHash::parse("0x1234").is_err());
    }
}
