//! # Verification Bundle
//!
//! The metadata a third party presents to verify a credential. It arrives in
//! one of two encodings:
//!
//! - **QR payload**: pipe-delimited, in the order
//!   `locator|subject|issuer|program|date|address|publicKey|certificateId|grade`.
//!   The trailing grade may be omitted or empty.
//! - **Bundle file**: the JSON document emailed to the holder at issuance
//!   ([`BundleFile`]). The certificate identifier may be carried in the file
//!   or supplied separately.
//!
//! Field values are kept verbatim. Presence is checked, content is not
//! normalized, since any change would alter the canonical hash.

use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_hash, CertificateFields};
use crate::digest::CertificateDigest;
use crate::error::CoreError;
use crate::identity::CertificateId;

/// Separator between fields of the QR payload.
pub const FIELD_SEPARATOR: char = '|';

/// Number of fields before the optional grade.
const REQUIRED_PAYLOAD_FIELDS: usize = 8;

/// A complete verification bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationBundle {
    pub locator: String,
    pub subject_name: String,
    pub issuer_name: String,
    pub program_name: String,
    pub issue_date: String,
    pub issuer_address: String,
    pub issuer_public_key: String,
    pub certificate_id: CertificateId,
    pub grade: Option<String>,
}

impl VerificationBundle {
    /// Parse a pipe-delimited QR payload.
    ///
    /// Exactly eight or nine fields are accepted. A field containing a `|`
    /// would shift every later field, so extra fields are rejected rather
    /// than ignored.
    pub fn from_payload(payload: &str) -> Result<Self, CoreError> {
        let parts: Vec<&str> = payload.split(FIELD_SEPARATOR).collect();
        if parts.len() < REQUIRED_PAYLOAD_FIELDS || parts.len() > REQUIRED_PAYLOAD_FIELDS + 1 {
            return Err(CoreError::MalformedPayload(format!(
                "expected {} or {} fields, found {}",
                REQUIRED_PAYLOAD_FIELDS,
                REQUIRED_PAYLOAD_FIELDS + 1,
                parts.len()
            )));
        }

        Ok(Self {
            locator: required("locator", parts[0])?,
            subject_name: required("subject_name", parts[1])?,
            issuer_name: required("issuer_name", parts[2])?,
            program_name: required("program_name", parts[3])?,
            issue_date: required("issue_date", parts[4])?,
            issuer_address: required("issuer_address", parts[5])?,
            issuer_public_key: required("issuer_public_key", parts[6])?,
            certificate_id: parse_certificate_id(parts[7])?,
            grade: parts.get(8).and_then(|g| optional(g)),
        })
    }

    /// Reject a bundle whose payload encoding would not parse back.
    ///
    /// Issuance must call this before hashing: a `|` inside any field splits
    /// it in two, and the issued credential could never be verified from its
    /// QR payload.
    pub fn ensure_encodable(&self) -> Result<(), CoreError> {
        let fields = [
            ("locator", self.locator.as_str()),
            ("subject_name", self.subject_name.as_str()),
            ("issuer_name", self.issuer_name.as_str()),
            ("program_name", self.program_name.as_str()),
            ("issue_date", self.issue_date.as_str()),
            ("issuer_address", self.issuer_address.as_str()),
            ("issuer_public_key", self.issuer_public_key.as_str()),
            ("certificate_id", self.certificate_id.as_str()),
            ("grade", self.grade.as_deref().unwrap_or("")),
        ];
        match fields.iter().find(|(_, v)| v.contains(FIELD_SEPARATOR)) {
            Some((name, _)) => Err(CoreError::SeparatorInField(*name)),
            None => Ok(()),
        }
    }

    /// Encode as a QR payload. Inverse of [`from_payload`](Self::from_payload)
    /// for bundles that pass [`ensure_encodable`](Self::ensure_encodable).
    pub fn to_payload(&self) -> String {
        let sep = FIELD_SEPARATOR.to_string();
        [
            self.locator.as_str(),
            &self.subject_name,
            &self.issuer_name,
            &self.program_name,
            &self.issue_date,
            &self.issuer_address,
            &self.issuer_public_key,
            self.certificate_id.as_str(),
            self.grade.as_deref().unwrap_or(""),
        ]
        .join(&sep)
    }

    /// The hashed fields, in canonical order.
    pub fn fields(&self) -> CertificateFields<'_> {
        CertificateFields {
            locator: &self.locator,
            subject_name: &self.subject_name,
            issuer_name: &self.issuer_name,
            program_name: &self.program_name,
            issue_date: &self.issue_date,
            issuer_address: &self.issuer_address,
            issuer_public_key: &self.issuer_public_key,
            grade: self.grade.as_deref(),
        }
    }

    /// Recompute the canonical digest of this bundle.
    pub fn canonical_hash(&self) -> CertificateDigest {
        canonical_hash(&self.fields())
    }

    /// The bundle-file form handed to the credential holder.
    pub fn to_file(&self) -> BundleFile {
        BundleFile {
            locator: Some(self.locator.clone()),
            subject_name: Some(self.subject_name.clone()),
            issuer_name: Some(self.issuer_name.clone()),
            program_name: Some(self.program_name.clone()),
            issue_date: Some(self.issue_date.clone()),
            issuer_address: Some(self.issuer_address.clone()),
            issuer_public_key: Some(self.issuer_public_key.clone()),
            certificate_id: Some(self.certificate_id.to_string()),
            grade: self.grade.clone(),
        }
    }
}

/// JSON bundle file as emailed to credential holders.
///
/// Every field is optional at the serde layer so that an incomplete file is
/// reported as a missing field instead of a generic decode error. Lowercase
/// aliases from earlier file versions are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleFile {
    #[serde(rename = "ipfsCid", alias = "locator", skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    #[serde(rename = "studentName", skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    #[serde(rename = "universityName", alias = "universityname", skip_serializing_if = "Option::is_none")]
    pub issuer_name: Option<String>,
    #[serde(rename = "courseName", skip_serializing_if = "Option::is_none")]
    pub program_name: Option<String>,
    #[serde(rename = "issueDate", skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<String>,
    #[serde(rename = "walletAddress", alias = "walletaddress", skip_serializing_if = "Option::is_none")]
    pub issuer_address: Option<String>,
    #[serde(rename = "publicKey", skip_serializing_if = "Option::is_none")]
    pub issuer_public_key: Option<String>,
    #[serde(rename = "certificateId", skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
}

impl BundleFile {
    /// Decode a bundle file from raw JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(bytes).map_err(|e| CoreError::InvalidBundleFile(e.to_string()))
    }

    /// Check completeness and build a [`VerificationBundle`].
    ///
    /// `certificate_id` overrides any identifier carried in the file.
    pub fn into_bundle(self, certificate_id: Option<&str>) -> Result<VerificationBundle, CoreError> {
        let id = match certificate_id.or(self.certificate_id.as_deref()) {
            Some(id) => parse_certificate_id(id)?,
            None => return Err(CoreError::MissingField("certificate_id")),
        };
        Ok(VerificationBundle {
            locator: required_owned("locator", self.locator)?,
            subject_name: required_owned("subject_name", self.subject_name)?,
            issuer_name: required_owned("issuer_name", self.issuer_name)?,
            program_name: required_owned("program_name", self.program_name)?,
            issue_date: required_owned("issue_date", self.issue_date)?,
            issuer_address: required_owned("issuer_address", self.issuer_address)?,
            issuer_public_key: required_owned("issuer_public_key", self.issuer_public_key)?,
            certificate_id: id,
            grade: self.grade.as_deref().and_then(optional),
        })
    }
}

fn required(name: &'static str, value: &str) -> Result<String, CoreError> {
    if value.trim().is_empty() {
        Err(CoreError::MissingField(name))
    } else {
        Ok(value.to_string())
    }
}

fn required_owned(name: &'static str, value: Option<String>) -> Result<String, CoreError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(CoreError::MissingField(name)),
    }
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_certificate_id(raw: &str) -> Result<CertificateId, CoreError> {
    if raw.trim().is_empty() {
        return Err(CoreError::MissingField("certificate_id"));
    }
    CertificateId::parse(raw)
}
