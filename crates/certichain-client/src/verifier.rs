//! # PDF Signature Verifier Client
//!
//! The verifier checks a PDF's embedded signature against a PEM public key.
//!
//! `POST {url}/verify-pdf` with multipart file parts `pdf` and `public_key`.
//! A 200 response carries `{valid, signer?, timestamp?, message?}`; an
//! invalid signature is reported as `valid: false`, not as an HTTP error.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use crate::config::{join, VerifierConfig};
use crate::error::ClientError;
use crate::retry::RetryPolicy;

/// Outcome of an embedded-signature check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignatureReport {
    pub valid: bool,
    /// Signer identity extracted from the signature, if any.
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub signer: Option<String>,
    /// Signing time as reported by the verifier.
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub timestamp: Option<String>,
}

impl SignatureReport {
    pub fn valid(signer: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            valid: true,
            signer: Some(signer.into()),
            timestamp: Some(timestamp.into()),
        }
    }

    pub fn invalid() -> Self {
        Self {
            valid: false,
            signer: None,
            timestamp: None,
        }
    }
}

/// Accept strings, numbers or booleans; the verifier passes signature
/// metadata through from the PDF without normalizing types.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.is_empty() => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Embedded-signature verification.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify(
        &self,
        document: Vec<u8>,
        public_key_pem: &str,
    ) -> Result<SignatureReport, ClientError>;
}

const VERIFY_ENDPOINT: &str = "POST /verify-pdf";

/// HTTP client for the verifier service. A signature check has no side
/// effects, so transient failures are retried.
#[derive(Debug, Clone)]
pub struct HttpSignatureVerifier {
    http: reqwest::Client,
    config: VerifierConfig,
    retry: RetryPolicy,
}

impl HttpSignatureVerifier {
    pub fn new(config: VerifierConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "verifier client init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            config,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn verify_once(
        &self,
        url: &str,
        document: Vec<u8>,
        public_key_pem: &str,
    ) -> Result<SignatureReport, ClientError> {
        let endpoint = VERIFY_ENDPOINT;
        let pdf = reqwest::multipart::Part::bytes(document)
            .file_name("document.pdf")
            .mime_str("application/pdf")
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        let key = reqwest::multipart::Part::bytes(public_key_pem.as_bytes().to_vec())
            .file_name("public_key.pem")
            .mime_str("application/x-pem-file")
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("pdf", pdf)
            .part("public_key", key);

        let resp = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::transport(endpoint, e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                endpoint: endpoint.into(),
                status,
                body,
            });
        }

        resp.json().await.map_err(|e| ClientError::Deserialization {
            endpoint: endpoint.into(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl SignatureVerifier for HttpSignatureVerifier {
    async fn verify(
        &self,
        document: Vec<u8>,
        public_key_pem: &str,
    ) -> Result<SignatureReport, ClientError> {
        let url = join(&self.config.url, "verify-pdf");
        self.retry
            .run(VERIFY_ENDPOINT, || {
                self.verify_once(&url, document.clone(), public_key_pem)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_tolerates_loose_metadata() {
        let r: SignatureReport = serde_json::from_value(serde_json::json!({
            "valid": true,
            "message": "Verification succeeded",
            "signer": "Registrar",
            "timestamp": 1717200000
        }))
        .unwrap();
        assert!(r.valid);
        assert_eq!(r.signer.as_deref(), Some("Registrar"));
        assert_eq!(r.timestamp.as_deref(), Some("1717200000"));
    }

    #[test]
    fn failure_report_has_no_signer() {
        let r: SignatureReport = serde_json::from_value(serde_json::json!({
            "valid": false,
            "message": "Verification failed",
            "error_details": {"reason": "digest mismatch"}
        }))
        .unwrap();
        assert_eq!(r, SignatureReport::invalid());
    }

    #[test]
    fn empty_signer_is_none() {
        let r: SignatureReport =
            serde_json::from_value(serde_json::json!({"valid": true, "signer": ""})).unwrap();
        assert!(r.signer.is_none());
    }
}
