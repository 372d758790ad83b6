//! # Content-Addressed Storage
//!
//! Documents are pinned through the Pinata pinning API and retrieved from a
//! public IPFS gateway at `{gateway}/ipfs/{cid}`.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `{pin_url}/pinning/pinFileToIPFS` | Upload (multipart `file`) → `{IpfsHash}` |
//! | GET    | `{gateway_url}/ipfs/{cid}` | Retrieve raw bytes |

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{join, ContentStoreConfig};
use crate::error::ClientError;
use crate::retry::RetryPolicy;

/// Put/get access to content-addressed storage.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a document and return its content locator (CID).
    async fn put(&self, file_name: &str, document: Vec<u8>) -> Result<String, ClientError>;

    /// Fetch a document by locator.
    async fn get(&self, locator: &str) -> Result<Vec<u8>, ClientError>;
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// Pinata-backed content store.
#[derive(Debug, Clone)]
pub struct PinataStore {
    http: reqwest::Client,
    config: ContentStoreConfig,
    retry: RetryPolicy,
}

impl PinataStore {
    pub fn new(config: ContentStoreConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "content client init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            config,
            retry: RetryPolicy::default(),
        })
    }

    /// Retry policy for gateway fetches. Pinning is never retried.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_once(&self, url: &str, endpoint: &str) -> Result<Vec<u8>, ClientError> {
        let resp = self
            .http
            .get(url)
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

        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| ClientError::transport(endpoint, e))
    }
}

/// CIDs are base-encoded multihashes; anything else would let a caller
/// steer the gateway request path.
fn is_plausible_locator(locator: &str) -> bool {
    !locator.is_empty()
        && locator.len() <= 128
        && locator.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[async_trait]
impl ContentStore for PinataStore {
    async fn put(&self, file_name: &str, document: Vec<u8>) -> Result<String, ClientError> {
        let endpoint = "POST /pinning/pinFileToIPFS";
        let jwt = self
            .config
            .api_jwt
            .as_ref()
            .ok_or(ClientError::NotConfigured("PINATA_JWT"))?;
        let url = join(&self.config.pin_url, "pinning/pinFileToIPFS");

        let part = reqwest::multipart::Part::bytes(document)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(jwt.as_str())
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

        let pinned: PinResponse = resp.json().await.map_err(|e| ClientError::Deserialization {
            endpoint: endpoint.into(),
            reason: e.to_string(),
        })?;
        tracing::info!(cid = %pinned.ipfs_hash, "document pinned");
        Ok(pinned.ipfs_hash)
    }

    async fn get(&self, locator: &str) -> Result<Vec<u8>, ClientError> {
        if !is_plausible_locator(locator) {
            return Err(ClientError::InvalidRequest(format!(
                "content locator {locator:?} is not a CID"
            )));
        }
        let endpoint = format!("GET /ipfs/{locator}");
        let url = join(&self.config.gateway_url, &format!("ipfs/{locator}"));

        self.retry
            .run(&endpoint, || self.fetch_once(&url, &endpoint))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_shape_check() {
        assert!(is_plausible_locator(
            "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi"
        ));
        assert!(is_plausible_locator("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG"));
        assert!(!is_plausible_locator(""));
        assert!(!is_plausible_locator("../admin"));
        assert!(!is_plausible_locator("cid?x=1"));
    }
}
