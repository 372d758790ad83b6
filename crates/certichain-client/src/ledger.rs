//! # Credential Ledger Client
//!
//! Reads institution and credential state from the credential registry
//! contract over EVM JSON-RPC, and encodes (but never submits) the write
//! calls an institution's wallet signs.
//!
//! ## Contract Interface
//!
//! ```solidity
//! function registerUniversity(string name, string publicKey) external;
//! function issueCertificate(string certificateId, string certificateHash) external;
//! function revokeCertificate(string certificateId) external;
//! function certificates(string) view returns (string certificateHash, bool isRevoked, address universityAddress);
//! function universities(address) view returns (string name, string email, address walletAddress, string publicKey, bool isRegistered);
//! function isUniversityWhitelisted(string name) view returns (bool, string email);
//! ```
//!
//! An unknown certificate reads back as an empty hash and the zero address.

use std::time::Duration;

use async_trait::async_trait;
use certichain_core::{CertificateDigest, CertificateId, LedgerAddress, TxHash};
use serde::{Deserialize, Serialize};

use crate::abi::{encode_call, Decoder, Token};
use crate::config::LedgerConfig;
use crate::error::ClientError;
use crate::retry::RetryPolicy;

/// Canonical signatures of the registry contract's functions.
pub mod functions {
    pub const REGISTER_INSTITUTION: &str = "registerUniversity(string,string)";
    pub const ISSUE_CREDENTIAL: &str = "issueCertificate(string,string)";
    pub const REVOKE_CREDENTIAL: &str = "revokeCertificate(string)";
    pub const CREDENTIALS: &str = "certificates(string)";
    pub const INSTITUTIONS: &str = "universities(address)";
    pub const WHITELIST: &str = "isUniversityWhitelisted(string)";
}

/// A registered institution as recorded on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionRecord {
    pub name: String,
    pub email: String,
    pub address: LedgerAddress,
    pub public_key: String,
}

/// A credential record as recorded on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Digest string as written at issuance. Empty for unknown identifiers.
    pub digest: String,
    pub revoked: bool,
    /// Issuing address. The zero address for unknown identifiers.
    pub issuer: LedgerAddress,
}

impl CredentialRecord {
    /// The record the ledger reports for an identifier it has never seen.
    pub fn absent() -> Self {
        Self {
            digest: String::new(),
            revoked: false,
            issuer: LedgerAddress::zero(),
        }
    }

    pub fn exists(&self) -> bool {
        !self.issuer.is_zero()
    }
}

/// Whitelist status of an institution name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhitelistEntry {
    pub whitelisted: bool,
    /// Contact email registered with the whitelist entry.
    pub email: String,
}

/// Mining status of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// No receipt yet.
    Pending,
    Succeeded,
    /// Mined but reverted.
    Failed,
}

/// Call data for a contract write, to be signed by the sender's wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub from: LedgerAddress,
    pub to: LedgerAddress,
    /// `0x`-prefixed ABI call data.
    pub data: String,
}

impl UnsignedTransaction {
    pub fn register_institution(
        from: &LedgerAddress,
        contract: &LedgerAddress,
        name: &str,
        public_key: &str,
    ) -> Self {
        Self {
            from: from.clone(),
            to: contract.clone(),
            data: encode_call(
                functions::REGISTER_INSTITUTION,
                &[Token::String(name), Token::String(public_key)],
            ),
        }
    }

    pub fn issue_credential(
        from: &LedgerAddress,
        contract: &LedgerAddress,
        id: &CertificateId,
        digest: &CertificateDigest,
    ) -> Self {
        let digest = digest.to_string();
        Self {
            from: from.clone(),
            to: contract.clone(),
            data: encode_call(
                functions::ISSUE_CREDENTIAL,
                &[Token::String(id.as_str()), Token::String(&digest)],
            ),
        }
    }

    pub fn revoke_credential(
        from: &LedgerAddress,
        contract: &LedgerAddress,
        id: &CertificateId,
    ) -> Self {
        Self {
            from: from.clone(),
            to: contract.clone(),
            data: encode_call(functions::REVOKE_CREDENTIAL, &[Token::String(id.as_str())]),
        }
    }
}

/// Read access to the credential registry.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Look up a registered institution by address. `None` if unregistered.
    async fn institution(
        &self,
        address: &LedgerAddress,
    ) -> Result<Option<InstitutionRecord>, ClientError>;

    /// Read a credential record. Unknown identifiers yield
    /// [`CredentialRecord::absent()`], not an error.
    async fn credential(&self, id: &CertificateId) -> Result<CredentialRecord, ClientError>;

    /// Whitelist status for an institution name.
    async fn whitelist_entry(&self, name: &str) -> Result<WhitelistEntry, ClientError>;

    /// Receipt status of a submitted transaction.
    async fn transaction_status(&self, tx: &TxHash) -> Result<TxStatus, ClientError>;

    /// Address of the registry contract, used as the `to` of write calls.
    fn contract_address(&self) -> &LedgerAddress;
}

/// Ledger client over EVM JSON-RPC.
#[derive(Debug)]
pub struct EvmLedger {
    client: reqwest::Client,
    config: LedgerConfig,
    retry: RetryPolicy,
}

impl EvmLedger {
    pub fn new(config: LedgerConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "ledger client init".into(),
                source: e,
            })?;
        Ok(Self {
            client,
            config,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Send a JSON-RPC request and return the `result` member. Every method
    /// this client calls is a read, so transient failures are retried.
    async fn rpc_call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ClientError> {
        self.retry
            .run(method, || self.rpc_call_once(method, params.clone()))
            .await
    }

    async fn rpc_call_once(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ClientError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(self.config.rpc_url.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::transport(method, e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                endpoint: method.to_string(),
                status,
                body,
            });
        }

        let json: serde_json::Value =
            resp.json().await.map_err(|e| ClientError::Deserialization {
                endpoint: method.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(error) = json.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown RPC error");
            return Err(ClientError::Rpc {
                method: method.to_string(),
                message: message.to_string(),
            });
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| ClientError::Deserialization {
                endpoint: method.to_string(),
                reason: "JSON-RPC response missing 'result' field".to_string(),
            })
    }

    /// Execute a read-only contract call at the latest block.
    async fn eth_call(&self, data: String) -> Result<Decoder, ClientError> {
        let call = serde_json::json!({
            "to": self.config.contract_address.to_lowercase(),
            "data": data,
        });
        let result = self
            .rpc_call("eth_call", serde_json::json!([call, "latest"]))
            .await?;
        let raw = result.as_str().ok_or_else(|| ClientError::Deserialization {
            endpoint: "eth_call".into(),
            reason: "non-string result".into(),
        })?;
        let decoder = Decoder::from_hex(raw)?;
        if decoder.is_empty() {
            return Err(ClientError::Abi(
                "empty return data; is the contract deployed at the configured address?".into(),
            ));
        }
        Ok(decoder)
    }
}

#[async_trait]
impl Ledger for EvmLedger {
    async fn institution(
        &self,
        address: &LedgerAddress,
    ) -> Result<Option<InstitutionRecord>, ClientError> {
        let out = self
            .eth_call(encode_call(functions::INSTITUTIONS, &[Token::Address(address)]))
            .await?;
        if !out.bool(4)? {
            return Ok(None);
        }
        Ok(Some(InstitutionRecord {
            name: out.string(0)?,
            email: out.string(1)?,
            address: out.address(2)?,
            public_key: out.string(3)?,
        }))
    }

    async fn credential(&self, id: &CertificateId) -> Result<CredentialRecord, ClientError> {
        let out = self
            .eth_call(encode_call(functions::CREDENTIALS, &[Token::String(id.as_str())]))
            .await?;
        Ok(CredentialRecord {
            digest: out.string(0)?,
            revoked: out.bool(1)?,
            issuer: out.address(2)?,
        })
    }

    async fn whitelist_entry(&self, name: &str) -> Result<WhitelistEntry, ClientError> {
        let out = self
            .eth_call(encode_call(functions::WHITELIST, &[Token::String(name)]))
            .await?;
        Ok(WhitelistEntry {
            whitelisted: out.bool(0)?,
            email: out.string(1)?,
        })
    }

    async fn transaction_status(&self, tx: &TxHash) -> Result<TxStatus, ClientError> {
        let receipt = self
            .rpc_call("eth_getTransactionReceipt", serde_json::json!([tx.as_str()]))
            .await?;

        if receipt.is_null() {
            return Ok(TxStatus::Pending);
        }

        let status = receipt
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("0x0");
        if status == "0x1" {
            Ok(TxStatus::Succeeded)
        } else {
            Ok(TxStatus::Failed)
        }
    }

    fn contract_address(&self) -> &LedgerAddress {
        &self.config.contract_address
    }
}
