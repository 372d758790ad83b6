//! # In-Memory Collaborators
//!
//! Deterministic stand-ins for the ledger, content store, signature
//! verifier and mailer, used by tests across the workspace.
//!
//! Each fake can be given an artificial latency to exercise deadline
//! handling in callers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use certichain_core::{CertificateId, DocumentDigest, LedgerAddress, TxHash};
use parking_lot::{Mutex, RwLock};

use crate::error::ClientError;
use crate::ledger::{CredentialRecord, InstitutionRecord, Ledger, TxStatus, WhitelistEntry};
use crate::mailer::{Mailer, OutgoingMail};
use crate::verifier::{SignatureReport, SignatureVerifier};
use crate::content::ContentStore;

async fn simulate_latency(latency: &RwLock<Option<Duration>>) {
    let delay = *latency.read();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

// ── Ledger ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct LedgerState {
    institutions: HashMap<LedgerAddress, InstitutionRecord>,
    credentials: HashMap<CertificateId, CredentialRecord>,
    /// Keyed by institution name.
    whitelist: HashMap<String, String>,
    transactions: HashMap<TxHash, TxStatus>,
}

/// In-memory credential registry with the contract's read semantics.
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    contract: LedgerAddress,
    state: Arc<RwLock<LedgerState>>,
    latency: Arc<RwLock<Option<Duration>>>,
}

impl MemoryLedger {
    pub fn new(contract: LedgerAddress) -> Self {
        Self {
            contract,
            state: Arc::new(RwLock::new(LedgerState::default())),
            latency: Arc::new(RwLock::new(None)),
        }
    }

    /// Delay every read by `latency`. `None` removes the delay.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    pub fn whitelist(&self, name: &str, email: &str) {
        self.state
            .write()
            .whitelist
            .insert(name.to_string(), email.to_string());
    }

    pub fn register_institution(&self, record: InstitutionRecord) {
        self.state
            .write()
            .institutions
            .insert(record.address.clone(), record);
    }

    /// Record a credential as the contract's `issueCertificate` would.
    /// Existing records are not overwritten.
    pub fn issue(&self, id: CertificateId, digest: String, issuer: LedgerAddress) -> bool {
        let mut state = self.state.write();
        if state.credentials.contains_key(&id) {
            return false;
        }
        state.credentials.insert(
            id,
            CredentialRecord {
                digest,
                revoked: false,
                issuer,
            },
        );
        true
    }

    /// Set the revocation flag. Returns false for unknown identifiers.
    pub fn revoke(&self, id: &CertificateId) -> bool {
        match self.state.write().credentials.get_mut(id) {
            Some(record) => {
                record.revoked = true;
                true
            }
            None => false,
        }
    }

    pub fn set_transaction_status(&self, tx: TxHash, status: TxStatus) {
        self.state.write().transactions.insert(tx, status);
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn institution(
        &self,
        address: &LedgerAddress,
    ) -> Result<Option<InstitutionRecord>, ClientError> {
        simulate_latency(&self.latency).await;
        Ok(self.state.read().institutions.get(address).cloned())
    }

    async fn credential(&self, id: &CertificateId) -> Result<CredentialRecord, ClientError> {
        simulate_latency(&self.latency).await;
        Ok(self
            .state
            .read()
            .credentials
            .get(id)
            .cloned()
            .unwrap_or_else(CredentialRecord::absent))
    }

    async fn whitelist_entry(&self, name: &str) -> Result<WhitelistEntry, ClientError> {
        simulate_latency(&self.latency).await;
        Ok(match self.state.read().whitelist.get(name) {
            Some(email) => WhitelistEntry {
                whitelisted: true,
                email: email.clone(),
            },
            None => WhitelistEntry {
                whitelisted: false,
                email: String::new(),
            },
        })
    }

    async fn transaction_status(&self, tx: &TxHash) -> Result<TxStatus, ClientError> {
        simulate_latency(&self.latency).await;
        Ok(self
            .state
            .read()
            .transactions
            .get(tx)
            .copied()
            .unwrap_or(TxStatus::Pending))
    }

    fn contract_address(&self) -> &LedgerAddress {
        &self.contract
    }
}

// ── Content store ───────────────────────────────────────────────────────────

/// In-memory content store. Locators are derived from the document digest.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentStore {
    documents: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    latency: Arc<RwLock<Option<Duration>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Locator the store assigns to `document`.
    pub fn locator_for(document: &[u8]) -> String {
        format!("bafk{}", DocumentDigest::of(document).to_hex())
    }

    /// Store a document directly, bypassing the async interface.
    pub fn insert(&self, document: &[u8]) -> String {
        let locator = Self::locator_for(document);
        self.documents.write().insert(locator.clone(), document.to_vec());
        locator
    }

    /// Drop a document, simulating an unpinned or unreachable file.
    pub fn remove(&self, locator: &str) -> bool {
        self.documents.write().remove(locator).is_some()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, _file_name: &str, document: Vec<u8>) -> Result<String, ClientError> {
        simulate_latency(&self.latency).await;
        Ok(self.insert(&document))
    }

    async fn get(&self, locator: &str) -> Result<Vec<u8>, ClientError> {
        simulate_latency(&self.latency).await;
        self.documents
            .read()
            .get(locator)
            .cloned()
            .ok_or_else(|| ClientError::Api {
                endpoint: format!("GET /ipfs/{locator}"),
                status: 404,
                body: "not found".into(),
            })
    }
}

// ── Signature verifier ──────────────────────────────────────────────────────

/// Verifier that accepts exactly the (document, key) pairs it was told were
/// signed.
#[derive(Debug, Clone, Default)]
pub struct StaticVerifier {
    signed: Arc<RwLock<HashMap<(DocumentDigest, String), String>>>,
    latency: Arc<RwLock<Option<Duration>>>,
}

impl StaticVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Mark `document` as carrying a valid signature by `public_key_pem`.
    pub fn sign(&self, document: &[u8], public_key_pem: &str, signer: &str) {
        self.signed.write().insert(
            (DocumentDigest::of(document), public_key_pem.to_string()),
            signer.to_string(),
        );
    }
}

#[async_trait]
impl SignatureVerifier for StaticVerifier {
    async fn verify(
        &self,
        document: Vec<u8>,
        public_key_pem: &str,
    ) -> Result<SignatureReport, ClientError> {
        simulate_latency(&self.latency).await;
        let key = (DocumentDigest::of(&document), public_key_pem.to_string());
        Ok(match self.signed.read().get(&key) {
            Some(signer) => SignatureReport::valid(signer.clone(), "2024-06-01T00:00:00Z"),
            None => SignatureReport::invalid(),
        })
    }
}

// ── Mailer ──────────────────────────────────────────────────────────────────

/// Mailer that keeps every message for inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutgoingMail>>>,
    failing: Arc<RwLock<HashSet<String>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().clone()
    }

    /// Most recent message to `to`, if any.
    pub fn last_to(&self, to: &str) -> Option<OutgoingMail> {
        self.sent.lock().iter().rev().find(|m| m.to == to).cloned()
    }

    /// Make delivery to `to` fail.
    pub fn fail_for(&self, to: &str) {
        self.failing.write().insert(to.to_string());
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), ClientError> {
        if self.failing.read().contains(&mail.to) {
            return Err(ClientError::Api {
                endpoint: "POST mail relay".into(),
                status: 503,
                body: "relay unavailable".into(),
            });
        }
        self.sent.lock().push(mail.clone());
        Ok(())
    }
}
