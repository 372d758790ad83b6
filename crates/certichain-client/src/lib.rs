//! # certichain-client — Collaborator Clients for CertiChain
//!
//! Narrow, typed interfaces to the systems CertiChain consumes but does not
//! own:
//!
//! | Collaborator | Trait | Production impl | In-memory impl |
//! |---|---|---|---|
//! | Credential ledger (EVM contract) | [`Ledger`] | [`EvmLedger`] | [`MemoryLedger`] |
//! | Content-addressed storage | [`ContentStore`] | [`PinataStore`] | [`MemoryContentStore`] |
//! | PDF signature verifier | [`SignatureVerifier`] | [`HttpSignatureVerifier`] | [`StaticVerifier`] |
//! | Email delivery | [`Mailer`] | [`HttpMailer`], [`LogMailer`] | [`RecordingMailer`] |
//!
//! The API service holds each collaborator as an `Arc<dyn Trait>`, so tests
//! and local development swap in the in-memory implementations without
//! touching protocol code.
//!
//! ## Retries
//!
//! Idempotent calls (ledger reads, gateway fetches, signature checks) are
//! repeated on transient failures under a [`RetryPolicy`]. Pinning and mail
//! delivery are attempted once.
//!
//! ## Ledger Writes
//!
//! This crate never signs or submits ledger transactions. Write operations
//! are returned as [`UnsignedTransaction`] call data for the institution's
//! wallet to sign.

pub mod abi;
pub mod config;
pub mod content;
pub mod error;
pub mod ledger;
pub mod mailer;
pub mod memory;
pub mod retry;
pub mod verifier;

pub use config::{ConfigError, ContentStoreConfig, LedgerConfig, MailerConfig, VerifierConfig};
pub use content::{ContentStore, PinataStore};
pub use error::ClientError;
pub use ledger::{
    CredentialRecord, EvmLedger, InstitutionRecord, Ledger, TxStatus, UnsignedTransaction,
    WhitelistEntry,
};
pub use mailer::{Attachment, HttpMailer, LogMailer, Mailer, OutgoingMail};
pub use memory::{MemoryContentStore, MemoryLedger, RecordingMailer, StaticVerifier};
pub use retry::RetryPolicy;
pub use verifier::{HttpSignatureVerifier, SignatureReport, SignatureVerifier};
