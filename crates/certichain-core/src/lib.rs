//! # certichain-core — Foundational Types for CertiChain
//!
//! This crate defines the primitives that every other CertiChain crate builds
//! on: the canonical certificate hash, ledger and account identities, and the
//! verification bundle a third party presents when checking a credential.
//! It depends on nothing internal and performs no I/O.
//!
//! ## Key Design Principles
//!
//! 1. **One hash construction.** Issuance and verification both compute the
//!    certificate digest through [`canonical_hash()`]. [`CertificateDigest`]
//!    has no constructor from arbitrary bytes, so a digest either comes from
//!    the canonical preimage or is parsed from a ledger-reported string for
//!    comparison.
//!
//! 2. **Newtypes for identities.** [`Email`], [`LedgerAddress`],
//!    [`CertificateId`] and [`TxHash`] validate at construction. Addresses
//!    compare case-insensitively; emails are normalized to lowercase.
//!
//! 3. **Field order is part of the format.** The preimage concatenates the
//!    eight fields with no separators. Reordering fields changes the digest.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `certichain-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod bundle;
pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;

pub use bundle::{BundleFile, VerificationBundle, FIELD_SEPARATOR};
pub use canonical::{canonical_hash, CanonicalPreimage, CertificateFields};
pub use digest::{certificate_digest, CertificateDigest, DocumentDigest};
pub use error::CoreError;
pub use identity::{CertificateId, Email, LedgerAddress, TxHash};
