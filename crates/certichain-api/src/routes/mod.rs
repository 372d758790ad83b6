//! # Route Modules
//!
//! Each module defines the Axum routers for one API surface. `lib.rs`
//! mounts the public routers directly and the protected ones behind the
//! session middleware.

pub mod certificates;
pub mod credentials;
pub mod documents;
pub mod institutions;
pub mod registration;
pub mod session;
pub mod verification;

use certichain_client::UnsignedTransaction;
use serde::Serialize;
use utoipa::ToSchema;

/// Contract call for the client's wallet to sign and submit.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionDto {
    /// Sending wallet address.
    pub from: String,
    /// Registry contract address.
    pub to: String,
    /// `0x`-prefixed ABI call data.
    pub data: String,
}

impl From<UnsignedTransaction> for TransactionDto {
    fn from(tx: UnsignedTransaction) -> Self {
        Self {
            from: tx.from.to_string(),
            to: tx.to.to_string(),
            data: tx.data,
        }
    }
}
