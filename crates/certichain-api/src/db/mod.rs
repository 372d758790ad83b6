//! # Institution Persistence Layer
//!
//! Institution accounts live in a single relational table keyed by
//! lowercase email. Each account row carries its in-flight registration
//! (the pending record) and the identifier of its one live session.
//!
//! ## Backends
//!
//! The database is **optional**. When `DATABASE_URL` is set, accounts are
//! persisted to PostgreSQL ([`postgres::PgInstitutionStore`]). When absent,
//! the API keeps them in memory ([`memory::MemoryInstitutionStore`]),
//! suitable for development and testing.
//!
//! ## Atomicity
//!
//! Every state transition is a single conditional write: one `UPDATE ...
//! WHERE` in Postgres, one write-lock critical section in memory. Callers
//! learn whether the condition held from the return value and never
//! read-then-write.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use certichain_core::{Email, LedgerAddress};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

/// Registration lifecycle of an institution account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountState {
    PendingEmailVerification,
    PendingWalletConfirmation,
    Active,
}

impl AccountState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingEmailVerification => "PENDING_EMAIL_VERIFICATION",
            Self::PendingWalletConfirmation => "PENDING_WALLET_CONFIRMATION",
            Self::Active => "ACTIVE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING_EMAIL_VERIFICATION" => Some(Self::PendingEmailVerification),
            "PENDING_WALLET_CONFIRMATION" => Some(Self::PendingWalletConfirmation),
            "ACTIVE" => Some(Self::Active),
            _ => None,
        }
    }
}

/// The registration in flight for an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRegistration {
    pub name: String,
    pub public_key: String,
    /// Binds the record to the most recently issued registration token.
    pub nonce: Uuid,
    pub expires_at: DateTime<Utc>,
    /// Wallet address the registration transaction was prepared for.
    pub candidate_address: Option<LedgerAddress>,
}

/// An institution account row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstitutionAccount {
    pub email: Email,
    pub name: String,
    pub public_key: String,
    /// Set at activation and never changed afterwards.
    pub ledger_address: Option<LedgerAddress>,
    /// Argon2id PHC string.
    pub password_hash: Option<String>,
    pub active_session: Option<Uuid>,
    pub state: AccountState,
    pub pending: Option<PendingRegistration>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstitutionAccount {
    pub fn is_active(&self) -> bool {
        self.state == AccountState::Active
    }
}

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt institution row for {email}: {reason}")]
    Corrupt { email: String, reason: String },
}

/// Atomic operations on institution accounts.
#[async_trait]
pub trait InstitutionStore: Send + Sync {
    async fn find(&self, email: &Email) -> Result<Option<InstitutionAccount>, StoreError>;

    /// Create the account in `PendingEmailVerification`, or reset a
    /// non-active account to it, replacing any earlier pending record.
    ///
    /// Returns `false` without writing if the account is already active.
    async fn upsert_pending(
        &self,
        email: &Email,
        pending: &PendingRegistration,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// `PendingEmailVerification → PendingWalletConfirmation` once the
    /// verification message for `nonce` has been sent.
    async fn mark_email_sent(
        &self,
        email: &Email,
        nonce: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Record the candidate wallet on the unexpired pending record bound
    /// to `nonce`.
    async fn record_candidate_address(
        &self,
        email: &Email,
        nonce: Uuid,
        address: &LedgerAddress,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Activate the account and clear its pending record in one write,
    /// conditioned on an unexpired pending record bound to `nonce` with a
    /// recorded candidate address.
    ///
    /// Returns the activated account, or `None` if the condition failed.
    async fn activate(
        &self,
        email: &Email,
        nonce: Uuid,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<InstitutionAccount>, StoreError>;

    /// Overwrite the active session of an active account.
    async fn replace_session(
        &self,
        email: &Email,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Clear the active session, only if it is still `session_id`.
    async fn clear_session(
        &self,
        email: &Email,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Verify the backend is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — running in-memory only mode. \
                 Institution accounts will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_state_roundtrips_through_column_value() {
        for state in [
            AccountState::PendingEmailVerification,
            AccountState::PendingWalletConfirmation,
            AccountState::Active,
        ] {
            assert_eq!(AccountState::parse(state.as_str()), Some(state));
        }
        assert_eq!(AccountState::parse("EXPIRED"), None);
    }
}
