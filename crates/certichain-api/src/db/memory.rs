//! In-memory institution store.
//!
//! All operations are synchronous under a `parking_lot::RwLock`; the lock is
//! never held across an `.await`. Each trait method is one critical section,
//! which gives the same per-row atomicity as a conditional `UPDATE`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use certichain_core::{Email, LedgerAddress};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{AccountState, InstitutionAccount, InstitutionStore, PendingRegistration, StoreError};

#[derive(Debug, Clone, Default)]
pub struct MemoryInstitutionStore {
    rows: Arc<RwLock<HashMap<Email, InstitutionAccount>>>,
}

impl MemoryInstitutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `f` to the row for `email` under the write lock.
    fn with_row<R>(
        &self,
        email: &Email,
        f: impl FnOnce(&mut InstitutionAccount) -> R,
    ) -> Option<R> {
        self.rows.write().get_mut(email).map(f)
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

fn pending_matches(account: &InstitutionAccount, nonce: Uuid, now: DateTime<Utc>) -> bool {
    account
        .pending
        .as_ref()
        .is_some_and(|p| p.nonce == nonce && p.expires_at > now)
}

#[async_trait]
impl InstitutionStore for MemoryInstitutionStore {
    async fn find(&self, email: &Email) -> Result<Option<InstitutionAccount>, StoreError> {
        Ok(self.rows.read().get(email).cloned())
    }

    async fn upsert_pending(
        &self,
        email: &Email,
        pending: &PendingRegistration,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut rows = self.rows.write();
        match rows.get_mut(email) {
            Some(account) if account.is_active() => Ok(false),
            Some(account) => {
                account.name = pending.name.clone();
                account.public_key = pending.public_key.clone();
                account.state = AccountState::PendingEmailVerification;
                account.pending = Some(pending.clone());
                account.updated_at = now;
                Ok(true)
            }
            None => {
                rows.insert(
                    email.clone(),
                    InstitutionAccount {
                        email: email.clone(),
                        name: pending.name.clone(),
                        public_key: pending.public_key.clone(),
                        ledger_address: None,
                        password_hash: None,
                        active_session: None,
                        state: AccountState::PendingEmailVerification,
                        pending: Some(pending.clone()),
                        created_at: now,
                        updated_at: now,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn mark_email_sent(
        &self,
        email: &Email,
        nonce: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .with_row(email, |account| {
                let current = account.state == AccountState::PendingEmailVerification
                    && account.pending.as_ref().is_some_and(|p| p.nonce == nonce);
                if current {
                    account.state = AccountState::PendingWalletConfirmation;
                    account.updated_at = now;
                }
                current
            })
            .unwrap_or(false))
    }

    async fn record_candidate_address(
        &self,
        email: &Email,
        nonce: Uuid,
        address: &LedgerAddress,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .with_row(email, |account| {
                if !pending_matches(account, nonce, now) {
                    return false;
                }
                if let Some(pending) = account.pending.as_mut() {
                    pending.candidate_address = Some(address.clone());
                }
                account.updated_at = now;
                true
            })
            .unwrap_or(false))
    }

    async fn activate(
        &self,
        email: &Email,
        nonce: Uuid,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<InstitutionAccount>, StoreError> {
        Ok(self
            .with_row(email, |account| {
                if !pending_matches(account, nonce, now) {
                    return None;
                }
                let pending = account.pending.take()?;
                let Some(address) = pending.candidate_address.clone() else {
                    account.pending = Some(pending);
                    return None;
                };
                account.state = AccountState::Active;
                account.name = pending.name;
                account.public_key = pending.public_key;
                account.ledger_address = Some(address);
                account.password_hash = Some(password_hash.to_string());
                account.active_session = None;
                account.updated_at = now;
                Some(account.clone())
            })
            .flatten())
    }

    async fn replace_session(
        &self,
        email: &Email,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .with_row(email, |account| {
                if !account.is_active() {
                    return false;
                }
                account.active_session = Some(session_id);
                account.updated_at = now;
                true
            })
            .unwrap_or(false))
    }

    async fn clear_session(
        &self,
        email: &Email,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .with_row(email, |account| {
                if account.active_session != Some(session_id) {
                    return false;
                }
                account.active_session = None;
                account.updated_at = now;
                true
            })
            .unwrap_or(false))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let _ = self.rows.read().len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> Email {
        Email::parse("registrar@uni.edu").unwrap()
    }

    fn addr() -> LedgerAddress {
        LedgerAddress::parse("0x00000000000000000000000000000000000000aa").unwrap()
    }

    fn pending(nonce: Uuid) -> PendingRegistration {
        PendingRegistration {
            name: "Uni".into(),
            public_key: "PEM".into(),
            nonce,
            expires_at: Utc::now() + chrono::Duration::hours(1),
            candidate_address: None,
        }
    }

    #[tokio::test]
    async fn activation_is_at_most_once() {
        let store = MemoryInstitutionStore::new();
        let nonce = Uuid::new_v4();
        let now = Utc::now();
        assert!(store.upsert_pending(&email(), &pending(nonce), now).await.unwrap());
        assert!(store
            .record_candidate_address(&email(), nonce, &addr(), now)
            .await
            .unwrap());

        let first = store.activate(&email(), nonce, "$argon2id$x", now).await.unwrap();
        let second = store.activate(&email(), nonce, "$argon2id$y", now).await.unwrap();
        let account = first.unwrap();
        assert!(second.is_none());
        assert!(account.is_active());
        assert!(account.pending.is_none());
        assert_eq!(account.ledger_address, Some(addr()));
        assert_eq!(account.password_hash.as_deref(), Some("$argon2id$x"));
    }

    #[tokio::test]
    async fn activation_requires_prepared_address() {
        let store = MemoryInstitutionStore::new();
        let nonce = Uuid::new_v4();
        let now = Utc::now();
        store.upsert_pending(&email(), &pending(nonce), now).await.unwrap();
        assert!(store.activate(&email(), nonce, "h", now).await.unwrap().is_none());
        assert!(store.find(&email()).await.unwrap().unwrap().pending.is_some());
    }

    #[tokio::test]
    async fn reinitiation_supersedes_earlier_nonce() {
        let store = MemoryInstitutionStore::new();
        let (old, new) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();
        store.upsert_pending(&email(), &pending(old), now).await.unwrap();
        store.upsert_pending(&email(), &pending(new), now).await.unwrap();
        assert!(!store
            .record_candidate_address(&email(), old, &addr(), now)
            .await
            .unwrap());
        assert!(store
            .record_candidate_address(&email(), new, &addr(), now)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn active_account_is_not_reset() {
        let store = MemoryInstitutionStore::new();
        let nonce = Uuid::new_v4();
        let now = Utc::now();
        store.upsert_pending(&email(), &pending(nonce), now).await.unwrap();
        store.record_candidate_address(&email(), nonce, &addr(), now).await.unwrap();
        store.activate(&email(), nonce, "h", now).await.unwrap();
        assert!(!store
            .upsert_pending(&email(), &pending(Uuid::new_v4()), now)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn stale_logout_does_not_clear_newer_session() {
        let store = MemoryInstitutionStore::new();
        let nonce = Uuid::new_v4();
        let now = Utc::now();
        store.upsert_pending(&email(), &pending(nonce), now).await.unwrap();
        store.record_candidate_address(&email(), nonce, &addr(), now).await.unwrap();
        store.activate(&email(), nonce, "h", now).await.unwrap();

        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(store.replace_session(&email(), first, now).await.unwrap());
        assert!(store.replace_session(&email(), second, now).await.unwrap());
        assert!(!store.clear_session(&email(), first, now).await.unwrap());
        let account = store.find(&email()).await.unwrap().unwrap();
        assert_eq!(account.active_session, Some(second));
    }

    #[tokio::test]
    async fn expired_pending_record_cannot_be_prepared() {
        let store = MemoryInstitutionStore::new();
        let nonce = Uuid::new_v4();
        let mut record = pending(nonce);
        record.expires_at = Utc::now() - chrono::Duration::seconds(1);
        store.upsert_pending(&email(), &record, Utc::now()).await.unwrap();
        assert!(!store
            .record_candidate_address(&email(), nonce, &addr(), Utc::now())
            .await
            .unwrap());
    }
}
