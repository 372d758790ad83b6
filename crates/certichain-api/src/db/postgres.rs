//! PostgreSQL institution store.
//!
//! All functions operate on the `institutions` table. Each state transition
//! is one statement whose `WHERE` clause carries the precondition.

use async_trait::async_trait;
use certichain_core::{Email, LedgerAddress};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{AccountState, InstitutionAccount, InstitutionStore, PendingRegistration, StoreError};

const COLUMNS: &str = "email, name, public_key, ledger_address, password_hash, active_session,
     state, pending_name, pending_public_key, pending_nonce, pending_expires_at,
     pending_candidate_address, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgInstitutionStore {
    pool: PgPool,
}

impl PgInstitutionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstitutionStore for PgInstitutionStore {
    async fn find(&self, email: &Email) -> Result<Option<InstitutionAccount>, StoreError> {
        let row = sqlx::query_as::<_, InstitutionRow>(&format!(
            "SELECT {COLUMNS} FROM institutions WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(InstitutionRow::into_record).transpose()
    }

    async fn upsert_pending(
        &self,
        email: &Email,
        pending: &PendingRegistration,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO institutions (email, name, public_key, state, pending_name,
             pending_public_key, pending_nonce, pending_expires_at, created_at, updated_at)
             VALUES ($1, $2, $3, 'PENDING_EMAIL_VERIFICATION', $2, $3, $4, $5, $6, $6)
             ON CONFLICT (email) DO UPDATE SET
               name = EXCLUDED.name,
               public_key = EXCLUDED.public_key,
               state = 'PENDING_EMAIL_VERIFICATION',
               pending_name = EXCLUDED.pending_name,
               pending_public_key = EXCLUDED.pending_public_key,
               pending_nonce = EXCLUDED.pending_nonce,
               pending_expires_at = EXCLUDED.pending_expires_at,
               pending_candidate_address = NULL,
               updated_at = EXCLUDED.updated_at
             WHERE institutions.state <> 'ACTIVE'",
        )
        .bind(email.as_str())
        .bind(&pending.name)
        .bind(&pending.public_key)
        .bind(pending.nonce)
        .bind(pending.expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_email_sent(
        &self,
        email: &Email,
        nonce: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE institutions SET state = 'PENDING_WALLET_CONFIRMATION', updated_at = $3
             WHERE email = $1 AND pending_nonce = $2 AND state = 'PENDING_EMAIL_VERIFICATION'",
        )
        .bind(email.as_str())
        .bind(nonce)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_candidate_address(
        &self,
        email: &Email,
        nonce: Uuid,
        address: &LedgerAddress,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE institutions SET pending_candidate_address = $3, updated_at = $4
             WHERE email = $1 AND pending_nonce = $2 AND pending_expires_at > $4",
        )
        .bind(email.as_str())
        .bind(nonce)
        .bind(address.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn activate(
        &self,
        email: &Email,
        nonce: Uuid,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<InstitutionAccount>, StoreError> {
        let row = sqlx::query_as::<_, InstitutionRow>(&format!(
            "UPDATE institutions SET
               state = 'ACTIVE',
               name = pending_name,
               public_key = pending_public_key,
               ledger_address = pending_candidate_address,
               password_hash = $3,
               active_session = NULL,
               pending_name = NULL,
               pending_public_key = NULL,
               pending_nonce = NULL,
               pending_expires_at = NULL,
               pending_candidate_address = NULL,
               updated_at = $4
             WHERE email = $1 AND pending_nonce = $2
               AND pending_candidate_address IS NOT NULL
               AND pending_expires_at > $4
             RETURNING {COLUMNS}"
        ))
        .bind(email.as_str())
        .bind(nonce)
        .bind(password_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(InstitutionRow::into_record).transpose()
    }

    async fn replace_session(
        &self,
        email: &Email,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE institutions SET active_session = $2, updated_at = $3
             WHERE email = $1 AND state = 'ACTIVE'",
        )
        .bind(email.as_str())
        .bind(session_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_session(
        &self,
        email: &Email,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE institutions SET active_session = NULL, updated_at = $3
             WHERE email = $1 AND active_session = $2",
        )
        .bind(email.as_str())
        .bind(session_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Internal row type for sqlx deserialization.
#[derive(sqlx::FromRow)]
struct InstitutionRow {
    email: String,
    name: String,
    public_key: String,
    ledger_address: Option<String>,
    password_hash: Option<String>,
    active_session: Option<Uuid>,
    state: String,
    pending_name: Option<String>,
    pending_public_key: Option<String>,
    pending_nonce: Option<Uuid>,
    pending_expires_at: Option<DateTime<Utc>>,
    pending_candidate_address: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InstitutionRow {
    fn into_record(self) -> Result<InstitutionAccount, StoreError> {
        let corrupt = |reason: String| {
            tracing::warn!(email = %self.email, %reason, "corrupt institution row");
            StoreError::Corrupt {
                email: self.email.clone(),
                reason,
            }
        };

        let email = Email::parse(&self.email).map_err(|e| corrupt(e.to_string()))?;
        let state = AccountState::parse(&self.state)
            .ok_or_else(|| corrupt(format!("unknown state {:?}", self.state)))?;
        let ledger_address = self
            .ledger_address
            .as_deref()
            .map(LedgerAddress::parse)
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?;
        let candidate_address = self
            .pending_candidate_address
            .as_deref()
            .map(LedgerAddress::parse)
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?;

        let pending = match (
            self.pending_nonce,
            self.pending_expires_at,
            self.pending_name.clone(),
            self.pending_public_key.clone(),
        ) {
            (Some(nonce), Some(expires_at), Some(name), Some(public_key)) => {
                Some(PendingRegistration {
                    name,
                    public_key,
                    nonce,
                    expires_at,
                    candidate_address,
                })
            }
            _ => None,
        };

        Ok(InstitutionAccount {
            email,
            name: self.name,
            public_key: self.public_key,
            ledger_address,
            password_hash: self.password_hash,
            active_session: self.active_session,
            state,
            pending,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(state: &str) -> InstitutionRow {
        let now = Utc::now();
        InstitutionRow {
            email: "registrar@uni.edu".into(),
            name: "Uni".into(),
            public_key: "PEM".into(),
            ledger_address: None,
            password_hash: None,
            active_session: None,
            state: state.into(),
            pending_name: Some("Uni".into()),
            pending_public_key: Some("PEM".into()),
            pending_nonce: Some(Uuid::new_v4()),
            pending_expires_at: Some(now),
            pending_candidate_address: Some("0x00000000000000000000000000000000000000aa".into()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn pending_row_maps_to_account() {
        let account = row("PENDING_WALLET_CONFIRMATION").into_record().unwrap();
        assert_eq!(account.state, AccountState::PendingWalletConfirmation);
        let pending = account.pending.unwrap();
        assert!(pending.candidate_address.is_some());
    }

    #[test]
    fn unknown_state_is_corrupt() {
        let err = row("SUSPENDED").into_record().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn bad_address_is_corrupt() {
        let mut r = row("ACTIVE");
        r.ledger_address = Some("0xABC".into());
        assert!(matches!(
            r.into_record().unwrap_err(),
            StoreError::Corrupt { .. }
        ));
    }
}
