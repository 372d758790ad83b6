//! # Institution Registration
//!
//! Two-phase onboarding: an email-bound token proves control of the
//! institution's mailbox, then a wallet-signed `registerUniversity`
//! transaction proves control of its ledger address.
//!
//! ```text
//! Initiate ──► PendingEmailVerification ──(mail sent)──► PendingWalletConfirmation
//!                                                             │
//!                        PrepareWalletTx (records candidate address)
//!                                                             │
//!                                      Finalize ──► Active (pending record cleared)
//! ```
//!
//! The registration token's `jti` is the nonce of the pending record it was
//! issued for. Re-initiating replaces the nonce, so every earlier token
//! stops matching. Activation is one conditional write on that nonce, so a
//! token can finalize at most once.

use certichain_client::{OutgoingMail, TxStatus, UnsignedTransaction};
use certichain_core::{Email, LedgerAddress, TxHash};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::auth::{Audience, Claims, TokenError, TOKEN_TTL_SECS};
use crate::db::{InstitutionAccount, PendingRegistration, StoreError};
use crate::extractors::require_non_blank;
use crate::password::{self, PasswordError};
use crate::state::AppState;
use crate::upstream::{bounded, UpstreamError};

/// Registration failures.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("{0}")]
    Validation(String),
    #[error("institution {0:?} is not whitelisted for this email")]
    NotWhitelisted(String),
    #[error("an institution with this email is already registered")]
    AlreadyRegistered,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("registration record not found or already used")]
    RecordNotFound,
    #[error("registration transaction not confirmed: {0}")]
    TxUnconfirmed(String),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

/// Result of a successful Initiate.
#[derive(Debug, Clone)]
pub struct Initiated {
    pub email: Email,
    pub expires_at: DateTime<Utc>,
}

/// Start (or restart) registration and send the verification email.
#[tracing::instrument(skip(state, public_key))]
pub async fn initiate(
    state: &AppState,
    name: &str,
    email: &str,
    public_key: &str,
) -> Result<Initiated, RegistrationError> {
    require_non_blank(&[
        ("institutionName", name),
        ("email", email),
        ("publicKey", public_key),
    ])
    .map_err(RegistrationError::Validation)?;
    let email = Email::parse(email).map_err(|e| RegistrationError::Validation(e.to_string()))?;
    let name = name.trim();

    if state.config.enforce_whitelist {
        let entry = bounded(
            "ledger",
            state.deadline(),
            state.ledger.whitelist_entry(name),
        )
        .await?;
        if !entry.whitelisted || !entry.email.trim().eq_ignore_ascii_case(email.as_str()) {
            tracing::info!(institution = name, "registration rejected: not whitelisted");
            return Err(RegistrationError::NotWhitelisted(name.to_string()));
        }
    }

    if let Some(existing) = state.institutions.find(&email).await? {
        if existing.is_active() {
            return Err(RegistrationError::AlreadyRegistered);
        }
    }

    let now = Utc::now();
    let nonce = Uuid::new_v4();
    let token = state
        .tokens
        .issue_registration(&email, name, public_key, nonce)?;
    let pending = PendingRegistration {
        name: name.to_string(),
        public_key: public_key.to_string(),
        nonce,
        expires_at: now + Duration::seconds(TOKEN_TTL_SECS),
        candidate_address: None,
    };

    if !state.institutions.upsert_pending(&email, &pending, now).await? {
        // Activated between the read above and this write.
        return Err(RegistrationError::AlreadyRegistered);
    }

    let mail = verification_mail(&email, name, &state.config.frontend_url, &token);
    bounded("mailer", state.deadline(), state.mailer.send(&mail)).await?;

    if !state
        .institutions
        .mark_email_sent(&email, nonce, Utc::now())
        .await?
    {
        tracing::debug!("pending record superseded before the email was marked sent");
    }

    metrics::counter!("certichain_registrations_initiated_total").increment(1);
    tracing::info!("registration initiated");
    Ok(Initiated {
        email,
        expires_at: pending.expires_at,
    })
}

fn verification_mail(email: &Email, name: &str, frontend_url: &str, token: &str) -> OutgoingMail {
    let link = format!("{frontend_url}/create-account/{token}");
    OutgoingMail {
        to: email.as_str().to_string(),
        subject: "Verify your institution's CertiChain registration".to_string(),
        html: format!(
            "<p>Hello {name},</p>\
             <p>Follow this link within one hour to connect your wallet and \
             finish registering on CertiChain:</p>\
             <p><a href=\"{link}\">{link}</a></p>"
        ),
        attachments: Vec::new(),
    }
}

fn registration_claims(
    state: &AppState,
    token: &str,
) -> Result<(Claims, Email), RegistrationError> {
    let claims = state.tokens.verify(token, Audience::Registration)?;
    let email = Email::parse(&claims.sub)
        .map_err(|_| TokenError::Invalid("token subject is not an email".into()))?;
    Ok((claims, email))
}

/// Bind a wallet address to the pending registration and return the
/// unsigned `registerUniversity` call for that wallet to sign.
#[tracing::instrument(skip(state, token))]
pub async fn prepare_wallet_tx(
    state: &AppState,
    token: &str,
    address: &str,
) -> Result<UnsignedTransaction, RegistrationError> {
    let (claims, email) = registration_claims(state, token)?;
    let address =
        LedgerAddress::parse(address).map_err(|e| RegistrationError::Validation(e.to_string()))?;
    let public_key = claims
        .pk
        .as_deref()
        .ok_or_else(|| TokenError::Invalid("registration token has no public key".into()))?;

    if !state
        .institutions
        .record_candidate_address(&email, claims.jti, &address, Utc::now())
        .await?
    {
        return Err(RegistrationError::RecordNotFound);
    }

    tracing::info!(email = %email, %address, "registration transaction prepared");
    Ok(UnsignedTransaction::register_institution(
        &address,
        state.ledger.contract_address(),
        &claims.name,
        public_key,
    ))
}

/// Activate the account once the wallet has submitted its registration
/// transaction.
#[tracing::instrument(skip(state, token, password))]
pub async fn finalize(
    state: &AppState,
    token: &str,
    password: &str,
    tx_hash: &str,
) -> Result<InstitutionAccount, RegistrationError> {
    let (claims, email) = registration_claims(state, token)?;
    password::validate(password)?;
    let tx_hash =
        TxHash::parse(tx_hash).map_err(|e| RegistrationError::Validation(e.to_string()))?;

    if state.config.confirm_registration_tx {
        let status = bounded(
            "ledger",
            state.deadline(),
            state.ledger.transaction_status(&tx_hash),
        )
        .await?;
        match status {
            TxStatus::Succeeded => {}
            TxStatus::Pending => {
                return Err(RegistrationError::TxUnconfirmed(format!(
                    "{} has not been mined",
                    tx_hash.as_str()
                )))
            }
            TxStatus::Failed => {
                return Err(RegistrationError::TxUnconfirmed(format!(
                    "{} reverted",
                    tx_hash.as_str()
                )))
            }
        }
    }

    let password = password.to_string();
    let password_hash = tokio::task::spawn_blocking(move || password::hash(&password))
        .await
        .map_err(|e| RegistrationError::Internal(format!("hashing task failed: {e}")))??;

    let account = state
        .institutions
        .activate(&email, claims.jti, &password_hash, Utc::now())
        .await?
        .ok_or(RegistrationError::RecordNotFound)?;

    metrics::counter!("certichain_registrations_completed_total").increment(1);
    tracing::info!(
        email = %email,
        tx_hash = tx_hash.as_str(),
        "institution account activated"
    );
    Ok(account)
}
