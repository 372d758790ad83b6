//! # Sessions
//!
//! One live session per institution. Login mints a session id, stores it
//! as the account's `active_session`, and embeds it as the token's `jti`.
//! A token is honored only while its `jti` is still the stored id, so a
//! second login invalidates every token minted before it.

use certichain_core::Email;
use chrono::Utc;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::auth::{Audience, CallerIdentity, TokenError};
use crate::db::StoreError;
use crate::password;
use crate::state::AppState;

/// Session failures.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid email or password")]
    AuthenticationFailed,
    #[error("session has been revoked")]
    SessionRevoked,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

/// A freshly established session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub identity: CallerIdentity,
}

/// Check credentials and replace the account's active session.
#[tracing::instrument(skip(state, password))]
pub async fn login(state: &AppState, email: &str, password: &str) -> Result<Session, SessionError> {
    let email = Email::parse(email).map_err(|_| SessionError::AuthenticationFailed)?;
    let account = state
        .institutions
        .find(&email)
        .await?
        .filter(|a| a.is_active());

    // Unknown and inactive accounts still pay for an argon2 verify.
    let candidate = password.to_string();
    let stored_hash = account.as_ref().and_then(|a| a.password_hash.clone());
    let matches = tokio::task::spawn_blocking(move || match stored_hash {
        Some(stored) => password::verify(&candidate, &stored),
        None => password::verify_decoy(&candidate),
    })
    .await
    .map_err(|e| SessionError::Internal(format!("password check task failed: {e}")))?;

    let (Some(account), true) = (account, matches) else {
        metrics::counter!("certichain_login_failures_total").increment(1);
        return Err(SessionError::AuthenticationFailed);
    };
    let Some(address) = account.ledger_address.clone() else {
        return Err(SessionError::AuthenticationFailed);
    };

    let session_id = Uuid::new_v4();
    if !state
        .institutions
        .replace_session(&email, session_id, Utc::now())
        .await?
    {
        return Err(SessionError::AuthenticationFailed);
    }
    let token = state
        .tokens
        .issue_session(&email, &account.name, &address, session_id)?;

    tracing::info!(email = %email, "institution logged in");
    Ok(Session {
        token,
        identity: CallerIdentity {
            email,
            name: account.name,
            address,
            session_id,
        },
    })
}

/// Resolve a presented session token to the caller it belongs to.
pub async fn authenticate(state: &AppState, token: &str) -> Result<CallerIdentity, SessionError> {
    let claims = state.tokens.verify(token, Audience::Session)?;
    let email = Email::parse(&claims.sub)
        .map_err(|_| TokenError::Invalid("token subject is not an email".into()))?;

    let account = state
        .institutions
        .find(&email)
        .await?
        .filter(|a| a.is_active())
        .ok_or(SessionError::AuthenticationFailed)?;

    let current = account.active_session.unwrap_or(Uuid::nil());
    let presented = claims.jti;
    let same: bool = current.as_bytes().ct_eq(presented.as_bytes()).into();
    if account.active_session.is_none() || !same {
        return Err(SessionError::SessionRevoked);
    }

    let address = account
        .ledger_address
        .ok_or(SessionError::AuthenticationFailed)?;

    Ok(CallerIdentity {
        email,
        name: account.name,
        address,
        session_id: presented,
    })
}

/// End the caller's session if it is still the active one.
pub async fn logout(state: &AppState, caller: &CallerIdentity) -> Result<(), SessionError> {
    let cleared = state
        .institutions
        .clear_session(&caller.email, caller.session_id, Utc::now())
        .await?;
    tracing::info!(email = %caller.email, cleared, "institution logged out");
    Ok(())
}
