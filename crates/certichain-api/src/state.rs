//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers via
//! the `State` extractor.
//!
//! ## Architecture
//!
//! AppState holds:
//! - **Institution store**: account rows, pending registrations and active
//!   session ids (Postgres or in-memory).
//! - **Collaborators**: the ledger, content store, signature verifier and
//!   mailer, each an `Arc<dyn Trait>` so tests inject in-memory fakes.
//! - **Token service**: registration and session JWTs.
//! - **Signature cache**: documents whose embedded signature a given
//!   institution has verified, awaiting publication.

use std::sync::Arc;
use std::time::Duration;

use certichain_client::{
    ContentStore, ContentStoreConfig, EvmLedger, HttpMailer, HttpSignatureVerifier, Ledger,
    LedgerConfig, LogMailer, Mailer, MailerConfig, PinataStore, SignatureVerifier,
    VerifierConfig,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use url::Url;

use crate::auth::{JwtSecret, TokenService};
use crate::db::memory::MemoryInstitutionStore;
use crate::db::InstitutionStore;
use crate::signature_cache::SignatureCache;

/// Default deadline for collaborator calls.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Default lifetime of a verified-signature cache entry.
pub const DEFAULT_SIGNATURE_CACHE_TTL_SECS: u64 = 3600;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub jwt_secret: JwtSecret,
    /// Base URL of the web frontend; registration links point here.
    pub frontend_url: String,
    pub upstream_timeout: Duration,
    /// Require the institution to be whitelisted on the ledger before
    /// registration.
    pub enforce_whitelist: bool,
    /// Require a successful receipt for the registration transaction before
    /// activating an account.
    pub confirm_registration_tx: bool,
    pub signature_cache_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            jwt_secret: JwtSecret::ephemeral(),
            frontend_url: "http://localhost:3000".to_string(),
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            enforce_whitelist: true,
            confirm_registration_tx: false,
            signature_cache_ttl: Duration::from_secs(DEFAULT_SIGNATURE_CACHE_TTL_SECS),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
    #[error(transparent)]
    Collaborator(#[from] certichain_client::ConfigError),
    #[error("collaborator client setup failed: {0}")]
    Client(#[from] certichain_client::ClientError),
}

impl AppConfig {
    /// Load from environment.
    ///
    /// Variables:
    /// - `PORT` (default: 8080)
    /// - `JWT_SECRET` (default: ephemeral random secret, with a warning)
    /// - `FRONTEND_URL` (default: `http://localhost:3000`)
    /// - `UPSTREAM_TIMEOUT_SECS` (default: 30)
    /// - `ENFORCE_WHITELIST` (default: true)
    /// - `CONFIRM_REGISTRATION_TX` (default: false)
    /// - `SIGNATURE_CACHE_TTL_SECS` (default: 3600)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(secret) if secret.len() >= 32 => JwtSecret::new(secret.into_bytes()),
            Ok(_) => {
                return Err(ConfigError::Invalid(
                    "JWT_SECRET",
                    "must be at least 32 bytes".into(),
                ))
            }
            Err(_) => {
                tracing::warn!(
                    "JWT_SECRET not set — using an ephemeral secret. \
                     Tokens will not survive restarts."
                );
                defaults.jwt_secret
            }
        };

        let frontend_url = match std::env::var("FRONTEND_URL") {
            Ok(raw) => {
                Url::parse(&raw).map_err(|e| ConfigError::Invalid("FRONTEND_URL", e.to_string()))?;
                raw.trim_end_matches('/').to_string()
            }
            Err(_) => defaults.frontend_url,
        };

        Ok(Self {
            port: env_parse("PORT", defaults.port)?,
            jwt_secret,
            frontend_url,
            upstream_timeout: Duration::from_secs(env_parse(
                "UPSTREAM_TIMEOUT_SECS",
                DEFAULT_UPSTREAM_TIMEOUT_SECS,
            )?),
            enforce_whitelist: env_parse("ENFORCE_WHITELIST", defaults.enforce_whitelist)?,
            confirm_registration_tx: env_parse(
                "CONFIRM_REGISTRATION_TX",
                defaults.confirm_registration_tx,
            )?,
            signature_cache_ttl: Duration::from_secs(env_parse(
                "SIGNATURE_CACHE_TTL_SECS",
                DEFAULT_SIGNATURE_CACHE_TTL_SECS,
            )?),
        })
    }
}

fn env_parse<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid(var, e.to_string())),
        Err(_) => Ok(default),
    }
}

/// External collaborators.
#[derive(Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn Ledger>,
    pub content: Arc<dyn ContentStore>,
    pub verifier: Arc<dyn SignatureVerifier>,
    pub mailer: Arc<dyn Mailer>,
}

impl Collaborators {
    /// Production clients configured from the environment.
    ///
    /// Without `MAIL_RELAY_URL`, outgoing mail is logged instead of sent.
    pub fn from_env() -> Result<Self, ConfigError> {
        let ledger = EvmLedger::new(LedgerConfig::from_env()?)?;
        let content = PinataStore::new(ContentStoreConfig::from_env()?)?;
        let verifier = HttpSignatureVerifier::new(VerifierConfig::from_env()?)?;

        let mail_config = MailerConfig::from_env()?;
        let mailer: Arc<dyn Mailer> = if mail_config.relay_url.is_some() {
            Arc::new(HttpMailer::new(mail_config)?)
        } else {
            tracing::warn!("MAIL_RELAY_URL not set — outgoing mail will only be logged.");
            Arc::new(LogMailer)
        };

        Ok(Self {
            ledger: Arc::new(ledger),
            content: Arc::new(content),
            verifier: Arc::new(verifier),
            mailer,
        })
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub institutions: Arc<dyn InstitutionStore>,
    pub ledger: Arc<dyn Ledger>,
    pub content: Arc<dyn ContentStore>,
    pub verifier: Arc<dyn SignatureVerifier>,
    pub mailer: Arc<dyn Mailer>,
    pub tokens: TokenService,
    pub signature_cache: SignatureCache,
    /// Present when `DATABASE_URL` is configured; used by readiness probes.
    pub db_pool: Option<PgPool>,
    /// Prometheus handle rendering `/metrics`. Absent in tests.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// State with an in-memory institution store.
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Self {
        Self::with_store(
            config,
            collaborators,
            Arc::new(MemoryInstitutionStore::new()),
            None,
        )
    }

    pub fn with_store(
        config: AppConfig,
        collaborators: Collaborators,
        institutions: Arc<dyn InstitutionStore>,
        db_pool: Option<PgPool>,
    ) -> Self {
        let tokens = TokenService::new(&config.jwt_secret);
        let signature_cache = SignatureCache::new(config.signature_cache_ttl);
        Self {
            config: Arc::new(config),
            institutions,
            ledger: collaborators.ledger,
            content: collaborators.content,
            verifier: collaborators.verifier,
            mailer: collaborators.mailer,
            tokens,
            signature_cache,
            db_pool,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Deadline applied to each collaborator call.
    pub fn deadline(&self) -> Duration {
        self.config.upstream_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert!(config.enforce_whitelist);
        assert!(!config.confirm_registration_tx);
        assert_eq!(config.signature_cache_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn env_parse_falls_back_to_default() {
        let v: u64 = env_parse("CERTICHAIN_NONEXISTENT_VAR", 7).unwrap();
        assert_eq!(v, 7);
    }

    #[test]
    fn config_debug_redacts_secret() {
        let config = AppConfig {
            jwt_secret: JwtSecret::new(b"do-not-print-this-secret".to_vec()),
            ..AppConfig::default()
        };
        assert!(!format!("{config:?}").contains("do-not-print"));
    }
}
