//! Collaborator client configuration.
//!
//! Each collaborator has its own config struct, loaded from environment
//! variables with defaults suitable for local development. Secrets are held
//! in [`Zeroizing`] buffers and redacted from `Debug` output.

use certichain_core::LedgerAddress;
use url::Url;
use zeroize::Zeroizing;

/// Default per-request timeout for collaborator calls.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the EVM JSON-RPC ledger client.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: Url,
    /// Address of the credential registry contract.
    pub contract_address: LedgerAddress,
    pub timeout_secs: u64,
}

impl LedgerConfig {
    /// Load from environment.
    ///
    /// Variables:
    /// - `RPC_PROVIDER_URL` (default: `http://127.0.0.1:8545`)
    /// - `CONTRACT_ADDRESS` (required)
    /// - `LEDGER_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var("CONTRACT_ADDRESS")
            .map_err(|_| ConfigError::Missing("CONTRACT_ADDRESS"))?;
        let contract_address = LedgerAddress::parse(&raw)
            .map_err(|e| ConfigError::Invalid("CONTRACT_ADDRESS", e.to_string()))?;
        Ok(Self {
            rpc_url: env_url("RPC_PROVIDER_URL", "http://127.0.0.1:8545")?,
            contract_address,
            timeout_secs: env_secs("LEDGER_TIMEOUT_SECS"),
        })
    }
}

/// Configuration for the Pinata pinning API and the public IPFS gateway.
#[derive(Clone)]
pub struct ContentStoreConfig {
    /// Pinning API base URL.
    pub pin_url: Url,
    /// Gateway base URL used for retrieval (`{gateway}/ipfs/{cid}`).
    pub gateway_url: Url,
    /// Pinata JWT. Retrieval works without it; uploads fail.
    pub api_jwt: Option<Zeroizing<String>>,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ContentStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStoreConfig")
            .field("pin_url", &self.pin_url)
            .field("gateway_url", &self.gateway_url)
            .field("api_jwt", &self.api_jwt.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ContentStoreConfig {
    /// Load from environment.
    ///
    /// Variables:
    /// - `PINATA_API_URL` (default: `https://api.pinata.cloud`)
    /// - `IPFS_GATEWAY_URL` (default: `https://dweb.link`)
    /// - `PINATA_JWT` (optional)
    /// - `CONTENT_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            pin_url: env_url("PINATA_API_URL", "https://api.pinata.cloud")?,
            gateway_url: env_url("IPFS_GATEWAY_URL", "https://dweb.link")?,
            api_jwt: std::env::var("PINATA_JWT").ok().map(Zeroizing::new),
            timeout_secs: env_secs("CONTENT_TIMEOUT_SECS"),
        })
    }
}

/// Configuration for the PDF signature verification service.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub url: Url,
    pub timeout_secs: u64,
}

impl VerifierConfig {
    /// Load from environment.
    ///
    /// Variables:
    /// - `SIGNATURE_VERIFIER_URL` (default: `http://127.0.0.1:5000`)
    /// - `VERIFIER_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_url("SIGNATURE_VERIFIER_URL", "http://127.0.0.1:5000")?,
            timeout_secs: env_secs("VERIFIER_TIMEOUT_SECS"),
        })
    }
}

/// Configuration for outbound email.
///
/// When `relay_url` is unset the service falls back to logging messages
/// instead of sending them.
#[derive(Clone)]
pub struct MailerConfig {
    pub relay_url: Option<Url>,
    pub relay_token: Option<Zeroizing<String>>,
    /// `From` header for all outgoing mail.
    pub from: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for MailerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailerConfig")
            .field("relay_url", &self.relay_url)
            .field("relay_token", &self.relay_token.as_ref().map(|_| "[REDACTED]"))
            .field("from", &self.from)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl MailerConfig {
    /// Load from environment.
    ///
    /// Variables:
    /// - `MAIL_RELAY_URL` (optional)
    /// - `MAIL_RELAY_TOKEN` (optional)
    /// - `MAIL_FROM` (default: `CertiChain <no-reply@certichain.local>`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let relay_url = match std::env::var("MAIL_RELAY_URL") {
            Ok(raw) => Some(
                Url::parse(&raw)
                    .map_err(|e| ConfigError::InvalidUrl("MAIL_RELAY_URL".into(), e.to_string()))?,
            ),
            Err(_) => None,
        };
        Ok(Self {
            relay_url,
            relay_token: std::env::var("MAIL_RELAY_TOKEN").ok().map(Zeroizing::new),
            from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "CertiChain <no-reply@certichain.local>".to_string()),
            timeout_secs: env_secs("MAIL_TIMEOUT_SECS"),
        })
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

fn env_secs(var: &str) -> u64 {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
}

/// Join a relative path onto a base URL, tolerating a base with or without
/// a trailing slash.
pub(crate) fn join(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_url_uses_default_when_var_absent() {
        let url = env_url("CERTICHAIN_NONEXISTENT_VAR", "https://example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn join_handles_trailing_slash() {
        let with = Url::parse("https://gw.example/").unwrap();
        let without = Url::parse("https://gw.example/base").unwrap();
        assert_eq!(join(&with, "/ipfs/abc"), "https://gw.example/ipfs/abc");
        assert_eq!(join(&without, "ipfs/abc"), "https://gw.example/base/ipfs/abc");
    }

    #[test]
    fn content_config_debug_redacts_jwt() {
        let cfg = ContentStoreConfig {
            pin_url: Url::parse("https://api.pinata.cloud").unwrap(),
            gateway_url: Url::parse("https://dweb.link").unwrap(),
            api_jwt: Some(Zeroizing::new("super-secret-jwt".into())),
            timeout_secs: 5,
        };
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("super-secret-jwt"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn mailer_config_debug_redacts_token() {
        let cfg = MailerConfig {
            relay_url: None,
            relay_token: Some(Zeroizing::new("relay-secret".into())),
            from: "a@b.c".into(),
            timeout_secs: 5,
        };
        assert!(!format!("{cfg:?}").contains("relay-secret"));
    }
}
