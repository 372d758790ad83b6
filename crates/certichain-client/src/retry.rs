//! Retry policy for idempotent collaborator calls.
//!
//! Ledger reads, gateway fetches and signature checks have no side effects,
//! so a transient failure is retried with exponential backoff. Pinning and
//! mail delivery are not retried: a repeated upload or email is visible
//! outside this service.
//!
//! A timeout is final. The caller's deadline bounds the whole call, retries
//! included.

use std::future::Future;
use std::time::Duration;

use crate::error::ClientError;

/// How often and how patiently an idempotent call is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first.
    pub max_retries: u32,
    /// Delay before the first retry. Doubles for each one after.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Single attempt.
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_before(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }

    /// Run `call`, repeating it while it fails with a transient error and
    /// retries remain.
    pub(crate) async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut retries = 0;
        loop {
            match call().await {
                Err(e) if e.is_transient() && retries < self.max_retries => {
                    retries += 1;
                    let delay = self.delay_before(retries);
                    tracing::warn!(
                        operation,
                        retry = retries,
                        max_retries = self.max_retries,
                        ?delay,
                        error = %e,
                        "transient collaborator failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                outcome => return outcome,
            }
        }
    }
}
