//! Deadlines for collaborator calls.
//!
//! Every ledger, content-store, verifier and mailer call made by a handler
//! goes through [`bounded`], which imposes the configured upstream deadline
//! and folds the client's own timeout into the same error.

use std::future::Future;
use std::time::Duration;

use certichain_client::ClientError;

/// A collaborator call that did not produce a result.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("{collaborator} did not respond within {deadline:?}")]
    Timeout {
        collaborator: &'static str,
        deadline: Duration,
    },
    #[error("{collaborator} call failed: {source}")]
    Failed {
        collaborator: &'static str,
        source: ClientError,
    },
}

impl UpstreamError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The collaborator reported the requested resource as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Failed { source, .. } if source.is_not_found())
    }
}

/// Run `call` under `deadline`.
pub async fn bounded<T, F>(
    collaborator: &'static str,
    deadline: Duration,
    call: F,
) -> Result<T, UpstreamError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) if source.is_timeout() => Err(UpstreamError::Timeout {
            collaborator,
            deadline,
        }),
        Ok(Err(source)) => Err(UpstreamError::Failed {
            collaborator,
            source,
        }),
        Err(_) => Err(UpstreamError::Timeout {
            collaborator,
            deadline,
        }),
    }
}
