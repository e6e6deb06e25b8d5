//! Agent errors

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// `--secret-ref` is not of the form `namespace/name`
    #[error("invalid secret reference {0:?}: expected namespace/name")]
    InvalidSecretRef(String),

    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// The secret watch did not deliver its initial listing in time
    #[error("timed out after {0:?} waiting for secret cache to sync")]
    CacheSyncTimeout(Duration),

    #[error("Secret watch failed: {0}")]
    Watch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
