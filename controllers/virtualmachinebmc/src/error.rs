//! Controller-specific error types.
//!
//! This module defines error types specific to the VirtualMachineBMC Controller
//! that are not covered by upstream library errors.

use thiserror::Error;
use kube::Error as KubeError;

/// Errors that can occur in the VirtualMachineBMC Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Status could not be serialized into a patch
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object is missing metadata the controller relies on
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}
