//! virtbmc agent
//!
//! Emulated BMC for a single KubeVirt virtual machine:
//! - credential synchronization from a Kubernetes secret
//! - session tokens and Basic authentication for protocol endpoints
//! - Redfish service root and session endpoints

pub mod agent;
pub mod credentials;
pub mod error;
pub mod redfish;
pub mod secret;
pub mod session;

pub use agent::*;
pub use credentials::*;
pub use error::*;
