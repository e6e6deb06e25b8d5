//! Controller configuration, read from environment variables.
//!
//! | Variable               | Default            |
//! |------------------------|--------------------|
//! | `AGENT_IMAGE_NAME`     | `anish60/virtbmc`  |
//! | `AGENT_IMAGE_TAG`      | `latest`           |
//! | `WATCH_NAMESPACE`      | all namespaces     |
//! | `RECONCILE_CONCURRENCY`| `4`                |

use crate::constants::{DEFAULT_AGENT_IMAGE_NAME, DEFAULT_AGENT_IMAGE_TAG};
use crate::error::ControllerError;

const DEFAULT_RECONCILE_CONCURRENCY: u16 = 4;

/// Runtime settings of the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub agent_image_name: String,
    pub agent_image_tag: String,
    /// Restrict VirtualMachineBMC/Pod/Service watches to one namespace
    pub watch_namespace: Option<String>,
    /// Maximum number of VirtualMachineBMCs reconciled in parallel
    pub reconcile_concurrency: u16,
}

impl ControllerConfig {
    /// Loads configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let reconcile_concurrency = match non_empty("RECONCILE_CONCURRENCY") {
            Some(raw) => raw.trim().parse::<u16>().ok().filter(|n| *n > 0).ok_or_else(|| {
                ControllerError::InvalidConfig(format!(
                    "RECONCILE_CONCURRENCY must be a positive integer, got {raw:?}"
                ))
            })?,
            None => DEFAULT_RECONCILE_CONCURRENCY,
        };

        Ok(Self {
            agent_image_name: non_empty("AGENT_IMAGE_NAME")
                .unwrap_or_else(|| DEFAULT_AGENT_IMAGE_NAME.to_string()),
            agent_image_tag: non_empty("AGENT_IMAGE_TAG")
                .unwrap_or_else(|| DEFAULT_AGENT_IMAGE_TAG.to_string()),
            watch_namespace: non_empty("WATCH_NAMESPACE"),
            reconcile_concurrency,
        })
    }

    /// Full image reference for the agent container
    pub fn agent_image(&self) -> String {
        format!("{}:{}", self.agent_image_name, self.agent_image_tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ControllerConfig, ControllerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ControllerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.agent_image(), "anish60/virtbmc:latest");
        assert_eq!(config.watch_namespace, None);
        assert_eq!(config.reconcile_concurrency, 4);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("AGENT_IMAGE_NAME", "registry.local/virtbmc"),
            ("AGENT_IMAGE_TAG", "v0.3.0"),
            ("WATCH_NAMESPACE", "bmc-system"),
            ("RECONCILE_CONCURRENCY", "8"),
        ])
        .unwrap();
        assert_eq!(config.agent_image(), "registry.local/virtbmc:v0.3.0");
        assert_eq!(config.watch_namespace.as_deref(), Some("bmc-system"));
        assert_eq!(config.reconcile_concurrency, 8);
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = load(&[("AGENT_IMAGE_TAG", ""), ("WATCH_NAMESPACE", "  ")]).unwrap();
        assert_eq!(config.agent_image_tag, "latest");
        assert_eq!(config.watch_namespace, None);
    }

    #[test]
    fn test_invalid_concurrency_is_rejected() {
        assert!(matches!(
            load(&[("RECONCILE_CONCURRENCY", "0")]),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            load(&[("RECONCILE_CONCURRENCY", "many")]),
            Err(ControllerError::InvalidConfig(_))
        ));
    }
}
