//! Object references used by the VirtualMachineBMC CRD
//!
//! Both the credential secret and the target virtual machine are addressed by
//! a namespace and a name. The same pair is handed to the agent as a single
//! `namespace/name` string (see `--secret-ref`).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace and name of a referenced Kubernetes object
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct NamespacedName {
    /// Namespace of the referenced object
    pub namespace: String,

    /// Name of the referenced object
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Returns true if this reference points at the object with the given coordinates
    pub fn matches(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.name == name
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
