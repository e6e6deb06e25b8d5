//! VirtualMachineBMC CRD
//!
//! Declares an emulated BMC for a KubeVirt virtual machine. The controller
//! turns each object into an agent pod plus a service, and reports whether the
//! referenced credential secret exists.

use crate::references::NamespacedName;
use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type reporting whether the authentication secret exists
pub const CONDITION_SECRET_READY: &str = "SecretReady";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "virtualmachine.kubevirt.io",
    version = "v1alpha1",
    kind = "VirtualMachineBMC",
    namespaced,
    status = "VirtualMachineBMCStatus",
    shortname = "vmbmc",
    printcolumn = r#"{"name":"VM","type":"string","jsonPath":".spec.virtualMachine.name"}"#,
    printcolumn = r#"{"name":"Service IP","type":"string","jsonPath":".status.serviceIP"}"#,
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineBMCSpec {
    /// Secret holding the IPMI/Redfish `username` and `password`
    pub auth_secret: NamespacedName,

    /// The virtual machine this emulated BMC manages
    pub virtual_machine: NamespacedName,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineBMCStatus {
    /// Cluster IP of the BMC service
    #[serde(rename = "serviceIP", default)]
    pub service_ip: String,

    /// Whether the BMC is ready to serve requests
    #[serde(default)]
    pub ready: bool,

    /// Latest observations of the object's state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// A single timestamped observation
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition
    pub status: ConditionStatus,

    /// Last time the condition was updated
    pub last_update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
/// Condition status, serialized as "True" / "False"
pub enum ConditionStatus {
    True,
    False,
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

impl Condition {
    /// Builds the `SecretReady` condition
    pub fn secret_ready(ready: bool, now: DateTime<Utc>) -> Self {
        Self {
            type_: CONDITION_SECRET_READY.to_string(),
            status: ready.into(),
            last_update_time: now,
        }
    }
}

impl VirtualMachineBMCStatus {
    /// Returns the condition of the given type, if recorded
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}
