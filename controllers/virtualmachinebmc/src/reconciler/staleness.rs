//! Decides whether a running agent pod must be replaced.
//!
//! Two independent triggers, checked in order:
//! 1. the `--secret-ref` the pod was launched with differs from `spec.authSecret`;
//! 2. with the reference unchanged and the secret present, the secret's
//!    resourceVersion differs from the pod's `lastKnownSecretVersion`
//!    annotation (a missing annotation counts as different).

use crate::constants::{
    LAST_KNOWN_SECRET_VERSION_ANNOTATION, SECRET_REF_FLAG, VIRTBMC_CONTAINER_NAME,
};
use crds::VirtualMachineBMC;
use k8s_openapi::api::core::v1::Pod;
use std::fmt;
use tracing::info;

/// Why a pod has to be recreated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// The pod's `--secret-ref` no longer names the resource's auth secret
    SecretReferenceChanged,
    /// The secret's resourceVersion moved past the one stamped on the pod
    SecretDataChanged,
}

impl fmt::Display for RefreshReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecretReferenceChanged => f.write_str("Secret reference changed"),
            Self::SecretDataChanged => f.write_str("Secret data changed"),
        }
    }
}

/// Secret reference passed to the agent container, if any
pub fn pod_secret_ref(pod: &Pod) -> Option<&str> {
    let container = pod
        .spec
        .as_ref()?
        .containers
        .iter()
        .find(|c| c.name == VIRTBMC_CONTAINER_NAME)?;
    let args = container.args.as_ref()?;
    let flag = args.iter().position(|arg| arg == SECRET_REF_FLAG)?;
    args.get(flag + 1).map(String::as_str)
}

/// Returns the reason the pod is stale, or `None` if it is up to date.
///
/// `secret_version` is the resourceVersion of the secret as fetched in this
/// pass; `None` when the secret does not exist.
pub fn refresh_reason(
    pod: &Pod,
    bmc: &VirtualMachineBMC,
    secret_version: Option<&str>,
) -> Option<RefreshReason> {
    let desired_ref = bmc.spec.auth_secret.to_string();
    let current_ref = pod_secret_ref(pod).unwrap_or_default();

    if current_ref != desired_ref {
        info!(old = %current_ref, new = %desired_ref, "Secret reference has changed");
        return Some(RefreshReason::SecretReferenceChanged);
    }

    let secret_version = secret_version.filter(|v| !v.is_empty())?;
    let last_known = pod
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(LAST_KNOWN_SECRET_VERSION_ANNOTATION));

    match last_known {
        Some(last_known) if last_known == secret_version => None,
        _ => {
            info!(
                old_version = last_known.map_or("<none>", String::as_str),
                new_version = %secret_version,
                "Secret data has changed"
            );
            Some(RefreshReason::SecretDataChanged)
        }
    }
}
