//! Status computation for VirtualMachineBMC.

use chrono::{DateTime, Utc};
use crds::{CONDITION_SECRET_READY, Condition, ConditionStatus, VirtualMachineBMCStatus};
use k8s_openapi::api::core::v1::Service;

/// Cluster IP assigned to the BMC service, if any
pub fn service_cluster_ip(service: &Service) -> Option<&str> {
    service
        .spec
        .as_ref()?
        .cluster_ip
        .as_deref()
        .filter(|ip| !ip.is_empty() && *ip != "None")
}

/// Computes the status to write for this pass.
///
/// The `SecretReady` timestamp is kept from `previous` when the condition's
/// value did not change, so passes without a state change write an identical
/// status.
pub fn compute_status(
    previous: Option<&VirtualMachineBMCStatus>,
    secret_exists: bool,
    service_ip: Option<&str>,
    now: DateTime<Utc>,
) -> VirtualMachineBMCStatus {
    let status = ConditionStatus::from(secret_exists);
    let last_update_time = previous
        .and_then(|p| p.condition(CONDITION_SECRET_READY))
        .filter(|c| c.status == status)
        .map_or(now, |c| c.last_update_time);

    let service_ip = service_ip.unwrap_or_default().to_string();

    VirtualMachineBMCStatus {
        ready: secret_exists && !service_ip.is_empty(),
        service_ip,
        conditions: vec![Condition::secret_ready(secret_exists, last_update_time)],
    }
}
