//! Reconciliation logic for VirtualMachineBMC.
//!
//! One pass, for one `namespace/name` key:
//! 1. fetch the VirtualMachineBMC (gone = nothing to do);
//! 2. fetch the referenced secret (absence is a state, not an error);
//! 3. write the status (every pass);
//! 4. fetch the agent pod: delete it if stale and requeue, or create it if missing;
//! 5. create the service if missing.
//!
//! The reconciler holds no lock around cluster state. Conflicting writes fail
//! on the API server and are retried through requeue.

pub mod staleness;
pub mod status;

use crate::backoff::FibonacciBackoff;
use crate::cluster::{ClusterClient, CreateOutcome};
use crate::error::ControllerError;
use crate::workload::{build_pod, build_service, child_name};
use chrono::Utc;
use kube::ResourceExt;
use staleness::refresh_reason;
use status::{compute_status, service_cluster_ip};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Delay before the pass that recreates a pod deleted as stale
pub const REFRESH_REQUEUE_DELAY: Duration = Duration::from_secs(1);

const ERROR_BACKOFF_MIN_SECS: u64 = 5;
const ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// What the caller should do after a successful pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Desired state reached; wait for the next change
    Done,
    /// A stale pod was deleted; run again to create its replacement
    Requeue(Duration),
}

/// Reconciles VirtualMachineBMC resources.
pub struct Reconciler {
    cluster: Arc<dyn ClusterClient>,
    agent_image: String,
    /// Error backoff per resource (namespace/name -> backoff)
    backoff_states: Mutex<HashMap<String, FibonacciBackoff>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("agent_image", &self.agent_image)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(cluster: Arc<dyn ClusterClient>, agent_image: impl Into<String>) -> Self {
        Self {
            cluster,
            agent_image: agent_image.into(),
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Runs one reconciliation pass for the VirtualMachineBMC `namespace/name`.
    pub async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let Some(bmc) = self.cluster.get_bmc(namespace, name).await? else {
            debug!("VirtualMachineBMC {}/{} not found, assuming deleted", namespace, name);
            self.reset_error_backoff(&format!("{namespace}/{name}"));
            return Ok(ReconcileOutcome::Done);
        };

        let secret_ref = &bmc.spec.auth_secret;
        let secret = self
            .cluster
            .get_secret(&secret_ref.namespace, &secret_ref.name)
            .await
            .inspect_err(|e| error!(secret = %secret_ref, "Error fetching secret: {}", e))?;
        let secret_version = match &secret {
            Some(secret) => secret.resource_version(),
            None => {
                info!(secret = %secret_ref, "Referenced secret not found");
                None
            }
        };

        let child = child_name(name);
        let service = self.cluster.get_service(namespace, &child).await?;

        let new_status = compute_status(
            bmc.status.as_ref(),
            secret.is_some(),
            service.as_ref().and_then(service_cluster_ip),
            Utc::now(),
        );
        self.cluster
            .update_bmc_status(&bmc, &new_status)
            .await
            .inspect_err(|e| {
                error!("Error updating VirtualMachineBMC {}/{} status: {}", namespace, name, e)
            })?;
        debug!("Updated VirtualMachineBMC {}/{} status", namespace, name);

        match self.cluster.get_pod(namespace, &child).await {
            Ok(Some(pod)) => {
                if let Some(reason) = refresh_reason(&pod, &bmc, secret_version.as_deref()) {
                    info!(pod = %child, %reason, "Pod refresh required");
                    self.cluster
                        .delete_pod(namespace, &child)
                        .await
                        .inspect_err(|e| {
                            error!("Unable to delete pod {}/{}: {}", namespace, child, e)
                        })?;
                    // The replacement is created by the next pass
                    return Ok(ReconcileOutcome::Requeue(REFRESH_REQUEUE_DELAY));
                }
                debug!("Pod {}/{} exists and is up-to-date", namespace, child);
            }
            Ok(None) => {
                let version = secret_version.as_deref().unwrap_or_default();
                let pod = build_pod(&bmc, &self.agent_image, version)?;
                match self.cluster.create_pod(&pod).await {
                    Ok(CreateOutcome::Created) => info!("Created pod {}/{}", namespace, child),
                    Ok(CreateOutcome::AlreadyExists) => {
                        debug!("Pod {}/{} already exists", namespace, child)
                    }
                    Err(e) => {
                        error!("Unable to create pod {}/{}: {}", namespace, child, e);
                        return Err(e);
                    }
                }
            }
            Err(e) => {
                error!("Error checking for existing pod {}/{}: {}", namespace, child, e);
                return Err(e);
            }
        }

        if service.is_none() {
            let svc = build_service(&bmc)?;
            match self.cluster.create_service(&svc).await {
                Ok(CreateOutcome::Created) => info!("Created service {}/{}", namespace, child),
                Ok(CreateOutcome::AlreadyExists) => {
                    debug!("Service {}/{} already exists", namespace, child)
                }
                Err(e) => {
                    error!("Unable to create service {}/{}: {}", namespace, child, e);
                    return Err(e);
                }
            }
        }

        Ok(ReconcileOutcome::Done)
    }

    /// Next error backoff for a resource, advancing its sequence
    pub fn next_error_backoff(&self, resource_key: &str) -> Duration {
        match self.backoff_states.lock() {
            Ok(mut states) => states
                .entry(resource_key.to_string())
                .or_insert_with(|| {
                    FibonacciBackoff::new(ERROR_BACKOFF_MIN_SECS, ERROR_BACKOFF_MAX_SECS)
                })
                .next_backoff(),
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                Duration::from_secs(ERROR_BACKOFF_MIN_SECS)
            }
        }
    }

    /// Drop the error backoff for a resource (successful pass or resource gone)
    pub fn reset_error_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }

    #[cfg(test)]
    fn tracked_backoffs(&self) -> usize {
        self.backoff_states.lock().map_or(0, |states| states.len())
    }
}
