//! Kubernetes resource watchers.
//!
//! Drives `Reconciler` from a `kube_runtime::Controller` over VirtualMachineBMC:
//! - agent pods and services are owned children (events map back through
//!   their controller owner reference);
//! - secrets are watched cluster-wide and mapped to every VirtualMachineBMC
//!   whose `spec.authSecret` points at them.

use crate::constants::VIRTUAL_MACHINE_BMC_NAME_LABEL;
use crate::error::ControllerError;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crds::VirtualMachineBMC;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Pod, Secret, Service};
use kube::{Api, Client, ResourceExt};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{Controller, controller::{Action, Config as ControllerConfig}, watcher};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// VirtualMachineBMCs whose authentication secret is `secret_namespace/secret_name`.
///
/// Linear scan over the cached objects; the VirtualMachineBMC count per
/// cluster is small.
pub fn bmcs_referencing_secret<'a>(
    bmcs: impl IntoIterator<Item = &'a VirtualMachineBMC>,
    secret_namespace: &str,
    secret_name: &str,
) -> Vec<ObjectRef<VirtualMachineBMC>> {
    bmcs.into_iter()
        .filter(|bmc| bmc.spec.auth_secret.matches(secret_namespace, secret_name))
        .map(ObjectRef::from_obj)
        .collect()
}

fn resource_key(bmc: &VirtualMachineBMC) -> String {
    format!("{}/{}", bmc.namespace().unwrap_or_default(), bmc.name_any())
}

async fn reconcile(
    bmc: Arc<VirtualMachineBMC>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ControllerError> {
    let namespace = bmc.namespace().ok_or_else(|| {
        ControllerError::InvalidObject(format!(
            "VirtualMachineBMC {} has no namespace",
            bmc.name_any()
        ))
    })?;
    let name = bmc.name_any();
    debug!("Reconciling VirtualMachineBMC {}/{}", namespace, name);

    let outcome = ctx.reconcile(&namespace, &name).await?;
    ctx.reset_error_backoff(&resource_key(&bmc));

    Ok(match outcome {
        ReconcileOutcome::Done => Action::await_change(),
        ReconcileOutcome::Requeue(delay) => Action::requeue(delay),
    })
}

fn error_policy(
    bmc: Arc<VirtualMachineBMC>,
    error: &ControllerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let key = resource_key(&bmc);
    let delay = ctx.next_error_backoff(&key);
    warn!(
        "Reconciliation of VirtualMachineBMC {} failed: {} (retrying in {:?})",
        key, error, delay
    );
    Action::requeue(delay)
}

/// Runs the VirtualMachineBMC controller until a termination signal arrives.
pub async fn watch_virtual_machine_bmcs(
    client: Client,
    reconciler: Arc<Reconciler>,
    namespace: Option<String>,
    concurrency: u16,
) -> Result<(), ControllerError> {
    let (bmcs, pods, services) = match namespace.as_deref() {
        Some(ns) => (
            Api::<VirtualMachineBMC>::namespaced(client.clone(), ns),
            Api::<Pod>::namespaced(client.clone(), ns),
            Api::<Service>::namespaced(client.clone(), ns),
        ),
        None => (
            Api::<VirtualMachineBMC>::all(client.clone()),
            Api::<Pod>::all(client.clone()),
            Api::<Service>::all(client.clone()),
        ),
    };
    // Referenced secrets may live in any namespace
    let secrets = Api::<Secret>::all(client);

    info!(
        "Starting VirtualMachineBMC watcher (namespace: {}, concurrency: {})",
        namespace.as_deref().unwrap_or("all"),
        concurrency
    );

    let children = watcher::Config::default().labels(VIRTUAL_MACHINE_BMC_NAME_LABEL);
    let controller = Controller::new(bmcs, watcher::Config::default());
    let store = controller.store();

    controller
        .owns(pods, children.clone())
        .owns(services, children)
        .watches(secrets, watcher::Config::default(), move |secret: Secret| {
            let secret_namespace = secret.namespace().unwrap_or_default();
            let cached = store.state();
            bmcs_referencing_secret(
                cached.iter().map(|bmc| &**bmc),
                &secret_namespace,
                &secret.name_any(),
            )
        })
        .with_config(ControllerConfig::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled {}", obj),
                Err(e) => warn!("Controller error: {}", e),
            }
        })
        .await;

    info!("VirtualMachineBMC watcher stopped");
    Ok(())
}
