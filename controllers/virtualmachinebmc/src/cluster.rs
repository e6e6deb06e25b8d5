//! Cluster access used by the reconciler.
//!
//! `ClusterClient` abstracts the handful of Kubernetes calls a reconcile pass
//! makes so the reconciler can be unit tested against an in-memory cluster.
//! `KubeCluster` is the production implementation on top of `kube::Api`.
//!
//! "Not found" is not an error here: getters return `Ok(None)`, and creating
//! an object that already exists is reported as `CreateOutcome::AlreadyExists`.

use crate::error::ControllerError;
use crds::{VirtualMachineBMC, VirtualMachineBMCStatus};
use k8s_openapi::api::core::v1::{Pod, Secret, Service};
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::debug;

/// Result of an idempotent create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The object was created by this call
    Created,
    /// An object with the same name was already present
    AlreadyExists,
}

/// Kubernetes operations needed to reconcile a VirtualMachineBMC.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetches a VirtualMachineBMC, `None` if it does not exist
    async fn get_bmc(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachineBMC>, ControllerError>;

    /// Writes the status subresource, conditional on the object's resourceVersion
    async fn update_bmc_status(
        &self,
        bmc: &VirtualMachineBMC,
        status: &VirtualMachineBMCStatus,
    ) -> Result<(), ControllerError>;

    /// Fetches a secret, `None` if it does not exist
    async fn get_secret(&self, namespace: &str, name: &str)
    -> Result<Option<Secret>, ControllerError>;

    /// Fetches a pod, `None` if it does not exist
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ControllerError>;

    /// Creates a pod in its own namespace
    async fn create_pod(&self, pod: &Pod) -> Result<CreateOutcome, ControllerError>;

    /// Deletes a pod immediately (grace period 0). Deleting a missing pod succeeds.
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ControllerError>;

    /// Fetches a service, `None` if it does not exist
    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, ControllerError>;

    /// Creates a service in its own namespace
    async fn create_service(&self, service: &Service) -> Result<CreateOutcome, ControllerError>;
}

/// `ClusterClient` backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster").finish_non_exhaustive()
    }
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespace_of<K: ResourceExt>(obj: &K) -> Result<String, ControllerError> {
        obj.namespace().ok_or_else(|| {
            ControllerError::InvalidObject(format!("{} is missing a namespace", obj.name_any()))
        })
    }
}

fn classify_create<K>(result: Result<K, kube::Error>) -> Result<CreateOutcome, ControllerError> {
    match result {
        Ok(_) => Ok(CreateOutcome::Created),
        Err(kube::Error::Api(api_err))
            if api_err.code == 409 && api_err.reason == "AlreadyExists" =>
        {
            Ok(CreateOutcome::AlreadyExists)
        }
        Err(e) => Err(ControllerError::Kube(e)),
    }
}

#[async_trait::async_trait]
impl ClusterClient for KubeCluster {
    async fn get_bmc(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachineBMC>, ControllerError> {
        let api: Api<VirtualMachineBMC> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn update_bmc_status(
        &self,
        bmc: &VirtualMachineBMC,
        status: &VirtualMachineBMCStatus,
    ) -> Result<(), ControllerError> {
        let namespace = Self::namespace_of(bmc)?;
        let api: Api<VirtualMachineBMC> = Api::namespaced(self.client.clone(), &namespace);

        // Carrying resourceVersion makes the API server reject the write if the
        // object changed since it was read.
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": bmc.resource_version() },
            "status": serde_json::to_value(status)?,
        });
        api.patch_status(&bmc.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>, ControllerError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ControllerError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_pod(&self, pod: &Pod) -> Result<CreateOutcome, ControllerError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &Self::namespace_of(pod)?);
        classify_create(api.create(&PostParams::default(), pod).await)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = DeleteParams {
            grace_period_seconds: Some(0),
            ..DeleteParams::default()
        };
        match api.delete(name, &params).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!("Pod {}/{} already gone", namespace, name);
                Ok(())
            }
            Err(e) => Err(ControllerError::Kube(e)),
        }
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, ControllerError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_service(&self, service: &Service) -> Result<CreateOutcome, ControllerError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), &Self::namespace_of(service)?);
        classify_create(api.create(&PostParams::default(), service).await)
    }
}
