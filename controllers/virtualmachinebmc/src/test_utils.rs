//! Test utilities for unit testing the reconciler
//!
//! Fixtures for VirtualMachineBMC, Pod and Secret objects, plus `MockCluster`,
//! an in-memory `ClusterClient` that records every write it receives.

use crate::cluster::{ClusterClient, CreateOutcome};
use crate::constants::{LAST_KNOWN_SECRET_VERSION_ANNOTATION, VIRTBMC_CONTAINER_NAME};
use crate::error::ControllerError;
use crds::{NamespacedName, VirtualMachineBMC, VirtualMachineBMCSpec, VirtualMachineBMCStatus};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Cluster IP the mock assigns to every service it creates
pub const MOCK_SERVICE_IP: &str = "10.96.0.10";

/// Helper to create a test VirtualMachineBMC (with uid and resourceVersion set)
pub fn create_test_bmc(
    name: &str,
    namespace: &str,
    auth_secret: (&str, &str),
    virtual_machine: (&str, &str),
) -> VirtualMachineBMC {
    let mut bmc = VirtualMachineBMC::new(
        name,
        VirtualMachineBMCSpec {
            auth_secret: NamespacedName::new(auth_secret.0, auth_secret.1),
            virtual_machine: NamespacedName::new(virtual_machine.0, virtual_machine.1),
        },
    );
    bmc.metadata.namespace = Some(namespace.to_string());
    bmc.metadata.uid = Some(format!("uid-{name}"));
    bmc.metadata.resource_version = Some("1".to_string());
    bmc
}

/// Helper to create an agent pod with the given container args
pub fn create_test_pod(
    name: &str,
    namespace: &str,
    args: Vec<&str>,
    secret_version: Option<&str>,
) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            annotations: secret_version.map(|v| {
                BTreeMap::from([(LAST_KNOWN_SECRET_VERSION_ANNOTATION.to_string(), v.to_string())])
            }),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: VIRTBMC_CONTAINER_NAME.to_string(),
                args: Some(args.into_iter().map(String::from).collect()),
                ..Default::default()
            }],
            ..Default::default()
        }),
        status: None,
    }
}

/// Helper to create a credentials secret at a given resourceVersion
pub fn create_test_secret(namespace: &str, name: &str, resource_version: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            resource_version: Some(resource_version.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([
            ("username".to_string(), ByteString(b"admin".to_vec())),
            ("password".to_string(), ByteString(b"secret".to_vec())),
        ])),
        ..Default::default()
    }
}

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn key_of<K: ResourceExt>(obj: &K) -> Key {
    (obj.namespace().unwrap_or_default(), obj.name_any())
}

/// In-memory cluster.
///
/// Writes are appended to a log (`"status ns/name"`, `"create_pod ns/name"`,
/// `"delete_pod ns/name"`, `"create_service ns/name"`). Status writes are
/// rejected when the caller's resourceVersion is stale, like the API server does.
#[derive(Default)]
pub struct MockCluster {
    bmcs: Mutex<HashMap<Key, VirtualMachineBMC>>,
    secrets: Mutex<HashMap<Key, Secret>>,
    pods: Mutex<HashMap<Key, Pod>>,
    services: Mutex<HashMap<Key, Service>>,
    writes: Mutex<Vec<String>>,
    failing_op: Mutex<Option<&'static str>>,
    next_version: Mutex<u64>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self {
            next_version: Mutex::new(100),
            ..Default::default()
        }
    }

    pub fn insert_bmc(&self, bmc: VirtualMachineBMC) {
        self.bmcs.lock().unwrap().insert(key_of(&bmc), bmc);
    }

    pub fn insert_secret(&self, secret: Secret) {
        self.secrets.lock().unwrap().insert(key_of(&secret), secret);
    }

    pub fn remove_secret(&self, namespace: &str, name: &str) {
        self.secrets.lock().unwrap().remove(&key(namespace, name));
    }

    pub fn insert_pod(&self, pod: Pod) {
        self.pods.lock().unwrap().insert(key_of(&pod), pod);
    }

    pub fn bmc(&self, namespace: &str, name: &str) -> Option<VirtualMachineBMC> {
        self.bmcs.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// Replaces the spec of a stored VirtualMachineBMC, bumping its resourceVersion
    pub fn update_bmc_spec(&self, namespace: &str, name: &str, spec: VirtualMachineBMCSpec) {
        let version = self.bump_version();
        let mut bmcs = self.bmcs.lock().unwrap();
        let bmc = bmcs.get_mut(&key(namespace, name)).expect("bmc exists");
        bmc.spec = spec;
        bmc.metadata.resource_version = Some(version);
    }

    pub fn pod(&self, namespace: &str, name: &str) -> Option<Pod> {
        self.pods.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    pub fn pod_count(&self) -> usize {
        self.pods.lock().unwrap().len()
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.services.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    pub fn service_count(&self) -> usize {
        self.services.lock().unwrap().len()
    }

    /// All writes received so far
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }

    /// Makes the named operation (e.g. `"get_secret"`) fail until cleared
    pub fn fail_on(&self, op: Option<&'static str>) {
        *self.failing_op.lock().unwrap() = op;
    }

    fn check(&self, op: &'static str) -> Result<(), ControllerError> {
        if *self.failing_op.lock().unwrap() == Some(op) {
            return Err(ControllerError::InvalidObject(format!("injected {op} failure")));
        }
        Ok(())
    }

    fn record(&self, op: &str, key: &Key) {
        self.writes.lock().unwrap().push(format!("{op} {}/{}", key.0, key.1));
    }

    fn bump_version(&self) -> String {
        let mut next = self.next_version.lock().unwrap();
        *next += 1;
        next.to_string()
    }
}

#[async_trait::async_trait]
impl ClusterClient for MockCluster {
    async fn get_bmc(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachineBMC>, ControllerError> {
        self.check("get_bmc")?;
        Ok(self.bmc(namespace, name))
    }

    async fn update_bmc_status(
        &self,
        bmc: &VirtualMachineBMC,
        status: &VirtualMachineBMCStatus,
    ) -> Result<(), ControllerError> {
        self.check("update_bmc_status")?;
        let key = key_of(bmc);
        let version = self.bump_version();
        let mut bmcs = self.bmcs.lock().unwrap();
        let stored = bmcs
            .get_mut(&key)
            .ok_or_else(|| ControllerError::InvalidObject("not found".to_string()))?;
        if stored.metadata.resource_version != bmc.metadata.resource_version {
            return Err(ControllerError::InvalidObject("conflict".to_string()));
        }
        stored.status = Some(status.clone());
        stored.metadata.resource_version = Some(version);
        drop(bmcs);
        self.record("status", &key);
        Ok(())
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>, ControllerError> {
        self.check("get_secret")?;
        Ok(self.secrets.lock().unwrap().get(&key(namespace, name)).cloned())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ControllerError> {
        self.check("get_pod")?;
        Ok(self.pod(namespace, name))
    }

    async fn create_pod(&self, pod: &Pod) -> Result<CreateOutcome, ControllerError> {
        self.check("create_pod")?;
        let key = key_of(pod);
        let mut pods = self.pods.lock().unwrap();
        if pods.contains_key(&key) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        pods.insert(key.clone(), pod.clone());
        drop(pods);
        self.record("create_pod", &key);
        Ok(CreateOutcome::Created)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        self.check("delete_pod")?;
        let key = key(namespace, name);
        self.pods.lock().unwrap().remove(&key);
        self.record("delete_pod", &key);
        Ok(())
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, ControllerError> {
        self.check("get_service")?;
        Ok(self.service(namespace, name))
    }

    async fn create_service(&self, service: &Service) -> Result<CreateOutcome, ControllerError> {
        self.check("create_service")?;
        let key = key_of(service);
        let mut services = self.services.lock().unwrap();
        if services.contains_key(&key) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        let mut stored = service.clone();
        if let Some(spec) = stored.spec.as_mut() {
            spec.cluster_ip = Some(MOCK_SERVICE_IP.to_string());
        }
        services.insert(key.clone(), stored);
        drop(services);
        self.record("create_service", &key);
        Ok(CreateOutcome::Created)
    }
}
