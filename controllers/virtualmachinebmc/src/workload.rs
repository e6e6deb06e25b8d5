//! Construction of the agent pod and service for a VirtualMachineBMC.
//!
//! Both objects share a deterministic name (`<bmc-name>-virtbmc`), live in the
//! VirtualMachineBMC's namespace and carry a controller owner reference so the
//! cluster garbage collector removes them together with their owner.

use crate::constants::*;
use crate::error::ControllerError;
use crds::VirtualMachineBMC;
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, Pod, PodSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Name shared by the pod and the service of a VirtualMachineBMC
pub fn child_name(bmc_name: &str) -> String {
    format!("{bmc_name}{VIRTBMC_NAME_SUFFIX}")
}

fn owner_reference(bmc: &VirtualMachineBMC) -> Result<OwnerReference, ControllerError> {
    bmc.controller_owner_ref(&()).ok_or_else(|| {
        ControllerError::InvalidObject(format!(
            "VirtualMachineBMC {} has no uid, cannot own children",
            bmc.name_any()
        ))
    })
}

fn namespace_of(bmc: &VirtualMachineBMC) -> Result<String, ControllerError> {
    bmc.namespace().ok_or_else(|| {
        ControllerError::InvalidObject(format!(
            "VirtualMachineBMC {} is missing a namespace",
            bmc.name_any()
        ))
    })
}

fn child_labels(bmc: &VirtualMachineBMC) -> BTreeMap<String, String> {
    BTreeMap::from([
        (VIRTUAL_MACHINE_BMC_NAME_LABEL.to_string(), bmc.name_any()),
        (
            VM_NAME_LABEL.to_string(),
            bmc.spec.virtual_machine.name.clone(),
        ),
    ])
}

/// Launch arguments understood by the virtbmc agent
pub fn agent_args(bmc: &VirtualMachineBMC) -> Vec<String> {
    vec![
        "--address".to_string(),
        AGENT_LISTEN_ADDRESS.to_string(),
        "--ipmi-port".to_string(),
        IPMI_PORT.to_string(),
        "--redfish-port".to_string(),
        REDFISH_PORT.to_string(),
        SECRET_REF_FLAG.to_string(),
        bmc.spec.auth_secret.to_string(),
        bmc.spec.virtual_machine.namespace.clone(),
        bmc.spec.virtual_machine.name.clone(),
    ]
}

/// Builds the agent pod, stamped with the secret version it is started against.
pub fn build_pod(
    bmc: &VirtualMachineBMC,
    agent_image: &str,
    secret_version: &str,
) -> Result<Pod, ControllerError> {
    let name = child_name(&bmc.name_any());

    Ok(Pod {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace_of(bmc)?),
            labels: Some(child_labels(bmc)),
            annotations: Some(BTreeMap::from([(
                LAST_KNOWN_SECRET_VERSION_ANNOTATION.to_string(),
                secret_version.to_string(),
            )])),
            owner_references: Some(vec![owner_reference(bmc)?]),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: VIRTBMC_CONTAINER_NAME.to_string(),
                image: Some(agent_image.to_string()),
                args: Some(agent_args(bmc)),
                ports: Some(vec![
                    ContainerPort {
                        name: Some(IPMI_PORT_NAME.to_string()),
                        container_port: IPMI_PORT,
                        protocol: Some("UDP".to_string()),
                        ..Default::default()
                    },
                    ContainerPort {
                        name: Some(REDFISH_PORT_NAME.to_string()),
                        container_port: REDFISH_PORT,
                        protocol: Some("TCP".to_string()),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }],
            service_account_name: Some(VIRTBMC_SERVICE_ACCOUNT.to_string()),
            ..Default::default()
        }),
        status: None,
    })
}

/// Builds the service exposing the agent's IPMI (UDP 623) and Redfish (TCP 80) ports.
pub fn build_service(bmc: &VirtualMachineBMC) -> Result<Service, ControllerError> {
    let name = child_name(&bmc.name_any());

    Ok(Service {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace_of(bmc)?),
            labels: Some(child_labels(bmc)),
            owner_references: Some(vec![owner_reference(bmc)?]),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(BTreeMap::from([(
                VIRTUAL_MACHINE_BMC_NAME_LABEL.to_string(),
                bmc.name_any(),
            )])),
            ports: Some(vec![
                ServicePort {
                    name: Some(IPMI_PORT_NAME.to_string()),
                    protocol: Some("UDP".to_string()),
                    port: IPMI_SVC_PORT,
                    target_port: Some(IntOrString::String(IPMI_PORT_NAME.to_string())),
                    ..Default::default()
                },
                ServicePort {
                    name: Some(REDFISH_PORT_NAME.to_string()),
                    protocol: Some("TCP".to_string()),
                    port: REDFISH_SVC_PORT,
                    target_port: Some(IntOrString::String(REDFISH_PORT_NAME.to_string())),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }),
        status: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_bmc;

    #[test]
    fn test_child_name_is_deterministic() {
        assert_eq!(child_name("vm1-bmc"), "vm1-bmc-virtbmc");
    }

    #[test]
    fn test_agent_args_layout() {
        let bmc = create_test_bmc("bmc", "default", ("default", "bmc-auth"), ("vms", "vm1"));
        assert_eq!(
            agent_args(&bmc),
            vec![
                "--address",
                "0.0.0.0",
                "--ipmi-port",
                "10623",
                "--redfish-port",
                "10080",
                "--secret-ref",
                "default/bmc-auth",
                "vms",
                "vm1",
            ]
        );
    }

    #[test]
    fn test_build_pod_stamps_secret_version_and_owner() {
        let bmc = create_test_bmc("bmc", "default", ("default", "bmc-auth"), ("vms", "vm1"));
        let pod = build_pod(&bmc, "anish60/virtbmc:v1", "42").unwrap();

        assert_eq!(pod.metadata.name.as_deref(), Some("bmc-virtbmc"));
        assert_eq!(pod.metadata.namespace.as_deref(), Some("default"));
        let annotations = pod.metadata.annotations.unwrap();
        assert_eq!(annotations[LAST_KNOWN_SECRET_VERSION_ANNOTATION], "42");

        let owners = pod.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "VirtualMachineBMC");
        assert_eq!(owners[0].controller, Some(true));

        let labels = pod.metadata.labels.unwrap();
        assert_eq!(labels[VIRTUAL_MACHINE_BMC_NAME_LABEL], "bmc");
        assert_eq!(labels[VM_NAME_LABEL], "vm1");

        let container = &pod.spec.unwrap().containers[0];
        assert_eq!(container.name, VIRTBMC_CONTAINER_NAME);
        assert_eq!(container.image.as_deref(), Some("anish60/virtbmc:v1"));
    }

    #[test]
    fn test_build_service_ports() {
        let bmc = create_test_bmc("bmc", "default", ("default", "bmc-auth"), ("vms", "vm1"));
        let svc = build_service(&bmc).unwrap();
        let spec = svc.spec.unwrap();
        let ports = spec.ports.unwrap();

        assert_eq!(ports[0].port, IPMI_SVC_PORT);
        assert_eq!(ports[0].protocol.as_deref(), Some("UDP"));
        assert_eq!(ports[0].target_port, Some(IntOrString::String("ipmi".to_string())));
        assert_eq!(ports[1].port, REDFISH_SVC_PORT);
        assert_eq!(ports[1].protocol.as_deref(), Some("TCP"));
        assert_eq!(spec.selector.unwrap()[VIRTUAL_MACHINE_BMC_NAME_LABEL], "bmc");
    }

    #[test]
    fn test_build_pod_requires_uid() {
        let mut bmc = create_test_bmc("bmc", "default", ("default", "bmc-auth"), ("vms", "vm1"));
        bmc.metadata.uid = None;
        assert!(matches!(
            build_pod(&bmc, "img", ""),
            Err(ControllerError::InvalidObject(_))
        ));
    }
}
