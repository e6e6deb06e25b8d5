//! Names, ports and labels shared by the agent workload objects.

/// Name of the agent container inside the BMC pod
pub const VIRTBMC_CONTAINER_NAME: &str = "virtbmc";

/// Default agent image (tag comes from configuration)
pub const DEFAULT_AGENT_IMAGE_NAME: &str = "anish60/virtbmc";

/// Default agent image tag
pub const DEFAULT_AGENT_IMAGE_TAG: &str = "latest";

/// Service account the agent pod runs as
pub const VIRTBMC_SERVICE_ACCOUNT: &str = "kubevirtbmc-virtbmc";

/// Suffix appended to the VirtualMachineBMC name for the pod and service
pub const VIRTBMC_NAME_SUFFIX: &str = "-virtbmc";

pub const IPMI_PORT: i32 = 10623;
pub const REDFISH_PORT: i32 = 10080;
pub const IPMI_SVC_PORT: i32 = 623;
pub const REDFISH_SVC_PORT: i32 = 80;
pub const IPMI_PORT_NAME: &str = "ipmi";
pub const REDFISH_PORT_NAME: &str = "redfish";

/// Address the agent binds inside the pod
pub const AGENT_LISTEN_ADDRESS: &str = "0.0.0.0";

/// Label carrying the owning VirtualMachineBMC name
pub const VIRTUAL_MACHINE_BMC_NAME_LABEL: &str = "kubevirt.io/virtualmachinebmc-name";

/// Label carrying the managed VM name
pub const VM_NAME_LABEL: &str = "kubevirt.io/vm-name";

/// Pod annotation recording the secret resourceVersion the pod was started with
pub const LAST_KNOWN_SECRET_VERSION_ANNOTATION: &str = "lastKnownSecretVersion";

/// Agent flag carrying the `namespace/name` secret reference
pub const SECRET_REF_FLAG: &str = "--secret-ref";
