//! KubeVirtBMC CRD Definitions
//!
//! Kubernetes Custom Resource Definitions shared by the VirtualMachineBMC
//! controller and the crdgen tool.

pub mod references;
pub mod virtual_machine_bmc;

pub use references::*;
pub use virtual_machine_bmc::*;
