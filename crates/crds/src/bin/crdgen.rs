//! # CRD Generator
//!
//! Prints the VirtualMachineBMC CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run -p crds --bin crdgen > config/crd/virtualmachinebmc.yaml
//! cargo run -p crds --bin crdgen | kubectl apply -f -
//! ```

use crds::VirtualMachineBMC;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    let yaml = serde_yaml::to_string(&VirtualMachineBMC::crd())?;
    print!("{yaml}");
    Ok(())
}
