//! Prints the IntermineInstance CRD manifest as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/intermineinstances.yaml`

use crds::IntermineInstance;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&IntermineInstance::crd())?);
    Ok(())
}
