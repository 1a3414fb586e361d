//! InterMine operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions served by the instance controller.

pub mod intermine_instance;

pub use intermine_instance::*;
