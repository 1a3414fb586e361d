//! IntermineInstance Custom Resource Definition
//!
//! The user-declared desired state the instance controller converges
//! dependent Deployments, Services and Ingresses towards.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group of the IntermineInstance CRD.
pub const API_GROUP: &str = "intermine.intermine.org";

/// IntermineInstanceSpec defines the desired state of an InterMine instance
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "intermine.intermine.org",
    version = "v1alpha1",
    kind = "IntermineInstance",
    namespaced,
    status = "IntermineInstanceStatus",
    shortname = "imi"
)]
#[serde(rename_all = "camelCase")]
pub struct IntermineInstanceSpec {
    /// Placeholder configuration field, omitted when empty
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub foo: String,
}

/// IntermineInstanceStatus defines the observed state of an InterMine instance
///
/// Reserved for convergence reporting; the controller does not write it yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[allow(
    clippy::empty_structs_with_brackets,
    reason = "status must serialize as `{}`, not `null`"
)]
pub struct IntermineInstanceStatus {}
