//! ResourceStore trait for mocking
//!
//! This trait abstracts the cluster resource store so the reconciler can be
//! unit tested. `KubeStore` implements it against the Kubernetes API and
//! `MockResourceStore` (feature `test-util`) keeps everything in memory.

use crate::error::StoreError;
use crate::models::{DependentResource, ObjectKey, ResourceKind};
use crds::IntermineInstance;

/// Trait for cluster resource store operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
/// A missing object is reported as `StoreError::NotFound`, never as `Ok`.
#[async_trait::async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch the instance identified by `key`.
    async fn get_instance(&self, key: &ObjectKey) -> Result<IntermineInstance, StoreError>;

    /// Fetch the dependent of `kind` identified by `key`.
    async fn get(&self, kind: ResourceKind, key: &ObjectKey) -> Result<DependentResource, StoreError>;

    /// Create `resource` exactly as given, owner references included.
    async fn create(&self, resource: &DependentResource) -> Result<(), StoreError>;
}
