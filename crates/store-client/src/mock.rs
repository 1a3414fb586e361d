//! Mock ResourceStore for unit testing
//!
//! This module provides an in-memory implementation of `ResourceStore` that
//! can be used in unit tests without a running cluster. Failures can be
//! injected per call site, every call is recorded, and the store's
//! owner-reference garbage collection is stubbed by
//! [`MockResourceStore::delete_instance`].

use crate::error::StoreError;
use crate::models::{DependentResource, ObjectKey, ResourceKind};
use crate::store_trait::ResourceStore;
use crds::IntermineInstance;
use kube::ResourceExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Failure the mock returns instead of serving a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// `StoreError::Unavailable`
    Unavailable,
    /// `StoreError::Invalid`
    Invalid,
    /// `StoreError::AlreadyExists`; on create the object is inserted first,
    /// as if a racing creator won.
    AlreadyExists,
    /// Never completes; exercises deadline handling.
    Hang,
}

/// A call observed by the mock, in order of arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    GetInstance(ObjectKey),
    Get(ResourceKind, ObjectKey),
    Create(ResourceKind, ObjectKey),
}

/// Mock ResourceStore for testing
///
/// Clones share state, so a test can hand one clone to the reconciler and
/// inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MockResourceStore {
    pub(crate) instances: Arc<Mutex<HashMap<ObjectKey, IntermineInstance>>>,
    pub(crate) resources: Arc<Mutex<HashMap<(ResourceKind, ObjectKey), DependentResource>>>,
    pub(crate) instance_failures: Arc<Mutex<HashMap<ObjectKey, InjectedFailure>>>,
    pub(crate) get_failures: Arc<Mutex<HashMap<ResourceKind, InjectedFailure>>>,
    pub(crate) create_failures: Arc<Mutex<HashMap<ResourceKind, InjectedFailure>>>,
    pub(crate) calls: Arc<Mutex<Vec<StoreCall>>>,
    pub(crate) mutations: Arc<Mutex<u64>>,
}

impl MockResourceStore {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance to the mock store (for test setup)
    pub fn add_instance(&self, instance: IntermineInstance) {
        let key = ObjectKey::new(instance.namespace().unwrap_or_default(), instance.name_any());
        self.instances.lock().unwrap().insert(key, instance);
    }

    /// Add a dependent to the mock store (for test setup)
    pub fn add_resource(&self, resource: DependentResource) {
        self.resources
            .lock()
            .unwrap()
            .insert((resource.kind(), resource.key()), resource);
    }

    /// Delete an instance and garbage-collect every dependent whose owner
    /// references point at its uid, the way the cluster's collector does.
    pub fn delete_instance(&self, key: &ObjectKey) -> Option<IntermineInstance> {
        let removed = self.instances.lock().unwrap().remove(key)?;
        if let Some(uid) = removed.metadata.uid.as_deref() {
            self.resources.lock().unwrap().retain(|_, resource| {
                !resource
                    .metadata()
                    .owner_references
                    .iter()
                    .flatten()
                    .any(|owner| owner.uid == uid)
            });
        }
        Some(removed)
    }

    /// Look up a stored dependent
    pub fn resource(&self, kind: ResourceKind, key: &ObjectKey) -> Option<DependentResource> {
        self.resources.lock().unwrap().get(&(kind, key.clone())).cloned()
    }

    /// Number of dependents currently stored
    pub fn resource_count(&self) -> usize {
        self.resources.lock().unwrap().len()
    }

    /// Make `get_instance` for `key` fail
    pub fn fail_get_instance(&self, key: ObjectKey, failure: InjectedFailure) {
        self.instance_failures.lock().unwrap().insert(key, failure);
    }

    /// Make `get` for `kind` fail
    pub fn fail_get(&self, kind: ResourceKind, failure: InjectedFailure) {
        self.get_failures.lock().unwrap().insert(kind, failure);
    }

    /// Make `create` for `kind` fail
    pub fn fail_create(&self, kind: ResourceKind, failure: InjectedFailure) {
        self.create_failures.lock().unwrap().insert(kind, failure);
    }

    /// Remove every injected failure
    pub fn clear_failures(&self) {
        self.instance_failures.lock().unwrap().clear();
        self.get_failures.lock().unwrap().clear();
        self.create_failures.lock().unwrap().clear();
    }

    /// Calls observed so far
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Forget the recorded calls
    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Number of successful creates performed through this store
    pub fn mutation_count(&self) -> u64 {
        *self.mutations.lock().unwrap()
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }

    async fn injected(failure: InjectedFailure, target: String) -> StoreError {
        match failure {
            InjectedFailure::Unavailable => StoreError::Unavailable(target),
            InjectedFailure::Invalid => StoreError::Invalid(target),
            InjectedFailure::AlreadyExists => StoreError::AlreadyExists(target),
            InjectedFailure::Hang => std::future::pending::<StoreError>().await,
        }
    }
}

#[async_trait::async_trait]
impl ResourceStore for MockResourceStore {
    async fn get_instance(&self, key: &ObjectKey) -> Result<IntermineInstance, StoreError> {
        self.record(StoreCall::GetInstance(key.clone()));
        let failure = self.instance_failures.lock().unwrap().get(key).copied();
        if let Some(failure) = failure {
            return Err(Self::injected(failure, format!("IntermineInstance {}", key)).await);
        }
        self.instances
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("IntermineInstance {}", key)))
    }

    async fn get(&self, kind: ResourceKind, key: &ObjectKey) -> Result<DependentResource, StoreError> {
        self.record(StoreCall::Get(kind, key.clone()));
        let failure = self.get_failures.lock().unwrap().get(&kind).copied();
        if let Some(failure) = failure {
            return Err(Self::injected(failure, format!("{} {}", kind, key)).await);
        }
        self.resource(kind, key)
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", kind, key)))
    }

    async fn create(&self, resource: &DependentResource) -> Result<(), StoreError> {
        let kind = resource.kind();
        let key = resource.key();
        self.record(StoreCall::Create(kind, key.clone()));

        let failure = self.create_failures.lock().unwrap().get(&kind).copied();
        if let Some(failure) = failure {
            if failure == InjectedFailure::AlreadyExists {
                self.resources
                    .lock()
                    .unwrap()
                    .entry((kind, key))
                    .or_insert_with(|| resource.clone());
            }
            return Err(Self::injected(failure, resource.describe()).await);
        }

        let mut resources = self.resources.lock().unwrap();
        if resources.contains_key(&(kind, key.clone())) {
            return Err(StoreError::AlreadyExists(resource.describe()));
        }
        resources.insert((kind, key), resource.clone());
        drop(resources);
        *self.mutations.lock().unwrap() += 1;
        Ok(())
    }
}
