//! Test utilities for unit testing the reconciler
//!
//! This module provides helpers for creating test data and setting up test scenarios.

#[cfg(test)]
use crate::drift::DriftPolicy;
#[cfg(test)]
use crate::metrics::Metrics;
#[cfg(test)]
use crate::reconciler::Reconciler;
#[cfg(test)]
use crds::{IntermineInstance, IntermineInstanceSpec};
#[cfg(test)]
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
#[cfg(test)]
use std::sync::Arc;
#[cfg(test)]
use std::time::Duration;
#[cfg(test)]
use store_client::MockResourceStore;

/// Helper to create a test IntermineInstance; an empty `uid` leaves it unset
#[cfg(test)]
pub fn create_test_instance(namespace: &str, name: &str, uid: &str) -> IntermineInstance {
    IntermineInstance {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: (!uid.is_empty()).then(|| uid.to_string()),
            ..Default::default()
        },
        spec: IntermineInstanceSpec::default(),
        status: None,
    }
}

/// Helper to create a reconciler backed by a clone of `store`
#[cfg(test)]
pub fn create_test_reconciler(store: &MockResourceStore) -> Reconciler {
    create_test_reconciler_with(store, Duration::from_secs(30), DriftPolicy::Ignore)
}

/// Helper to create a reconciler with explicit deadline and drift policy
#[cfg(test)]
pub fn create_test_reconciler_with(
    store: &MockResourceStore,
    pass_timeout: Duration,
    drift_policy: DriftPolicy,
) -> Reconciler {
    let metrics = Arc::new(Metrics::new().unwrap());
    Reconciler::new(Box::new(store.clone()), pass_timeout, drift_policy, metrics)
}
