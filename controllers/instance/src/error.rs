//! Controller-specific error types.
//!
//! This module defines error types specific to the IntermineInstance
//! Controller that are not covered by upstream library errors.

use kube::Error as KubeError;
use store_client::{ResourceKind, StoreError};
use thiserror::Error;

/// Errors that can occur in the IntermineInstance Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes client error outside a reconciliation pass
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Fetching the instance itself failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Looking up a dependent failed for a reason other than NotFound
    #[error("Failed to look up {kind} {name}: {source}")]
    LookupFailed {
        kind: ResourceKind,
        name: String,
        #[source]
        source: StoreError,
    },

    /// Creating a missing dependent failed
    #[error("Failed to create {kind} {name}: {source}")]
    CreateFailed {
        kind: ResourceKind,
        name: String,
        #[source]
        source: StoreError,
    },

    /// The desired-state builder produced an unusable object
    #[error("Malformed desired state: {0}")]
    MalformedDesiredState(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Metrics/probe server I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Whether the dispatcher should retry the pass with backoff.
    ///
    /// Malformed desired state and objects the store rejects as invalid
    /// will fail identically on every retry, so they wait for the instance
    /// to change instead.
    pub fn is_retryable(&self) -> bool {
        match self {
            ControllerError::MalformedDesiredState(_) | ControllerError::InvalidConfig(_) => false,
            ControllerError::Store(source)
            | ControllerError::LookupFailed { source, .. }
            | ControllerError::CreateFailed { source, .. } => source.is_transient(),
            _ => true,
        }
    }
}
