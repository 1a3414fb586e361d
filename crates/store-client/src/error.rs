//! Resource store errors

use thiserror::Error;

/// Errors that can occur when talking to the cluster resource store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Create was rejected because the object already exists (HTTP 409)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The store rejected the object as invalid (HTTP 400/422)
    #[error("Invalid object: {0}")]
    Invalid(String),

    /// The store is temporarily unable to serve the request (HTTP 429/5xx)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The call was abandoned because the pass deadline elapsed
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Any other Kubernetes client error (transport, decoding, auth)
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),
}

impl StoreError {
    /// Classifies a `kube::Error` raised while operating on `target`.
    pub fn from_kube(err: kube::Error, target: &str) -> Self {
        let code = match &err {
            kube::Error::Api(response) => Some(response.code),
            _ => None,
        };

        match code {
            Some(404) => StoreError::NotFound(target.to_string()),
            Some(409) => StoreError::AlreadyExists(target.to_string()),
            Some(400 | 422) => StoreError::Invalid(format!("{}: {}", target, err)),
            Some(429 | 500..=599) => StoreError::Unavailable(format!("{}: {}", target, err)),
            _ => StoreError::Kube(err),
        }
    }

    /// Returns true for the "object does not exist" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Returns true when a create lost a race against another creator.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }

    /// Returns true if retrying the same call later may succeed.
    ///
    /// `Invalid` is the only permanent condition: the store will keep
    /// rejecting the same object until the code producing it changes.
    pub fn is_transient(&self) -> bool {
        !matches!(self, StoreError::Invalid(_))
    }
}
