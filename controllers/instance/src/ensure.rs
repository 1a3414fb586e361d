//! Idempotent get-or-create for one dependent.

use crate::drift::{DriftPolicy, detect_drift};
use crate::metrics::Metrics;
use std::future::Future;
use store_client::{DependentResource, ResourceStore, StoreError};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

/// Result of ensuring one dependent exists.
#[derive(Debug)]
pub enum EnsureOutcome {
    /// The dependent was already present
    AlreadyExists,
    /// The dependent was missing and has been created
    Created,
    /// The dependent was missing but a racing creator won; the next pass
    /// sees it as existing
    CreateConflict,
    /// The dependent was missing and creating it failed
    CreateFailed(StoreError),
    /// Looking the dependent up failed for a reason other than NotFound
    LookupFailed(StoreError),
}

/// Make sure `desired` exists in `store`.
///
/// Existing objects are never modified. Every store call is abandoned once
/// `deadline` passes, yielding `StoreError::Cancelled`.
pub async fn ensure(
    store: &dyn ResourceStore,
    desired: &DependentResource,
    deadline: Instant,
    drift_policy: DriftPolicy,
    metrics: &Metrics,
) -> EnsureOutcome {
    let kind = desired.kind();
    let key = desired.key();

    match bounded(deadline, &desired.describe(), store.get(kind, &key)).await {
        Ok(live) => {
            debug!("{} already exists", desired.describe());
            if drift_policy == DriftPolicy::Report {
                let diffs = detect_drift(desired, &live);
                if !diffs.is_empty() {
                    warn!("{} has drifted from its desired state: {}", desired.describe(), diffs.join("; "));
                    metrics.drift_detected(kind);
                }
            }
            EnsureOutcome::AlreadyExists
        }
        Err(e) if e.is_not_found() => {
            match bounded(deadline, &desired.describe(), store.create(desired)).await {
                Ok(()) => {
                    info!("Created {}", desired.describe());
                    metrics.dependent_created(kind);
                    EnsureOutcome::Created
                }
                Err(e) if e.is_already_exists() => {
                    debug!("{} was created concurrently: {}", desired.describe(), e);
                    EnsureOutcome::CreateConflict
                }
                Err(e) => EnsureOutcome::CreateFailed(e),
            }
        }
        Err(e) => EnsureOutcome::LookupFailed(e),
    }
}

/// Run a store call, abandoning it once `deadline` passes.
pub(crate) async fn bounded<T, F>(deadline: Instant, target: &str, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match timeout_at(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Cancelled(format!("{}: pass deadline elapsed", target))),
    }
}
