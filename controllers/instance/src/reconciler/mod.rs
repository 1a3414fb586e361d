//! Reconciliation logic for IntermineInstance resources.
//!
//! One pass converges at most one missing dependent: the first kind in
//! convergence order that does not exist yet is created (or found to have
//! been created concurrently) and the pass asks to be run again. Nothing is
//! carried over between passes; every decision is made from what the store
//! returns.

#[cfg(test)]
mod reconciler_test;

use crate::desired::DesiredState;
use crate::drift::DriftPolicy;
use crate::ensure::{EnsureOutcome, bounded, ensure};
use crate::error::ControllerError;
use crate::metrics::{FailurePhase, Metrics};
use std::sync::Arc;
use std::time::Duration;
use store_client::{ObjectKey, ResourceStore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of a successful pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassResult {
    /// Every dependent exists, or there is nothing to do
    Done,
    /// A dependent was created; run another pass
    Requeue,
}

impl PassResult {
    fn as_str(self) -> &'static str {
        match self {
            PassResult::Done => "done",
            PassResult::Requeue => "requeue",
        }
    }
}

/// Reconciles IntermineInstance resources.
pub struct Reconciler {
    store: Box<dyn ResourceStore>,
    pass_timeout: Duration,
    drift_policy: DriftPolicy,
    metrics: Arc<Metrics>,
}

impl Reconciler {
    pub fn new(
        store: Box<dyn ResourceStore>,
        pass_timeout: Duration,
        drift_policy: DriftPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            pass_timeout,
            drift_policy,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Run one reconciliation pass for the instance identified by `key`.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<PassResult, ControllerError> {
        let started = std::time::Instant::now();
        debug!("Starting pass for IntermineInstance {}", key);

        let result = self.run_pass(key).await;

        let elapsed = started.elapsed();
        match &result {
            Ok(pass) => {
                debug!("Pass for IntermineInstance {} finished: {:?} in {:?}", key, pass, elapsed);
                self.metrics.observe_pass(pass.as_str(), elapsed);
            }
            Err(e) => {
                debug!("Pass for IntermineInstance {} failed after {:?}: {}", key, elapsed, e);
                self.metrics.observe_pass("error", elapsed);
            }
        }
        result
    }

    async fn run_pass(&self, key: &ObjectKey) -> Result<PassResult, ControllerError> {
        let deadline = Instant::now() + self.pass_timeout;
        let target = format!("IntermineInstance {}", key);

        let instance = match bounded(deadline, &target, self.store.get_instance(key)).await {
            Ok(instance) => instance,
            Err(e) if e.is_not_found() => {
                // Dependents are garbage-collected through their owner references
                debug!("IntermineInstance {} not found, nothing to do", key);
                return Ok(PassResult::Done);
            }
            Err(e) => {
                warn!("Failed to fetch IntermineInstance {}: {}", key, e);
                return Err(ControllerError::Store(e));
            }
        };

        if instance.metadata.deletion_timestamp.is_some() {
            info!("IntermineInstance {} is being deleted, leaving dependents to garbage collection", key);
            return Ok(PassResult::Done);
        }

        let desired = DesiredState::for_instance(&instance)?;

        for resource in desired.iter() {
            let kind = resource.kind();
            match ensure(self.store.as_ref(), resource, deadline, self.drift_policy, &self.metrics).await {
                EnsureOutcome::AlreadyExists => continue,
                EnsureOutcome::Created => {
                    info!("Created {} for IntermineInstance {}, requeueing", kind, key);
                    return Ok(PassResult::Requeue);
                }
                EnsureOutcome::CreateConflict => {
                    debug!("{} for IntermineInstance {} was created concurrently, requeueing", kind, key);
                    return Ok(PassResult::Requeue);
                }
                EnsureOutcome::LookupFailed(source) => {
                    self.metrics.ensure_failed(kind, FailurePhase::Lookup);
                    return Err(ControllerError::LookupFailed {
                        kind,
                        name: resource.key().to_string(),
                        source,
                    });
                }
                EnsureOutcome::CreateFailed(source) => {
                    self.metrics.ensure_failed(kind, FailurePhase::Create);
                    return Err(ControllerError::CreateFailed {
                        kind,
                        name: resource.key().to_string(),
                        source,
                    });
                }
            }
        }

        debug!("IntermineInstance {} is converged", key);
        Ok(PassResult::Done)
    }
}
