//! Kubernetes resource watcher.
//!
//! Dispatches reconciliation passes with `kube_runtime::Controller`. The
//! runtime watches IntermineInstances and the Deployments, Services and
//! Ingresses they own, keeps at most one pass in flight per instance and
//! coalesces events that arrive while a pass is running. This module maps
//! pass outcomes onto requeue actions and keeps the per-instance backoff.

use crate::backoff::BackoffTracker;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::{PassResult, Reconciler};
use crds::IntermineInstance;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::{Api, Client, Resource};
use kube_runtime::controller::{Action, Config as RuntimeConfig};
use kube_runtime::reflector::Store;
use kube_runtime::{Controller, watcher};
use std::sync::Arc;
use std::time::Duration;
use store_client::ObjectKey;
use tracing::{debug, error, info, warn};

/// Shared state handed to every reconcile and error-policy call.
pub struct Context {
    pub reconciler: Arc<Reconciler>,
    pub backoff: BackoffTracker,
}

impl Context {
    pub fn new(reconciler: Arc<Reconciler>, backoff: BackoffTracker) -> Self {
        Self { reconciler, backoff }
    }
}

/// Action to take after a successful pass.
pub fn action_for(pass: PassResult) -> Action {
    match pass {
        PassResult::Done => Action::await_change(),
        PassResult::Requeue => Action::requeue(Duration::ZERO),
    }
}

fn instance_key(instance: &IntermineInstance) -> Result<ObjectKey, ControllerError> {
    ObjectKey::for_resource(instance).ok_or_else(|| {
        ControllerError::MalformedDesiredState(format!(
            "IntermineInstance {} has no namespace",
            instance.meta().name.as_deref().unwrap_or("<unnamed>")
        ))
    })
}

async fn reconcile(instance: Arc<IntermineInstance>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let key = instance_key(&instance)?;
    let pass = ctx.reconciler.reconcile(&key).await?;
    ctx.backoff.reset(&key.to_string());
    Ok(action_for(pass))
}

/// Decide how a failed pass is retried.
///
/// Permanent errors wait for the next change of the instance; everything
/// else is requeued with per-instance exponential backoff.
pub fn error_policy(instance: Arc<IntermineInstance>, err: &ControllerError, ctx: Arc<Context>) -> Action {
    let key = match instance_key(&instance) {
        Ok(key) => key.to_string(),
        Err(_) => instance.meta().name.clone().unwrap_or_default(),
    };

    if !err.is_retryable() {
        error!("Reconciliation of IntermineInstance {} failed permanently: {}", key, err);
        return Action::await_change();
    }

    let (delay, attempts) = ctx.backoff.next_delay(&key);
    warn!(
        "Reconciliation of IntermineInstance {} failed (attempt {}), retrying in {:?}: {}",
        key, attempts, delay, err
    );
    ctx.reconciler.metrics().requeued_with_backoff();
    Action::requeue(delay)
}

/// Mark the controller ready once the instance cache has finished its
/// initial list. Never marks ready if the watch is torn down first.
async fn mark_ready_when_synced(store: Store<IntermineInstance>, metrics: Arc<Metrics>) {
    match store.wait_until_ready().await {
        Ok(()) => {
            info!("IntermineInstance cache synced");
            metrics.mark_ready();
        }
        Err(e) => warn!("IntermineInstance watch stopped before the initial sync: {}", e),
    }
}

/// Watch IntermineInstances and their dependents until shutdown.
pub async fn watch_instances(
    client: Client,
    ctx: Arc<Context>,
    config: &ControllerConfig,
) -> Result<(), ControllerError> {
    let (instances, deployments, services, ingresses) = match config.namespace.as_deref() {
        Some(ns) => (
            Api::<IntermineInstance>::namespaced(client.clone(), ns),
            Api::<Deployment>::namespaced(client.clone(), ns),
            Api::<Service>::namespaced(client.clone(), ns),
            Api::<Ingress>::namespaced(client, ns),
        ),
        None => (
            Api::<IntermineInstance>::all(client.clone()),
            Api::<Deployment>::all(client.clone()),
            Api::<Service>::all(client.clone()),
            Api::<Ingress>::all(client),
        ),
    };

    info!("Starting IntermineInstance watcher");

    let runtime_config = RuntimeConfig::default()
        .concurrency(config.concurrency)
        .debounce(config.debounce);

    let controller = Controller::new(instances, watcher::Config::default())
        .owns(deployments, watcher::Config::default())
        .owns(services, watcher::Config::default())
        .owns(ingresses, watcher::Config::default());
    tokio::spawn(mark_ready_when_synced(
        controller.store(),
        Arc::clone(ctx.reconciler.metrics()),
    ));

    controller
        .with_config(runtime_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled IntermineInstance {}", obj.name),
                Err(e) => warn!("IntermineInstance controller error: {}", e),
            }
        })
        .await;

    info!("IntermineInstance watcher stopped");
    Ok(())
}
