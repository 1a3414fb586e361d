//! IntermineInstance Controller
//!
//! Converges the dependents of every IntermineInstance:
//! - Deployment: runs the instance workload
//! - Service: exposes the workload inside the cluster
//! - Ingress: routes external traffic to the Service
//!
//! Dependents are created when missing and never modified afterwards. They
//! carry an owner reference to their instance, so deleting the instance
//! deletes them through the cluster's garbage collector.

mod backoff;
mod config;
mod controller;
mod desired;
mod drift;
mod ensure;
mod error;
mod metrics;
mod reconciler;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting IntermineInstance Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Concurrency: {}", config.concurrency);
    info!("  Debounce: {:?}", config.debounce);
    info!("  Pass timeout: {:?}", config.pass_timeout);
    info!("  Backoff: {:?} .. {:?}", config.backoff_min, config.backoff_max);
    info!("  Drift policy: {}", config.drift_policy);
    info!("  Metrics port: {}", config.metrics_port);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
