//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the store,
//! reconciler and metrics together and runs the instance watcher alongside
//! the metrics/probe server.

use crate::backoff::BackoffTracker;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::{Metrics, run_metrics_server};
use crate::reconciler::Reconciler;
use crate::watcher::{Context, watch_instances};
use kube::Client;
use std::sync::Arc;
use store_client::KubeStore;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for IntermineInstance resources.
pub struct Controller {
    instance_watcher: JoinHandle<Result<(), ControllerError>>,
    metrics_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing IntermineInstance Controller");

        let kube_client = Client::try_default().await?;

        let metrics = Arc::new(Metrics::new()?);
        let reconciler = Reconciler::new(
            Box::new(KubeStore::new(kube_client.clone())),
            config.pass_timeout,
            config.drift_policy,
            metrics.clone(),
        );
        let ctx = Arc::new(Context::new(
            Arc::new(reconciler),
            BackoffTracker::new(config.backoff_min, config.backoff_max),
        ));

        let metrics_server = {
            let port = config.metrics_port;
            tokio::spawn(async move { run_metrics_server(metrics, port).await })
        };

        let instance_watcher = tokio::spawn(async move { watch_instances(kube_client, ctx, &config).await });

        Ok(Self {
            instance_watcher,
            metrics_server,
        })
    }

    /// Runs the controller until shutdown.
    ///
    /// The watcher returns on SIGINT/SIGTERM; the metrics server only
    /// returns when it fails.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("IntermineInstance Controller running");

        tokio::select! {
            result = &mut self.instance_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("IntermineInstance watcher panicked: {}", e)))??;
                info!("IntermineInstance Controller shutting down");
            }
            result = &mut self.metrics_server => {
                result.map_err(|e| ControllerError::Watch(format!("Metrics server panicked: {}", e)))??;
            }
        }

        self.instance_watcher.abort();
        self.metrics_server.abort();
        Ok(())
    }
}
