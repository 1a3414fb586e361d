//! Prometheus metrics and the operational HTTP server.
//!
//! Serves `/metrics` (Prometheus text format), `/healthz` (liveness) and
//! `/readyz` (readiness) from one axum router.

use crate::error::ControllerError;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use store_client::ResourceKind;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

const NAMESPACE: &str = "instance_operator";

/// Phase of an ensure call that failed, used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePhase {
    Lookup,
    Create,
}

impl FailurePhase {
    fn as_str(self) -> &'static str {
        match self {
            FailurePhase::Lookup => "lookup",
            FailurePhase::Create => "create",
        }
    }
}

/// Controller metrics, registered in a registry owned by this struct.
pub struct Metrics {
    registry: Registry,
    reconcile_passes: IntCounterVec,
    reconcile_duration: Histogram,
    dependents_created: IntCounterVec,
    ensure_failures: IntCounterVec,
    drift_detected: IntCounterVec,
    requeues_with_backoff: IntCounter,
    ready: AtomicBool,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let reconcile_passes = IntCounterVec::new(
            Opts::new("reconcile_passes_total", "Reconciliation passes by result").namespace(NAMESPACE),
            &["result"],
        )?;
        let reconcile_duration = Histogram::with_opts(
            HistogramOpts::new("reconcile_duration_seconds", "Duration of reconciliation passes")
                .namespace(NAMESPACE),
        )?;
        let dependents_created = IntCounterVec::new(
            Opts::new("dependents_created_total", "Dependents created by kind").namespace(NAMESPACE),
            &["kind"],
        )?;
        let ensure_failures = IntCounterVec::new(
            Opts::new("ensure_failures_total", "Failed dependent lookups and creates").namespace(NAMESPACE),
            &["kind", "phase"],
        )?;
        let drift_detected = IntCounterVec::new(
            Opts::new("drift_detected_total", "Existing dependents that differ from the desired state")
                .namespace(NAMESPACE),
            &["kind"],
        )?;
        let requeues_with_backoff = IntCounter::with_opts(
            Opts::new("requeues_with_backoff_total", "Failed passes requeued with backoff").namespace(NAMESPACE),
        )?;

        registry.register(Box::new(reconcile_passes.clone()))?;
        registry.register(Box::new(reconcile_duration.clone()))?;
        registry.register(Box::new(dependents_created.clone()))?;
        registry.register(Box::new(ensure_failures.clone()))?;
        registry.register(Box::new(drift_detected.clone()))?;
        registry.register(Box::new(requeues_with_backoff.clone()))?;

        Ok(Self {
            registry,
            reconcile_passes,
            reconcile_duration,
            dependents_created,
            ensure_failures,
            drift_detected,
            requeues_with_backoff,
            ready: AtomicBool::new(false),
        })
    }

    /// Record a finished pass; `result` is `done`, `requeue` or `error`.
    pub fn observe_pass(&self, result: &str, elapsed: Duration) {
        self.reconcile_passes.with_label_values(&[result]).inc();
        self.reconcile_duration.observe(elapsed.as_secs_f64());
    }

    pub fn dependent_created(&self, kind: ResourceKind) {
        self.dependents_created.with_label_values(&[kind.as_str()]).inc();
    }

    pub fn ensure_failed(&self, kind: ResourceKind, phase: FailurePhase) {
        self.ensure_failures
            .with_label_values(&[kind.as_str(), phase.as_str()])
            .inc();
    }

    pub fn drift_detected(&self, kind: ResourceKind) {
        self.drift_detected.with_label_values(&[kind.as_str()]).inc();
    }

    pub fn requeued_with_backoff(&self) {
        self.requeues_with_backoff.inc();
    }

    /// Mark the controller ready; `/readyz` answers 503 until then.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
        info!("Controller marked as ready");
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render(&self) -> Result<String, ControllerError> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }
}

#[cfg(test)]
impl Metrics {
    /// Number of passes recorded with `result`
    pub fn passes(&self, result: &str) -> u64 {
        self.reconcile_passes.with_label_values(&[result]).get()
    }

    pub fn created(&self, kind: ResourceKind) -> u64 {
        self.dependents_created.with_label_values(&[kind.as_str()]).get()
    }

    pub fn failures(&self, kind: ResourceKind, phase: FailurePhase) -> u64 {
        self.ensure_failures
            .with_label_values(&[kind.as_str(), phase.as_str()])
            .get()
    }

    pub fn drifted(&self, kind: ResourceKind) -> u64 {
        self.drift_detected.with_label_values(&[kind.as_str()]).get()
    }

    pub fn backoff_requeues(&self) -> u64 {
        self.requeues_with_backoff.get()
    }
}

/// Router serving metrics and probes.
pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// Run the metrics/probe server until it fails.
pub async fn run_metrics_server(metrics: Arc<Metrics>, port: u16) -> Result<(), ControllerError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(port = port, "Metrics server listening");

    axum::serve(listener, router(metrics)).await?;
    Ok(())
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    match metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn healthz() -> StatusCode {
    debug!("Liveness probe: OK");
    StatusCode::OK
}

async fn readyz(State(metrics): State<Arc<Metrics>>) -> StatusCode {
    if metrics.is_ready() {
        StatusCode::OK
    } else {
        debug!("Readiness probe: NOT READY");
        StatusCode::SERVICE_UNAVAILABLE
    }
}
