//! Drift detection between desired and live dependents.
//!
//! Existing dependents are never modified. Under [`DriftPolicy::Report`] the
//! fields the controller manages are compared and every difference is
//! described so it can be logged and counted.
//!
//! The comparison is a subset check: the live object may carry extra labels,
//! extra containers or server-side defaults without being reported.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::fmt;
use std::str::FromStr;
use store_client::DependentResource;

/// What to do when an existing dependent differs from the desired one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DriftPolicy {
    /// Accept any existing dependent silently
    #[default]
    Ignore,
    /// Log and count differences, never correct them
    Report,
}

impl FromStr for DriftPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => Ok(DriftPolicy::Ignore),
            "report" => Ok(DriftPolicy::Report),
            other => Err(format!("expected 'ignore' or 'report', got '{}'", other)),
        }
    }
}

impl fmt::Display for DriftPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftPolicy::Ignore => f.write_str("ignore"),
            DriftPolicy::Report => f.write_str("report"),
        }
    }
}

/// Describe every managed field of `desired` that `live` does not match.
///
/// An empty result means no drift.
pub fn detect_drift(desired: &DependentResource, live: &DependentResource) -> Vec<String> {
    let mut diffs = Vec::new();
    compare_metadata(desired.metadata(), live.metadata(), &mut diffs);

    match (desired, live) {
        (DependentResource::Deployment(d), DependentResource::Deployment(l)) => {
            compare_deployment(d, l, &mut diffs)
        }
        (DependentResource::Service(d), DependentResource::Service(l)) => {
            compare_service(d, l, &mut diffs)
        }
        (DependentResource::Ingress(d), DependentResource::Ingress(l)) => {
            compare_ingress(d, l, &mut diffs)
        }
        _ => diffs.push(format!("kind {} differs from {}", live.kind(), desired.kind())),
    }
    diffs
}

fn compare_metadata(desired: &ObjectMeta, live: &ObjectMeta, diffs: &mut Vec<String>) {
    let live_labels = live.labels.clone().unwrap_or_default();
    for (key, value) in desired.labels.iter().flatten() {
        match live_labels.get(key) {
            Some(v) if v == value => {}
            Some(v) => diffs.push(format!("label {}={} (want {})", key, v, value)),
            None => diffs.push(format!("label {} missing", key)),
        }
    }

    for owner in desired.owner_references.iter().flatten() {
        let owned = live
            .owner_references
            .iter()
            .flatten()
            .any(|o| o.uid == owner.uid);
        if !owned {
            diffs.push(format!("owner reference to {} {} missing", owner.kind, owner.name));
        }
    }
}

fn compare_deployment(desired: &Deployment, live: &Deployment, diffs: &mut Vec<String>) {
    let want_selector = desired.spec.as_ref().and_then(|s| s.selector.match_labels.clone());
    let live_selector = live.spec.as_ref().and_then(|s| s.selector.match_labels.clone());
    if want_selector != live_selector {
        diffs.push("selector differs".to_string());
    }

    let containers = |d: &Deployment| {
        d.spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .map(|p| p.containers.clone())
            .unwrap_or_default()
    };
    let live_containers = containers(live);
    for want in containers(desired) {
        let Some(have) = live_containers.iter().find(|c| c.name == want.name) else {
            diffs.push(format!("container {} missing", want.name));
            continue;
        };
        if have.image != want.image {
            diffs.push(format!(
                "container {} image {} (want {})",
                want.name,
                have.image.as_deref().unwrap_or("<none>"),
                want.image.as_deref().unwrap_or("<none>")
            ));
        }
        let have_ports: Vec<i32> = have.ports.iter().flatten().map(|p| p.container_port).collect();
        for port in want.ports.iter().flatten() {
            if !have_ports.contains(&port.container_port) {
                diffs.push(format!("container {} port {} missing", want.name, port.container_port));
            }
        }
    }
}

fn compare_service(desired: &Service, live: &Service, diffs: &mut Vec<String>) {
    let want_selector = desired.spec.as_ref().and_then(|s| s.selector.clone());
    let live_selector = live.spec.as_ref().and_then(|s| s.selector.clone());
    if want_selector != live_selector {
        diffs.push("selector differs".to_string());
    }

    let live_ports = live.spec.as_ref().and_then(|s| s.ports.clone()).unwrap_or_default();
    for want in desired.spec.iter().flat_map(|s| s.ports.iter().flatten()) {
        let matched = live_ports
            .iter()
            .any(|p| p.port == want.port && p.target_port == want.target_port);
        if !matched {
            diffs.push(format!("service port {} missing or retargeted", want.port));
        }
    }
}

fn ingress_backends(ingress: &Ingress) -> Vec<(String, String, Option<i32>)> {
    ingress
        .spec
        .iter()
        .flat_map(|s| s.rules.iter().flatten())
        .flat_map(|r| r.http.iter().flat_map(|h| h.paths.iter()))
        .filter_map(|p| {
            let svc = p.backend.service.as_ref()?;
            Some((
                p.path.clone().unwrap_or_default(),
                svc.name.clone(),
                svc.port.as_ref().and_then(|port| port.number),
            ))
        })
        .collect()
}

fn compare_ingress(desired: &Ingress, live: &Ingress, diffs: &mut Vec<String>) {
    let live_backends = ingress_backends(live);
    for (path, service, port) in ingress_backends(desired) {
        if !live_backends.contains(&(path.clone(), service.clone(), port)) {
            diffs.push(format!(
                "route {} -> {}:{} missing",
                path,
                service,
                port.map(|p| p.to_string()).unwrap_or_default()
            ));
        }
    }
}
