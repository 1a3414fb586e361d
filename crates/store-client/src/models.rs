//! Resource store data models
//!
//! The store handles a closed set of dependent kinds. Each kind is a variant
//! of [`DependentResource`] tagged by [`ResourceKind`].

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::fmt;

/// Namespaced identifier of a cluster object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a namespaced object, or `None` if it carries no namespace.
    pub fn for_resource<K: Resource>(resource: &K) -> Option<Self> {
        let namespace = resource.namespace()?;
        Some(Self::new(namespace, resource.name_any()))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Tag identifying the kind of a dependent resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Deployment,
    Service,
    Ingress,
}

impl ResourceKind {
    /// Convergence order: a pass never touches a later kind before every
    /// earlier one exists.
    pub const ORDERED: [ResourceKind; 3] = [
        ResourceKind::Deployment,
        ResourceKind::Service,
        ResourceKind::Ingress,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Deployment => "Deployment",
            ResourceKind::Service => "Service",
            ResourceKind::Ingress => "Ingress",
        }
    }

    /// Suffix appended to the owning instance name to derive the object name.
    pub fn name_suffix(self) -> &'static str {
        match self {
            ResourceKind::Deployment => "-deployment",
            ResourceKind::Service => "-service",
            ResourceKind::Ingress => "-ingress",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dependent cluster object owned by an instance.
#[derive(Debug, Clone, PartialEq)]
pub enum DependentResource {
    Deployment(Deployment),
    Service(Service),
    Ingress(Ingress),
}

impl DependentResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            DependentResource::Deployment(_) => ResourceKind::Deployment,
            DependentResource::Service(_) => ResourceKind::Service,
            DependentResource::Ingress(_) => ResourceKind::Ingress,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            DependentResource::Deployment(d) => &d.metadata,
            DependentResource::Service(s) => &s.metadata,
            DependentResource::Ingress(i) => &i.metadata,
        }
    }

    /// Namespaced name, empty components if the metadata lacks them.
    pub fn key(&self) -> ObjectKey {
        let meta = self.metadata();
        ObjectKey::new(
            meta.namespace.clone().unwrap_or_default(),
            meta.name.clone().unwrap_or_default(),
        )
    }

    /// Short `Kind namespace/name` description used in logs and errors.
    pub fn describe(&self) -> String {
        format!("{} {}", self.kind(), self.key())
    }
}
