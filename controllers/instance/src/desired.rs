//! Desired-state builder.
//!
//! Maps an `IntermineInstance` to the Deployment, Service and Ingress it
//! implies. The mapping is pure: identical instances always produce
//! identical objects, owner reference included.

use crate::error::ControllerError;
use crds::IntermineInstance;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule, IngressServiceBackend, IngressSpec,
    ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use store_client::{DependentResource, ResourceKind};

pub const APP_LABEL_VALUE: &str = "intermineinstance";
pub const CONTAINER_NAME: &str = "hello-pod";
pub const CONTAINER_IMAGE: &str = "paulbouwer/hello-kubernetes:1.10";
pub const CONTAINER_PORT_NAME: &str = "hello";
pub const SERVICE_PORT_NAME: &str = "http";
pub const APP_PORT: i32 = 8080;

const DNS1035_LABEL_MAX: usize = 63;
const DNS1123_SUBDOMAIN_MAX: usize = 253;

/// The three dependents one instance implies.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredState {
    deployment: DependentResource,
    service: DependentResource,
    ingress: DependentResource,
}

impl DesiredState {
    /// Build the desired dependents of `instance`.
    ///
    /// Fails with `MalformedDesiredState` when the instance lacks a name,
    /// namespace or uid, or when a derived name is not a valid object name.
    pub fn for_instance(instance: &IntermineInstance) -> Result<Self, ControllerError> {
        let base = Base::from_instance(instance)?;

        let deployment = DependentResource::Deployment(build_deployment(&base));
        let service = DependentResource::Service(build_service(&base));
        let ingress = DependentResource::Ingress(build_ingress(&base));

        Ok(Self {
            deployment,
            service,
            ingress,
        })
    }

    pub fn resource(&self, kind: ResourceKind) -> &DependentResource {
        match kind {
            ResourceKind::Deployment => &self.deployment,
            ResourceKind::Service => &self.service,
            ResourceKind::Ingress => &self.ingress,
        }
    }

    /// Dependents in convergence order.
    pub fn iter(&self) -> impl Iterator<Item = &DependentResource> {
        ResourceKind::ORDERED.into_iter().map(|kind| self.resource(kind))
    }
}

/// Name of the dependent of `kind` owned by the instance called `instance_name`.
pub fn dependent_name(instance_name: &str, kind: ResourceKind) -> String {
    format!("{}{}", instance_name, kind.name_suffix())
}

/// Identity shared by every dependent of one instance.
struct Base {
    instance_name: String,
    namespace: String,
    labels: BTreeMap<String, String>,
    owner: OwnerReference,
}

impl Base {
    fn from_instance(instance: &IntermineInstance) -> Result<Self, ControllerError> {
        let instance_name = instance
            .metadata
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ControllerError::MalformedDesiredState("instance has no name".to_string()))?;
        let namespace = instance
            .namespace()
            .filter(|ns| !ns.is_empty())
            .ok_or_else(|| {
                ControllerError::MalformedDesiredState(format!("instance {} has no namespace", instance_name))
            })?;
        if instance.uid().is_none_or(|uid| uid.is_empty()) {
            return Err(ControllerError::MalformedDesiredState(format!(
                "instance {}/{} has no uid",
                namespace, instance_name
            )));
        }
        let mut owner = instance.controller_owner_ref(&()).ok_or_else(|| {
            ControllerError::MalformedDesiredState(format!(
                "cannot derive owner reference for {}/{}",
                namespace, instance_name
            ))
        })?;
        // Foreground deletion of the instance waits for its dependents
        owner.block_owner_deletion = Some(true);

        for kind in ResourceKind::ORDERED {
            validate_name(kind, &dependent_name(&instance_name, kind))?;
        }

        let labels = BTreeMap::from([
            ("app".to_string(), APP_LABEL_VALUE.to_string()),
            ("instance".to_string(), instance_name.clone()),
        ]);

        Ok(Self {
            instance_name,
            namespace,
            labels,
            owner,
        })
    }

    fn metadata(&self, kind: ResourceKind) -> ObjectMeta {
        ObjectMeta {
            name: Some(dependent_name(&self.instance_name, kind)),
            namespace: Some(self.namespace.clone()),
            labels: Some(self.labels.clone()),
            owner_references: Some(vec![self.owner.clone()]),
            ..Default::default()
        }
    }
}

fn build_deployment(base: &Base) -> Deployment {
    Deployment {
        metadata: base.metadata(ResourceKind::Deployment),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(base.labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(base.labels.clone()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: CONTAINER_NAME.to_string(),
                        image: Some(CONTAINER_IMAGE.to_string()),
                        ports: Some(vec![ContainerPort {
                            name: Some(CONTAINER_PORT_NAME.to_string()),
                            container_port: APP_PORT,
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn build_service(base: &Base) -> Service {
    Service {
        metadata: base.metadata(ResourceKind::Service),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(base.labels.clone()),
            ports: Some(vec![ServicePort {
                name: Some(SERVICE_PORT_NAME.to_string()),
                port: APP_PORT,
                target_port: Some(IntOrString::Int(APP_PORT)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn build_ingress(base: &Base) -> Ingress {
    Ingress {
        metadata: base.metadata(ResourceKind::Ingress),
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: dependent_name(&base.instance_name, ResourceKind::Service),
                                port: Some(ServiceBackendPort {
                                    number: Some(APP_PORT),
                                    ..Default::default()
                                }),
                            }),
                            ..Default::default()
                        },
                    }],
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Service names must be DNS-1035 labels; the other kinds accept DNS-1123
/// subdomains.
fn validate_name(kind: ResourceKind, name: &str) -> Result<(), ControllerError> {
    let valid = match kind {
        ResourceKind::Service => is_dns1035_label(name),
        ResourceKind::Deployment | ResourceKind::Ingress => is_dns1123_subdomain(name),
    };
    if valid {
        Ok(())
    } else {
        Err(ControllerError::MalformedDesiredState(format!(
            "{} name '{}' is not a valid object name",
            kind, name
        )))
    }
}

fn is_dns1035_label(name: &str) -> bool {
    let bytes = name.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= DNS1035_LABEL_MAX
        && bytes[0].is_ascii_lowercase()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
        && bytes.iter().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

fn is_dns1123_part(part: &str) -> bool {
    let bytes = part.as_bytes();
    !bytes.is_empty()
        && bytes[0].is_ascii_alphanumeric()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
        && bytes.iter().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

/// Each dot-separated part follows the label character rules; only the
/// whole name is length-limited.
fn is_dns1123_subdomain(name: &str) -> bool {
    !name.is_empty() && name.len() <= DNS1123_SUBDOMAIN_MAX && name.split('.').all(is_dns1123_part)
}
