//! Kubernetes-backed resource store.

use crate::error::StoreError;
use crate::models::{DependentResource, ObjectKey, ResourceKind};
use crate::store_trait::ResourceStore;
use crds::IntermineInstance;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::PostParams;
use kube::{Api, Client};
use tracing::debug;

/// Field manager recorded on every object the controller creates.
pub const FIELD_MANAGER: &str = "intermine-operator";

/// Resource store backed by the Kubernetes API server.
///
/// Every call goes straight to the API server; there is no local cache.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl ResourceStore for KubeStore {
    async fn get_instance(&self, key: &ObjectKey) -> Result<IntermineInstance, StoreError> {
        let api: Api<IntermineInstance> = Api::namespaced(self.client.clone(), &key.namespace);
        api.get(&key.name)
            .await
            .map_err(|e| StoreError::from_kube(e, &format!("IntermineInstance {}", key)))
    }

    async fn get(&self, kind: ResourceKind, key: &ObjectKey) -> Result<DependentResource, StoreError> {
        debug!("GET {} {}", kind, key);
        let target = format!("{} {}", kind, key);
        let ns = key.namespace.as_str();
        let result = match kind {
            ResourceKind::Deployment => Api::<Deployment>::namespaced(self.client.clone(), ns)
                .get(&key.name)
                .await
                .map(DependentResource::Deployment),
            ResourceKind::Service => Api::<Service>::namespaced(self.client.clone(), ns)
                .get(&key.name)
                .await
                .map(DependentResource::Service),
            ResourceKind::Ingress => Api::<Ingress>::namespaced(self.client.clone(), ns)
                .get(&key.name)
                .await
                .map(DependentResource::Ingress),
        };
        result.map_err(|e| StoreError::from_kube(e, &target))
    }

    async fn create(&self, resource: &DependentResource) -> Result<(), StoreError> {
        let key = resource.key();
        debug!("CREATE {}", resource.describe());
        let pp = Self::post_params();
        let ns = key.namespace.as_str();
        let result = match resource {
            DependentResource::Deployment(d) => Api::<Deployment>::namespaced(self.client.clone(), ns)
                .create(&pp, d)
                .await
                .map(|_| ()),
            DependentResource::Service(s) => Api::<Service>::namespaced(self.client.clone(), ns)
                .create(&pp, s)
                .await
                .map(|_| ()),
            DependentResource::Ingress(i) => Api::<Ingress>::namespaced(self.client.clone(), ns)
                .create(&pp, i)
                .await
                .map(|_| ()),
        };
        result.map_err(|e| StoreError::from_kube(e, &resource.describe()))
    }
}
