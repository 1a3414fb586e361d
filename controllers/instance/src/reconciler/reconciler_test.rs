//! Unit tests for the IntermineInstance reconciler

#[cfg(test)]
mod tests {
    use super::super::PassResult;
    use crate::desired::DesiredState;
    use crate::drift::DriftPolicy;
    use crate::error::ControllerError;
    use crate::metrics::FailurePhase;
    use crate::test_utils::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use std::time::Duration;
    use store_client::{InjectedFailure, MockResourceStore, ObjectKey, ResourceKind, StoreCall, StoreError};

    fn app1() -> ObjectKey {
        ObjectKey::new("demo", "app1")
    }

    fn dependent_key(kind: ResourceKind) -> ObjectKey {
        ObjectKey::new("demo", format!("app1{}", kind.name_suffix()))
    }

    /// Store holding instance demo/app1 and, optionally, some of its dependents
    fn store_with(existing: &[ResourceKind]) -> MockResourceStore {
        let store = MockResourceStore::new();
        let instance = create_test_instance("demo", "app1", "uid-app1");
        let desired = DesiredState::for_instance(&instance).unwrap();
        for kind in existing {
            store.add_resource(desired.resource(*kind).clone());
        }
        store.add_instance(instance);
        store
    }

    #[tokio::test]
    async fn test_new_instance_converges_one_dependent_per_pass() {
        let store = store_with(&[]);
        let reconciler = create_test_reconciler(&store);

        // Pass 1: Deployment
        assert_eq!(reconciler.reconcile(&app1()).await.unwrap(), PassResult::Requeue);
        assert!(store.resource(ResourceKind::Deployment, &dependent_key(ResourceKind::Deployment)).is_some());
        assert_eq!(store.resource_count(), 1);

        // Pass 2: Service
        assert_eq!(reconciler.reconcile(&app1()).await.unwrap(), PassResult::Requeue);
        assert!(store.resource(ResourceKind::Service, &dependent_key(ResourceKind::Service)).is_some());
        assert_eq!(store.resource_count(), 2);

        // Pass 3: Ingress
        assert_eq!(reconciler.reconcile(&app1()).await.unwrap(), PassResult::Requeue);
        assert!(store.resource(ResourceKind::Ingress, &dependent_key(ResourceKind::Ingress)).is_some());
        assert_eq!(store.resource_count(), 3);

        // Pass 4: converged
        assert_eq!(reconciler.reconcile(&app1()).await.unwrap(), PassResult::Done);
        assert_eq!(store.mutation_count(), 3);

        let metrics = reconciler.metrics();
        assert_eq!(metrics.passes("requeue"), 3);
        assert_eq!(metrics.passes("done"), 1);
        for kind in ResourceKind::ORDERED {
            assert_eq!(metrics.created(kind), 1);
        }
    }

    #[tokio::test]
    async fn test_converged_instance_is_idempotent() {
        let store = store_with(&ResourceKind::ORDERED);
        let reconciler = create_test_reconciler(&store);

        assert_eq!(reconciler.reconcile(&app1()).await.unwrap(), PassResult::Done);
        assert_eq!(reconciler.reconcile(&app1()).await.unwrap(), PassResult::Done);

        assert_eq!(store.mutation_count(), 0);
        assert!(!store.calls().iter().any(|c| matches!(c, StoreCall::Create(..))));
    }

    #[tokio::test]
    async fn test_earlier_kind_is_created_before_later_ones() {
        // Service exists, Deployment does not
        let store = store_with(&[ResourceKind::Service]);
        let reconciler = create_test_reconciler(&store);

        assert_eq!(reconciler.reconcile(&app1()).await.unwrap(), PassResult::Requeue);

        assert_eq!(
            store.calls(),
            vec![
                StoreCall::GetInstance(app1()),
                StoreCall::Get(ResourceKind::Deployment, dependent_key(ResourceKind::Deployment)),
                StoreCall::Create(ResourceKind::Deployment, dependent_key(ResourceKind::Deployment)),
            ]
        );
        assert!(store.resource(ResourceKind::Ingress, &dependent_key(ResourceKind::Ingress)).is_none());
    }

    #[tokio::test]
    async fn test_created_dependents_are_owned_by_instance() {
        let store = store_with(&[]);
        let reconciler = create_test_reconciler(&store);

        while reconciler.reconcile(&app1()).await.unwrap() == PassResult::Requeue {}

        for kind in ResourceKind::ORDERED {
            let resource = store.resource(kind, &dependent_key(kind)).unwrap();
            let owners = resource.metadata().owner_references.clone().unwrap();
            assert_eq!(owners.len(), 1, "{} must have exactly one owner", kind);
            assert_eq!(owners[0].uid, "uid-app1");
            assert_eq!(owners[0].controller, Some(true));
        }
    }

    #[tokio::test]
    async fn test_absent_instance_is_done_without_mutations() {
        let store = MockResourceStore::new();
        let reconciler = create_test_reconciler(&store);

        assert_eq!(reconciler.reconcile(&app1()).await.unwrap(), PassResult::Done);
        assert_eq!(store.mutation_count(), 0);
        assert_eq!(store.calls(), vec![StoreCall::GetInstance(app1())]);
    }

    #[tokio::test]
    async fn test_deleted_instance_dependents_are_collected() {
        let store = store_with(&ResourceKind::ORDERED);
        let reconciler = create_test_reconciler(&store);

        store.delete_instance(&app1()).unwrap();
        assert_eq!(store.resource_count(), 0);

        assert_eq!(reconciler.reconcile(&app1()).await.unwrap(), PassResult::Done);
        assert_eq!(store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_terminating_instance_is_left_alone() {
        let store = MockResourceStore::new();
        let mut instance = create_test_instance("demo", "app1", "uid-app1");
        instance.metadata.deletion_timestamp = Some(Time(Default::default()));
        store.add_instance(instance);
        let reconciler = create_test_reconciler(&store);

        assert_eq!(reconciler.reconcile(&app1()).await.unwrap(), PassResult::Done);
        assert_eq!(store.calls(), vec![StoreCall::GetInstance(app1())]);
    }

    #[tokio::test]
    async fn test_transient_instance_error_skips_dependents() {
        let store = store_with(&[]);
        store.fail_get_instance(app1(), InjectedFailure::Unavailable);
        let reconciler = create_test_reconciler(&store);

        let err = reconciler.reconcile(&app1()).await.unwrap_err();

        assert!(matches!(err, ControllerError::Store(StoreError::Unavailable(_))));
        assert!(err.is_retryable());
        assert_eq!(store.calls(), vec![StoreCall::GetInstance(app1())]);
        assert_eq!(reconciler.metrics().passes("error"), 1);
    }

    #[tokio::test]
    async fn test_instance_without_uid_is_permanent_error() {
        let store = MockResourceStore::new();
        store.add_instance(create_test_instance("demo", "app1", ""));
        let reconciler = create_test_reconciler(&store);

        let err = reconciler.reconcile(&app1()).await.unwrap_err();

        assert!(matches!(err, ControllerError::MalformedDesiredState(_)));
        assert!(!err.is_retryable());
        assert_eq!(store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_aborts_before_later_kinds() {
        let store = store_with(&[ResourceKind::Deployment]);
        store.fail_get(ResourceKind::Service, InjectedFailure::Unavailable);
        let reconciler = create_test_reconciler(&store);

        let err = reconciler.reconcile(&app1()).await.unwrap_err();

        match &err {
            ControllerError::LookupFailed { kind, name, .. } => {
                assert_eq!(*kind, ResourceKind::Service);
                assert_eq!(name, "demo/app1-service");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(err.is_retryable());
        assert!(
            !store
                .calls()
                .iter()
                .any(|c| matches!(c, StoreCall::Get(ResourceKind::Ingress, _)))
        );
        assert_eq!(
            reconciler.metrics().failures(ResourceKind::Service, FailurePhase::Lookup),
            1
        );
    }

    #[tokio::test]
    async fn test_rejected_create_is_not_retryable() {
        let store = store_with(&[ResourceKind::Deployment, ResourceKind::Service]);
        store.fail_create(ResourceKind::Ingress, InjectedFailure::Invalid);
        let reconciler = create_test_reconciler(&store);

        let err = reconciler.reconcile(&app1()).await.unwrap_err();

        assert!(matches!(err, ControllerError::CreateFailed { kind: ResourceKind::Ingress, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_create_conflict_ends_pass_with_requeue() {
        let store = store_with(&[]);
        store.fail_create(ResourceKind::Deployment, InjectedFailure::AlreadyExists);
        let reconciler = create_test_reconciler(&store);

        // A racing creator's Deployment ends this pass without touching the Service
        assert_eq!(reconciler.reconcile(&app1()).await.unwrap(), PassResult::Requeue);

        let creates: Vec<StoreCall> = store
            .calls()
            .into_iter()
            .filter(|c| matches!(c, StoreCall::Create(..)))
            .collect();
        assert_eq!(
            creates,
            vec![StoreCall::Create(ResourceKind::Deployment, dependent_key(ResourceKind::Deployment))]
        );
        assert!(store.resource(ResourceKind::Service, &dependent_key(ResourceKind::Service)).is_none());
        assert_eq!(reconciler.metrics().created(ResourceKind::Deployment), 0);

        // The next pass sees the Deployment as existing and moves on
        store.clear_failures();
        store.reset_calls();
        assert_eq!(reconciler.reconcile(&app1()).await.unwrap(), PassResult::Requeue);
        assert_eq!(
            store.calls(),
            vec![
                StoreCall::GetInstance(app1()),
                StoreCall::Get(ResourceKind::Deployment, dependent_key(ResourceKind::Deployment)),
                StoreCall::Get(ResourceKind::Service, dependent_key(ResourceKind::Service)),
                StoreCall::Create(ResourceKind::Service, dependent_key(ResourceKind::Service)),
            ]
        );
    }

    #[tokio::test]
    async fn test_hanging_store_hits_pass_deadline() {
        let store = store_with(&[ResourceKind::Deployment]);
        store.fail_create(ResourceKind::Service, InjectedFailure::Hang);
        let reconciler = create_test_reconciler_with(&store, Duration::from_millis(50), DriftPolicy::Ignore);

        let err = reconciler.reconcile(&app1()).await.unwrap_err();

        assert!(matches!(
            err,
            ControllerError::CreateFailed {
                kind: ResourceKind::Service,
                source: StoreError::Cancelled(_),
                ..
            }
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure_clears() {
        let store = store_with(&[]);
        store.fail_create(ResourceKind::Deployment, InjectedFailure::Unavailable);
        let reconciler = create_test_reconciler(&store);

        assert!(reconciler.reconcile(&app1()).await.is_err());

        store.clear_failures();
        assert_eq!(reconciler.reconcile(&app1()).await.unwrap(), PassResult::Requeue);
        assert_eq!(store.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_drift_is_reported_not_corrected() {
        let store = store_with(&[ResourceKind::Service, ResourceKind::Ingress]);
        let instance = create_test_instance("demo", "app1", "uid-app1");
        let mut drifted = DesiredState::for_instance(&instance)
            .unwrap()
            .resource(ResourceKind::Deployment)
            .clone();
        if let store_client::DependentResource::Deployment(d) = &mut drifted {
            d.metadata.labels = None;
        }
        store.add_resource(drifted.clone());
        let reconciler = create_test_reconciler_with(&store, Duration::from_secs(30), DriftPolicy::Report);

        assert_eq!(reconciler.reconcile(&app1()).await.unwrap(), PassResult::Done);

        assert_eq!(reconciler.metrics().drifted(ResourceKind::Deployment), 1);
        assert_eq!(
            store.resource(ResourceKind::Deployment, &dependent_key(ResourceKind::Deployment)),
            Some(drifted)
        );
        assert_eq!(store.mutation_count(), 0);
    }
}
