//! In-memory cluster client for testing
//!
//! Objects are kept per namespace and keyed by kind and name, so
//! submitting the same object twice updates it in place.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use shipyard_core::SELECTOR_LABEL;
use shipyard_transform::Resource;

use crate::client::ClusterClient;
use crate::error::{KubeError, Result};
use crate::resources::{OperationSummary, display_name};

/// namespace -> (kind, name) -> object
type Store = BTreeMap<String, BTreeMap<(String, String), Resource>>;

/// In-memory cluster for testing `up` and `down` without a cluster
#[derive(Clone, Default)]
pub struct MockClusterClient {
    store: Arc<RwLock<Store>>,
    operations: Arc<RwLock<OperationCounts>>,
    /// Kinds the mock refuses to create, as if the cluster did not serve them
    unknown_kinds: Arc<BTreeSet<String>>,
    unreachable: bool,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
}

impl MockClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse objects of `kind`, reporting them as failed
    pub fn without_kind(mut self, kind: impl Into<String>) -> Self {
        let mut kinds = (*self.unknown_kinds).clone();
        kinds.insert(kind.into());
        self.unknown_kinds = Arc::new(kinds);
        self
    }

    /// Fail every call with a connection error
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn operation_counts(&self) -> OperationCounts {
        self.operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Objects stored in `namespace`, ordered by kind then name
    pub fn objects(&self, namespace: &str) -> Vec<Resource> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(namespace)
            .map(|objects| objects.values().cloned().collect())
            .unwrap_or_default()
    }

    /// `(kind, name)` of every object stored in `namespace`
    pub fn object_keys(&self, namespace: &str) -> Vec<(String, String)> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(namespace)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable {
            return Err(KubeError::Connection("mock cluster is unreachable".to_string()));
        }
        Ok(())
    }

    fn record(&self, update: impl FnOnce(&mut OperationCounts)) {
        let mut counts = self
            .operations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        update(&mut counts);
    }
}

#[async_trait]
impl ClusterClient for MockClusterClient {
    async fn create_objects(
        &self,
        objects: &[Resource],
        namespace: &str,
    ) -> Result<OperationSummary> {
        self.check_reachable()?;
        let mut summary = OperationSummary::default();
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        let stored = store.entry(namespace.to_string()).or_default();

        for object in objects {
            let name = display_name(namespace, object.kind(), object.name());
            if self.unknown_kinds.contains(object.kind()) {
                let err = KubeError::UnknownKind {
                    api_version: object.api_version().to_string(),
                    kind: object.kind().to_string(),
                };
                summary.failed.push((name, err.to_string()));
                continue;
            }

            let key = (object.kind().to_string(), object.name().to_string());
            let created = stored.insert(key, object.clone()).is_none();
            if created {
                self.record(|c| c.creates += 1);
                summary.succeeded.push(format!("{} (created)", name));
            } else {
                self.record(|c| c.updates += 1);
                summary.succeeded.push(format!("{} (configured)", name));
            }
        }

        Ok(summary)
    }

    async fn delete_objects(
        &self,
        service_name: &str,
        namespace: &str,
    ) -> Result<OperationSummary> {
        self.check_reachable()?;
        let selector = shipyard_core::to_dns_label(service_name)?;
        let mut summary = OperationSummary::default();
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        let Some(stored) = store.get_mut(namespace) else {
            return Ok(summary);
        };

        let matching: Vec<(String, String)> = stored
            .iter()
            .filter(|(_, object)| {
                object
                    .labels()
                    .and_then(|labels| labels.get(SELECTOR_LABEL))
                    .is_some_and(|value| *value == selector)
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in matching {
            stored.remove(&key);
            self.record(|c| c.deletes += 1);
            summary
                .succeeded
                .push(format!("{} (deleted)", display_name(namespace, &key.0, &key.1)));
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::Service;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use shipyard_core::selector_labels;

    fn metadata(name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(selector_labels(name)),
            ..Default::default()
        }
    }

    fn objects(name: &str) -> Vec<Resource> {
        vec![
            Resource::Deployment(Deployment {
                metadata: metadata(name),
                ..Default::default()
            }),
            Resource::Service(Service {
                metadata: metadata(name),
                ..Default::default()
            }),
        ]
    }

    #[tokio::test]
    async fn test_create_and_update() {
        let client = MockClusterClient::new();
        let summary = client.create_objects(&objects("web"), "default").await.unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.succeeded.len(), 2);
        assert_eq!(summary.succeeded[0], "default/Deployment/web (created)");

        let summary = client.create_objects(&objects("web"), "default").await.unwrap();
        assert_eq!(summary.succeeded[1], "default/Service/web (configured)");

        let counts = client.operation_counts();
        assert_eq!(counts.creates, 2);
        assert_eq!(counts.updates, 2);
        assert_eq!(client.objects("default").len(), 2);
        assert!(client.objects("other").is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_service() {
        let client = MockClusterClient::new();
        client.create_objects(&objects("web"), "apps").await.unwrap();
        client.create_objects(&objects("db"), "apps").await.unwrap();

        let summary = client.delete_objects("web", "apps").await.unwrap();
        assert_eq!(summary.succeeded.len(), 2);
        assert_eq!(
            client.object_keys("apps"),
            vec![
                ("Deployment".to_string(), "db".to_string()),
                ("Service".to_string(), "db".to_string()),
            ]
        );

        // Deleting again is a no-op
        let summary = client.delete_objects("web", "apps").await.unwrap();
        assert_eq!(summary.total(), 0);
        assert_eq!(client.operation_counts().deletes, 2);
    }

    #[tokio::test]
    async fn test_unknown_kind_fails_object() {
        let client = MockClusterClient::new().without_kind("Service");
        let summary = client.create_objects(&objects("web"), "default").await.unwrap();
        assert!(!summary.is_success());
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.failed[0].1.contains("unknown resource type: v1/Service"));
        assert_eq!(client.object_keys("default").len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable() {
        let client = MockClusterClient::unreachable();
        let err = client.create_objects(&objects("web"), "default").await.unwrap_err();
        assert!(matches!(err, KubeError::Connection(_)));
        assert!(client.delete_objects("web", "default").await.is_err());
    }
}
