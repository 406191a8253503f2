//! Submitting converted objects to a Kubernetes cluster
//!
//! - Creation uses Server-Side Apply, so `up` can be repeated
//! - Kinds are resolved through discovery; no compile-time type knowledge
//! - Deletion finds objects by the service selector label

use async_trait::async_trait;
use kube::{
    Client,
    api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PropagationPolicy},
    core::{GroupVersionKind, TypeMeta},
    discovery::{ApiCapabilities, ApiResource, Discovery, Scope},
};
use shipyard_core::{SELECTOR_LABEL, to_dns_label};
use shipyard_transform::Resource;

use crate::client::ClusterClient;
use crate::error::{KubeError, Result};

/// Field manager name for Server-Side Apply
pub const FIELD_MANAGER: &str = "shipyard";

/// Kinds removed by `down`, in deletion order
const DELETABLE_KINDS: &[(&str, &str, &str)] = &[
    ("apps.openshift.io", "v1", "DeploymentConfig"),
    ("apps", "v1", "Deployment"),
    ("apps", "v1", "DaemonSet"),
    ("", "v1", "ReplicationController"),
    ("", "v1", "Service"),
    ("", "v1", "PersistentVolumeClaim"),
    ("image.openshift.io", "v1", "ImageStream"),
];

/// Summary of create/delete operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationSummary {
    /// Successfully processed objects
    pub succeeded: Vec<String>,
    /// Failed objects with errors
    pub failed: Vec<(String, String)>,
    /// Skipped objects with the reason
    pub skipped: Vec<(String, String)>,
}

impl OperationSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    /// Merge another summary into this one
    pub fn extend(&mut self, other: OperationSummary) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
        self.skipped.extend(other.skipped);
    }

    /// Format as human-readable summary
    pub fn summary(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if !self.succeeded.is_empty() {
            parts.push(format!("{} succeeded", self.succeeded.len()));
        }
        if !self.failed.is_empty() {
            parts.push(format!("{} failed", self.failed.len()));
        }
        if !self.skipped.is_empty() {
            parts.push(format!("{} skipped", self.skipped.len()));
        }
        if parts.is_empty() {
            "No objects processed".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Display name used in summaries, `<namespace>/<Kind>/<name>`
pub fn display_name(namespace: &str, kind: &str, name: &str) -> String {
    format!("{}/{}/{}", namespace, kind, name)
}

/// Label selector matching every object of one service
pub fn service_selector(service_name: &str) -> Result<String> {
    Ok(format!("{}={}", SELECTOR_LABEL, to_dns_label(service_name)?))
}

/// Cluster client backed by the `kube` crate
pub struct KubeClusterClient {
    client: Client,
    discovery: Discovery,
}

impl KubeClusterClient {
    /// Connect using the default kubeconfig or in-cluster configuration
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| KubeError::Connection(e.to_string()))?;
        Self::new(client).await
    }

    pub async fn new(client: Client) -> Result<Self> {
        let discovery = Discovery::new(client.clone())
            .run()
            .await
            .map_err(KubeError::Api)?;
        Ok(Self { client, discovery })
    }

    fn resolve(&self, gvk: &GroupVersionKind) -> Option<(ApiResource, ApiCapabilities)> {
        self.discovery.resolve_gvk(gvk)
    }

    fn api(&self, resource: &ApiResource, caps: &ApiCapabilities, namespace: &str) -> Api<DynamicObject> {
        if caps.scope == Scope::Namespaced {
            Api::namespaced_with(self.client.clone(), namespace, resource)
        } else {
            Api::all_with(self.client.clone(), resource)
        }
    }

    async fn apply(&self, object: &Resource, namespace: &str) -> Result<bool> {
        let mut obj: DynamicObject = serde_json::from_value(object.to_value()?)?;
        let types = obj
            .types
            .clone()
            .ok_or_else(|| KubeError::InvalidObject("object has no apiVersion or kind".to_string()))?;
        let gvk = gvk_from_type_meta(&types);

        let (resource, caps) = self.resolve(&gvk).ok_or_else(|| KubeError::UnknownKind {
            api_version: types.api_version.clone(),
            kind: types.kind.clone(),
        })?;
        if caps.scope == Scope::Namespaced {
            obj.metadata.namespace = Some(namespace.to_string());
        }

        let name = object.name();
        let api = self.api(&resource, &caps, namespace);
        let exists = api.get_opt(name).await?.is_some();

        let mut params = PatchParams::apply(FIELD_MANAGER);
        params.force = true;
        api.patch(name, &params, &Patch::Apply(&obj)).await?;
        Ok(!exists)
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn create_objects(
        &self,
        objects: &[Resource],
        namespace: &str,
    ) -> Result<OperationSummary> {
        let mut summary = OperationSummary::default();

        for object in objects {
            let name = display_name(namespace, object.kind(), object.name());
            match self.apply(object, namespace).await {
                Ok(created) => {
                    let action = if created { "created" } else { "configured" };
                    tracing::info!("{} {}", name, action);
                    summary.succeeded.push(format!("{} ({})", name, action));
                }
                Err(e) => {
                    tracing::warn!("Failed to apply {}: {}", name, e);
                    summary.failed.push((name, e.to_string()));
                }
            }
        }

        Ok(summary)
    }

    async fn delete_objects(
        &self,
        service_name: &str,
        namespace: &str,
    ) -> Result<OperationSummary> {
        let selector = service_selector(service_name)?;
        let list_params = ListParams::default().labels(&selector);
        let delete_params = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Background),
            ..Default::default()
        };

        let mut summary = OperationSummary::default();
        for (group, version, kind) in DELETABLE_KINDS {
            let gvk = GroupVersionKind::gvk(group, version, kind);
            let Some((resource, caps)) = self.resolve(&gvk) else {
                tracing::debug!("{} is not served by this cluster, skipping", kind);
                continue;
            };

            let api = self.api(&resource, &caps, namespace);
            let found = api.list(&list_params).await?;
            for obj in found.items {
                let Some(name) = obj.metadata.name.as_deref() else {
                    continue;
                };
                let display = display_name(namespace, kind, name);
                match api.delete(name, &delete_params).await.map_err(KubeError::Api) {
                    Ok(_) => summary.succeeded.push(format!("{} (deleted)", display)),
                    Err(e) if e.is_not_found() => {
                        summary.skipped.push((display, "not found".to_string()))
                    }
                    Err(e) => summary.failed.push((display, e.to_string())),
                }
            }
        }

        if summary.total() == 0 {
            tracing::info!("No objects found for service {}", service_name);
        }
        Ok(summary)
    }
}

/// Convert TypeMeta to GroupVersionKind
///
/// - "apps/v1" -> group="apps", version="v1"
/// - "v1" -> group="", version="v1" (core API)
fn gvk_from_type_meta(tm: &TypeMeta) -> GroupVersionKind {
    let (group, version) = match tm.api_version.rsplit_once('/') {
        Some((g, v)) => (g.to_string(), v.to_string()),
        None => (String::new(), tm.api_version.clone()),
    };

    GroupVersionKind {
        group,
        version,
        kind: tm.kind.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gvk_from_type_meta() {
        let tm = TypeMeta {
            api_version: "apps.openshift.io/v1".to_string(),
            kind: "DeploymentConfig".to_string(),
        };
        let gvk = gvk_from_type_meta(&tm);
        assert_eq!(gvk.group, "apps.openshift.io");
        assert_eq!(gvk.version, "v1");
        assert_eq!(gvk.kind, "DeploymentConfig");

        let tm_core = TypeMeta {
            api_version: "v1".to_string(),
            kind: "Service".to_string(),
        };
        let gvk_core = gvk_from_type_meta(&tm_core);
        assert_eq!(gvk_core.group, "");
        assert_eq!(gvk_core.version, "v1");
    }

    #[test]
    fn test_service_selector() {
        assert_eq!(service_selector("web").unwrap(), "io.shipyard.service=web");
        assert_eq!(service_selector("My_Web").unwrap(), "io.shipyard.service=my-web");
        assert!(service_selector("__").is_err());
    }

    #[test]
    fn test_operation_summary() {
        let mut summary = OperationSummary::default();
        assert_eq!(summary.summary(), "No objects processed");

        summary.succeeded.push("default/Deployment/web".to_string());
        summary
            .skipped
            .push(("default/Service/web".to_string(), "not found".to_string()));
        assert!(summary.is_success());
        assert_eq!(summary.total(), 2);
        assert_eq!(summary.summary(), "1 succeeded, 1 skipped");

        let mut other = OperationSummary::default();
        other
            .failed
            .push(("default/Service/db".to_string(), "refused".to_string()));
        summary.extend(other);
        assert!(!summary.is_success());
        assert!(summary.summary().contains("1 failed"));
    }

    #[test]
    fn test_deletable_kinds_cover_emitted_kinds() {
        for kind in [
            "Deployment",
            "DaemonSet",
            "ReplicationController",
            "Service",
            "PersistentVolumeClaim",
            "DeploymentConfig",
            "ImageStream",
        ] {
            assert!(DELETABLE_KINDS.iter().any(|(_, _, k)| *k == kind), "{}", kind);
        }
    }

    #[test]
    fn test_field_manager_constant() {
        assert_eq!(FIELD_MANAGER, "shipyard");
    }
}
