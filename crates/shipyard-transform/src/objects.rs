//! Platform objects emitted by the transformers
//!
//! Kubernetes objects use the `k8s-openapi` types. The two OpenShift kinds
//! (`DeploymentConfig` and `ImageStream`) are typed here.

use std::collections::BTreeMap;

use k8s_openapi::Metadata;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PodTemplateSpec, ReplicationController, Service,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use shipyard_core::{CoreError, Result};

/// A single object produced by a transformer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Resource {
    Deployment(Deployment),
    DaemonSet(DaemonSet),
    ReplicationController(ReplicationController),
    Service(Service),
    PersistentVolumeClaim(PersistentVolumeClaim),
    DeploymentConfig(DeploymentConfig),
    ImageStream(ImageStream),
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Deployment(_) => <Deployment as k8s_openapi::Resource>::KIND,
            Self::DaemonSet(_) => <DaemonSet as k8s_openapi::Resource>::KIND,
            Self::ReplicationController(_) => <ReplicationController as k8s_openapi::Resource>::KIND,
            Self::Service(_) => <Service as k8s_openapi::Resource>::KIND,
            Self::PersistentVolumeClaim(_) => <PersistentVolumeClaim as k8s_openapi::Resource>::KIND,
            Self::DeploymentConfig(_) => DeploymentConfig::KIND,
            Self::ImageStream(_) => ImageStream::KIND,
        }
    }

    pub fn api_version(&self) -> &'static str {
        match self {
            Self::Deployment(_) => <Deployment as k8s_openapi::Resource>::API_VERSION,
            Self::DaemonSet(_) => <DaemonSet as k8s_openapi::Resource>::API_VERSION,
            Self::ReplicationController(_) => {
                <ReplicationController as k8s_openapi::Resource>::API_VERSION
            }
            Self::Service(_) => <Service as k8s_openapi::Resource>::API_VERSION,
            Self::PersistentVolumeClaim(_) => {
                <PersistentVolumeClaim as k8s_openapi::Resource>::API_VERSION
            }
            Self::DeploymentConfig(_) => DeploymentConfig::API_VERSION,
            Self::ImageStream(_) => ImageStream::API_VERSION,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Deployment(o) => o.metadata(),
            Self::DaemonSet(o) => o.metadata(),
            Self::ReplicationController(o) => o.metadata(),
            Self::Service(o) => o.metadata(),
            Self::PersistentVolumeClaim(o) => o.metadata(),
            Self::DeploymentConfig(o) => &o.metadata,
            Self::ImageStream(o) => &o.metadata,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    pub fn labels(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata().labels.as_ref()
    }

    /// Whether this is a workload controller
    pub fn is_controller(&self) -> bool {
        matches!(
            self,
            Self::Deployment(_)
                | Self::DaemonSet(_)
                | Self::ReplicationController(_)
                | Self::DeploymentConfig(_)
        )
    }

    /// Base file name, `<name>-<kind>`
    pub fn file_stem(&self) -> String {
        format!("{}-{}", self.name(), self.kind().to_ascii_lowercase())
    }

    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

// =============================================================================
// DeploymentConfig
// =============================================================================

/// OpenShift DeploymentConfig
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfig {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: DeploymentConfigSpec,
}

impl DeploymentConfig {
    pub const API_VERSION: &'static str = "apps.openshift.io/v1";
    pub const KIND: &'static str = "DeploymentConfig";

    pub fn new(metadata: ObjectMeta, spec: DeploymentConfigSpec) -> Self {
        Self {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            metadata,
            spec,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfigSpec {
    pub replicas: i32,
    pub selector: BTreeMap<String, String>,
    pub template: PodTemplateSpec,
    pub strategy: DeploymentStrategy,
    pub triggers: Vec<DeploymentTrigger>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentStrategy {
    #[serde(rename = "type")]
    pub kind: String,
}

impl DeploymentStrategy {
    pub fn rolling() -> Self {
        Self {
            kind: "Rolling".to_string(),
        }
    }

    pub fn recreate() -> Self {
        Self {
            kind: "Recreate".to_string(),
        }
    }
}

/// Redeploy trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTrigger {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_change_params: Option<ImageChangeParams>,
}

impl DeploymentTrigger {
    pub fn config_change() -> Self {
        Self {
            kind: "ConfigChange".to_string(),
            image_change_params: None,
        }
    }

    /// Redeploy `container` when the image stream tag moves
    pub fn image_change(container: impl Into<String>, stream_tag: impl Into<String>) -> Self {
        Self {
            kind: "ImageChange".to_string(),
            image_change_params: Some(ImageChangeParams {
                automatic: true,
                container_names: vec![container.into()],
                from: ObjectReference::new("ImageStreamTag", stream_tag),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageChangeParams {
    pub automatic: bool,
    pub container_names: Vec<String>,
    pub from: ObjectReference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectReference {
    pub kind: String,
    pub name: String,
}

impl ObjectReference {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

// =============================================================================
// ImageStream
// =============================================================================

/// OpenShift ImageStream tracking one image repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStream {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ImageStreamSpec,
}

impl ImageStream {
    pub const API_VERSION: &'static str = "image.openshift.io/v1";
    pub const KIND: &'static str = "ImageStream";

    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            metadata,
            spec: ImageStreamSpec::default(),
        }
    }

    /// Add a tag pointing at `image`
    ///
    /// Adding the same tag for the same image again is a no-op. A tag that
    /// already points at another image is a validation error.
    pub fn add_tag(&mut self, tag: &str, image: &str) -> Result<()> {
        if let Some(existing) = self.spec.tags.iter().find(|t| t.name == tag) {
            if existing.from.name == image {
                return Ok(());
            }
            return Err(CoreError::validation(format!(
                "image stream '{}' tag '{}' already tracks '{}', cannot also track '{}'",
                self.metadata.name.as_deref().unwrap_or_default(),
                tag,
                existing.from.name,
                image
            )));
        }
        self.spec.tags.push(TagReference {
            name: tag.to_string(),
            from: ObjectReference::new("DockerImage", image),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageStreamSpec {
    pub tags: Vec<TagReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagReference {
    pub name: String,
    pub from: ObjectReference,
}
