//! OpenShift object builders

use shipyard_core::{Result, to_dns_label};

use crate::kubernetes::ServiceUnit;
use crate::objects::{
    DeploymentConfig, DeploymentConfigSpec, DeploymentStrategy, DeploymentTrigger, ImageStream,
    Resource,
};

/// Tag used when an image reference carries none
const DEFAULT_TAG: &str = "latest";

/// Image reference split into the parts an image stream needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry and path without tag or digest, the image stream identity
    pub repository: String,
    /// Image stream name, from the repository's last path segment
    pub stream: String,
    pub tag: String,
}

impl ImageReference {
    /// Parse `[registry[:port]/]path/name[:tag][@digest]`
    pub fn parse(image: &str) -> Result<Self> {
        let without_digest = image.split_once('@').map_or(image, |(name, _)| name);
        let last_segment_start = without_digest.rfind('/').map_or(0, |i| i + 1);
        let last_segment = &without_digest[last_segment_start..];

        let (name, tag) = match last_segment.split_once(':') {
            Some((name, tag)) if !tag.is_empty() => (name, tag),
            Some((name, _)) => (name, DEFAULT_TAG),
            None => (last_segment, DEFAULT_TAG),
        };

        Ok(Self {
            repository: format!("{}{}", &without_digest[..last_segment_start], name),
            stream: to_dns_label(name)?,
            tag: tag.to_string(),
        })
    }

    /// `<stream>:<tag>`, the ImageStreamTag name
    pub fn stream_tag(&self) -> String {
        format!("{}:{}", self.stream, self.tag)
    }
}

/// An image stream holding a tag for `image`
pub fn image_stream(unit: &ServiceUnit<'_>, reference: &ImageReference) -> Result<ImageStream> {
    let mut metadata = unit.metadata();
    metadata.name = Some(reference.stream.clone());
    metadata.annotations = None;

    let mut stream = ImageStream::new(metadata);
    stream.add_tag(&reference.tag, &unit.service.image)?;
    Ok(stream)
}

/// A DeploymentConfig redeploying on config and image changes
pub fn deployment_config(unit: &ServiceUnit<'_>, reference: Option<&ImageReference>) -> Resource {
    let mut triggers = vec![DeploymentTrigger::config_change()];
    if let Some(reference) = reference {
        triggers.push(DeploymentTrigger::image_change(
            &unit.name,
            reference.stream_tag(),
        ));
    }

    let strategy = if unit.has_claims() {
        DeploymentStrategy::recreate()
    } else {
        DeploymentStrategy::rolling()
    };

    Resource::DeploymentConfig(DeploymentConfig::new(
        unit.metadata(),
        DeploymentConfigSpec {
            replicas: unit.replicas,
            selector: unit.labels.clone(),
            template: unit.template.clone(),
            strategy,
            triggers,
        },
    ))
}
