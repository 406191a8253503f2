//! What each target platform can express

use std::fmt;

use shipyard_core::{ControllerKind, ConvertOptions};

/// Target platform of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Kubernetes,
    OpenShift,
}

/// Per-platform feature table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub controllers: &'static [ControllerKind],
    /// Emit one image stream per image repository
    pub image_streams: bool,
    /// Controllers redeploy on image stream changes
    pub image_triggers: bool,
}

impl Capabilities {
    pub fn supports(&self, kind: ControllerKind) -> bool {
        self.controllers.contains(&kind)
    }
}

const KUBERNETES: Capabilities = Capabilities {
    controllers: &[
        ControllerKind::Deployment,
        ControllerKind::DaemonSet,
        ControllerKind::ReplicationController,
    ],
    image_streams: false,
    image_triggers: false,
};

const OPENSHIFT: Capabilities = Capabilities {
    controllers: &[
        ControllerKind::Deployment,
        ControllerKind::ReplicationController,
        ControllerKind::DeploymentConfig,
    ],
    image_streams: true,
    image_triggers: true,
};

impl Platform {
    /// A DeploymentConfig selection targets OpenShift
    pub fn for_options(options: &ConvertOptions) -> Self {
        if options.controllers.contains(&ControllerKind::DeploymentConfig) {
            Self::OpenShift
        } else {
            Self::Kubernetes
        }
    }

    pub fn capabilities(&self) -> &'static Capabilities {
        match self {
            Self::Kubernetes => &KUBERNETES,
            Self::OpenShift => &OPENSHIFT,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kubernetes => f.write_str("Kubernetes"),
            Self::OpenShift => f.write_str("OpenShift"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_selection() {
        assert_eq!(
            Platform::for_options(&ConvertOptions::default()),
            Platform::Kubernetes
        );
        let options = ConvertOptions::default().with_controller(ControllerKind::DeploymentConfig);
        assert_eq!(Platform::for_options(&options), Platform::OpenShift);
    }

    #[test]
    fn test_capability_table() {
        let k8s = Platform::Kubernetes.capabilities();
        assert!(k8s.supports(ControllerKind::DaemonSet));
        assert!(!k8s.supports(ControllerKind::DeploymentConfig));
        assert!(!k8s.image_streams);

        let openshift = Platform::OpenShift.capabilities();
        assert!(openshift.supports(ControllerKind::DeploymentConfig));
        assert!(!openshift.supports(ControllerKind::DaemonSet));
        assert!(openshift.image_streams && openshift.image_triggers);
    }
}
