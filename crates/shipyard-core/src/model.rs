//! Normalized application model
//!
//! Every loader produces an [`Application`] and every transformer consumes one.
//! Services live in a `BTreeMap`, so iteration is always sorted by name and
//! everything derived from the model is emitted in a stable order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{CoreError, Result};

/// Application name used when none can be derived from the input path
pub const DEFAULT_APP_NAME: &str = "shipyard";

/// A multi-service application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Application {
    /// Application (project) name
    pub name: String,

    /// Services keyed by name
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
}

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            services: BTreeMap::new(),
        }
    }

    /// Add a service, replacing any existing service with the same name
    pub fn with_service(mut self, name: impl Into<String>, service: ServiceConfig) -> Self {
        self.services.insert(name.into(), service);
        self
    }

    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.get(name)
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Check model invariants
    ///
    /// `source` names the input the model was loaded from and is used in
    /// error messages.
    pub fn validate(&self, source: &str) -> Result<()> {
        for (name, service) in &self.services {
            if service.image.trim().is_empty() {
                return Err(CoreError::schema(
                    source,
                    format!("service '{}' has no image", name),
                ));
            }

            for dependency in &service.depends_on {
                if !self.services.contains_key(dependency) {
                    return Err(CoreError::schema(
                        source,
                        format!(
                            "service '{}' depends on undefined service '{}'",
                            name, dependency
                        ),
                    ));
                }
            }

            let mut seen = BTreeSet::new();
            for env in &service.environment {
                if !seen.insert(env.name.as_str()) {
                    return Err(CoreError::schema(
                        source,
                        format!(
                            "service '{}' defines environment variable '{}' twice",
                            name, env.name
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Serialize the model to YAML
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Configuration of a single service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Container image reference
    pub image: String,

    pub ports: Vec<PortMapping>,

    /// Environment variables, names unique, declaration order kept
    pub environment: Vec<EnvVar>,

    pub volumes: Vec<VolumeMount>,

    /// Entrypoint override
    pub command: Vec<String>,

    /// Arguments passed to the entrypoint
    pub args: Vec<String>,

    pub working_dir: Option<String>,
    pub user: Option<String>,
    pub hostname: Option<String>,
    pub restart: Option<RestartPolicy>,
    pub resources: ResourceLimits,

    /// Services this service depends on (informational)
    pub depends_on: BTreeSet<String>,

    /// Replica count requested by the input file
    pub replicas: Option<u32>,

    pub labels: BTreeMap<String, String>,
    pub privileged: bool,
    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
    pub stdin_open: bool,
    pub tty: bool,
}

impl ServiceConfig {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    /// Set an environment variable, overriding an existing one in place
    pub fn set_env(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.environment.iter_mut().find(|e| e.name == name) {
            Some(existing) => existing.value = value,
            None => self.environment.push(EnvVar { name, value }),
        }
    }

    pub fn env(&self, name: &str) -> Option<&str> {
        self.environment
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value.as_str())
    }

    pub fn has_ports(&self) -> bool {
        !self.ports.is_empty()
    }
}

/// Transport protocol of a port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            _ => None,
        }
    }

    /// Protocol name as used by Kubernetes
    pub fn as_kube_str(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// An exposed container port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,

    /// Port published to the outside; `None` for expose-only ports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,

    #[serde(default)]
    pub protocol: Protocol,
}

impl PortMapping {
    pub fn new(container_port: u16) -> Self {
        Self {
            container_port,
            published: None,
            host_ip: None,
            protocol: Protocol::Tcp,
        }
    }

    pub fn published(mut self, port: u16) -> Self {
        self.published = Some(port);
        self
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Port the service object listens on
    pub fn service_port(&self) -> u16 {
        self.published.unwrap_or(self.container_port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Where the data of a volume mount comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "source", rename_all = "lowercase")]
pub enum VolumeSource {
    /// Container-only volume without a source
    Anonymous,
    /// Named volume
    Named(String),
    /// Path on the host
    Host(String),
}

impl VolumeSource {
    /// Whether the volume needs persistent storage
    pub fn needs_claim(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub source: VolumeSource,

    /// Path inside the container
    pub target: String,

    #[serde(default)]
    pub read_only: bool,
}

impl VolumeMount {
    pub fn anonymous(target: impl Into<String>) -> Self {
        Self {
            source: VolumeSource::Anonymous,
            target: target.into(),
            read_only: false,
        }
    }

    pub fn named(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: VolumeSource::Named(name.into()),
            target: target.into(),
            read_only: false,
        }
    }

    pub fn host(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: VolumeSource::Host(path.into()),
            target: target.into(),
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    Always,
    OnFailure,
    Never,
    UnlessStopped,
}

impl RestartPolicy {
    /// Parse a compose restart value (`no`, `always`, `on-failure[:N]`,
    /// `unless-stopped`) or a swarm restart condition (`none`, `any`,
    /// `on-failure`)
    pub fn parse(value: &str) -> Option<Self> {
        let base = value.split(':').next().unwrap_or(value).trim();
        match base {
            "always" | "any" => Some(Self::Always),
            "on-failure" => Some(Self::OnFailure),
            "no" | "none" | "never" => Some(Self::Never),
            "unless-stopped" => Some(Self::UnlessStopped),
            _ => None,
        }
    }

    /// Whether a long-running controller can honour this policy
    pub fn is_continuous(&self) -> bool {
        matches!(self, Self::Always | Self::UnlessStopped)
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Always => "always",
            Self::OnFailure => "on-failure",
            Self::Never => "no",
            Self::UnlessStopped => "unless-stopped",
        };
        f.write_str(s)
    }
}

/// Resource limits for a service's container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_bytes: Option<u64>,

    /// CPU limit as a decimal string (e.g. "0.5")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpus: Option<String>,
}

impl ResourceLimits {
    pub fn is_empty(&self) -> bool {
        self.memory_bytes.is_none() && self.cpus.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_services() -> Application {
        let mut web = ServiceConfig::new("nginx:latest");
        web.depends_on.insert("db".to_string());
        Application::new("demo")
            .with_service("web", web)
            .with_service("db", ServiceConfig::new("postgres:16"))
    }

    #[test]
    fn test_services_iterate_sorted() {
        let app = two_services();
        let names: Vec<&str> = app.service_names().collect();
        assert_eq!(names, vec!["db", "web"]);
    }

    #[test]
    fn test_validate_accepts_known_dependency() {
        assert!(two_services().validate("compose.yml").is_ok());
    }

    #[test]
    fn test_validate_rejects_dangling_dependency() {
        let mut app = two_services();
        app.services.remove("db");

        let err = app.validate("compose.yml").unwrap_err();
        assert!(matches!(err, CoreError::Schema { .. }));
        assert!(err.to_string().contains("undefined service 'db'"));
    }

    #[test]
    fn test_validate_rejects_missing_image() {
        let app = Application::new("demo").with_service("web", ServiceConfig::default());
        let err = app.validate("compose.yml").unwrap_err();
        assert!(err.to_string().contains("has no image"));
    }

    #[test]
    fn test_set_env_overrides_in_place() {
        let mut service = ServiceConfig::new("app");
        service.set_env("A", "1");
        service.set_env("B", "2");
        service.set_env("A", "3");

        assert_eq!(service.environment.len(), 2);
        assert_eq!(service.environment[0], EnvVar::new("A", "3"));
        assert_eq!(service.env("B"), Some("2"));
    }

    #[test]
    fn test_restart_policy_parse() {
        assert_eq!(RestartPolicy::parse("no"), Some(RestartPolicy::Never));
        assert_eq!(RestartPolicy::parse("on-failure:5"), Some(RestartPolicy::OnFailure));
        assert_eq!(RestartPolicy::parse("any"), Some(RestartPolicy::Always));
        assert_eq!(RestartPolicy::parse("sometimes"), None);
        assert!(RestartPolicy::UnlessStopped.is_continuous());
        assert!(!RestartPolicy::OnFailure.is_continuous());
    }

    #[test]
    fn test_service_port_defaults_to_container_port() {
        assert_eq!(PortMapping::new(8080).service_port(), 8080);
        assert_eq!(PortMapping::new(8080).published(80).service_port(), 80);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut app = two_services();
        if let Some(web) = app.services.get_mut("web") {
            web.ports.push(PortMapping::new(8080).published(80));
            web.volumes.push(VolumeMount::named("data", "/data").read_only());
            web.set_env("MODE", "prod");
        }

        let yaml = app.to_yaml().unwrap();
        let parsed: Application = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, app);
    }
}
