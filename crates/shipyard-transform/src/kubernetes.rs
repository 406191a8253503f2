//! Kubernetes object builders
//!
//! A [`ServiceUnit`] holds everything derived from one service (canonical
//! name, selector labels, pod template and claims). Controllers, the
//! Service and the claims are all built from it so they agree on labels.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::apps::v1::{
    DaemonSet, DaemonSetSpec, Deployment, DeploymentSpec, DeploymentStrategy,
};
use k8s_openapi::api::core::v1::{
    Capabilities as LinuxCapabilities, Container, ContainerPort, EmptyDirVolumeSource, EnvVar,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, PodSpec,
    PodTemplateSpec, ReplicationController, ReplicationControllerSpec, ResourceRequirements,
    SecurityContext, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use once_cell::sync::Lazy;
use regex::Regex;

use shipyard_core::{
    ControllerKind, ConversionWarning, ConvertOptions, MAX_NAME_LENGTH, Result, ServiceConfig,
    Warnings, selector_labels,
};

use crate::objects::Resource;

/// Service label selecting the Service type
pub const SERVICE_TYPE_LABEL: &str = "shipyard.service.type";

/// Storage requested by every generated claim
pub const DEFAULT_CLAIM_SIZE: &str = "100Mi";

static DNS_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("hostname pattern is valid")
});

/// A claim backing one named or host volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub name: String,
    pub read_only: bool,
}

/// Everything derived from one service
#[derive(Debug, Clone)]
pub struct ServiceUnit<'a> {
    /// Canonical object name
    pub name: String,
    pub service: &'a ServiceConfig,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub replicas: i32,
    pub template: PodTemplateSpec,
    pub claims: Vec<Claim>,
}

impl<'a> ServiceUnit<'a> {
    pub fn new(
        name: String,
        service: &'a ServiceConfig,
        options: &ConvertOptions,
        warnings: &mut Warnings,
    ) -> Result<Self> {
        let labels = selector_labels(&name);
        let annotations: BTreeMap<String, String> = service
            .labels
            .iter()
            .filter(|(k, _)| k.as_str() != SERVICE_TYPE_LABEL)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if let Some(restart) = service.restart
            && !restart.is_continuous()
        {
            warnings.warn(ConversionWarning::for_service(
                &name,
                "restart",
                format!(
                    "restart policy '{}' cannot be expressed on a controller, pods always restart",
                    restart
                ),
            ))?;
        }

        let mut volumes = Vec::new();
        let mut mounts = Vec::new();
        let mut claims = Vec::new();
        let mut empty_dirs = 0;
        for mount in &service.volumes {
            let volume_name = if mount.source.needs_claim() {
                let claim = suffixed(&name, &format!("-claim{}", claims.len()));
                volumes.push(Volume {
                    name: claim.clone(),
                    persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                        claim_name: claim.clone(),
                        read_only: mount.read_only.then_some(true),
                    }),
                    ..Default::default()
                });
                claims.push(Claim {
                    name: claim.clone(),
                    read_only: mount.read_only,
                });
                claim
            } else {
                let empty = suffixed(&name, &format!("-empty{}", empty_dirs));
                empty_dirs += 1;
                volumes.push(Volume {
                    name: empty.clone(),
                    empty_dir: Some(EmptyDirVolumeSource::default()),
                    ..Default::default()
                });
                empty
            };
            mounts.push(VolumeMount {
                name: volume_name,
                mount_path: mount.target.clone(),
                read_only: mount.read_only.then_some(true),
                ..Default::default()
            });
        }

        let container = Container {
            name: name.clone(),
            image: Some(service.image.clone()),
            ports: non_empty(container_ports(service)),
            env: non_empty(
                service
                    .environment
                    .iter()
                    .map(|e| EnvVar {
                        name: e.name.clone(),
                        value: Some(e.value.clone()),
                        ..Default::default()
                    })
                    .collect(),
            ),
            volume_mounts: non_empty(mounts),
            command: non_empty(service.command.clone()),
            args: non_empty(service.args.clone()),
            working_dir: service.working_dir.clone(),
            resources: resource_requirements(service),
            security_context: security_context(&name, service, warnings)?,
            stdin: service.stdin_open.then_some(true),
            tty: service.tty.then_some(true),
            ..Default::default()
        };

        let hostname = match &service.hostname {
            Some(hostname) if DNS_LABEL.is_match(hostname) => Some(hostname.clone()),
            Some(hostname) => {
                warnings.warn(ConversionWarning::for_service(
                    &name,
                    "hostname",
                    format!("'{}' is not a valid DNS label, ignored", hostname),
                ))?;
                None
            }
            None => None,
        };

        let template = PodTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(labels.clone()),
                ..Default::default()
            }),
            spec: Some(PodSpec {
                containers: vec![container],
                volumes: non_empty(volumes),
                hostname,
                restart_policy: Some("Always".to_string()),
                ..Default::default()
            }),
        };

        Ok(Self {
            replicas: options.replicas_for(service.replicas),
            name,
            service,
            labels,
            annotations,
            template,
            claims,
        })
    }

    /// Metadata shared by every object of this service
    pub fn metadata(&self) -> ObjectMeta {
        self.metadata_named(&self.name)
    }

    fn metadata_named(&self, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(self.labels.clone()),
            annotations: non_empty_map(self.annotations.clone()),
            ..Default::default()
        }
    }

    /// Controllers whose pods write to claims are replaced, not rolled
    pub fn has_claims(&self) -> bool {
        !self.claims.is_empty()
    }

    /// Build a Kubernetes controller; `None` for platform-specific kinds
    pub fn controller(&self, kind: ControllerKind) -> Option<Resource> {
        let selector = LabelSelector {
            match_labels: Some(self.labels.clone()),
            ..Default::default()
        };

        match kind {
            ControllerKind::Deployment => Some(Resource::Deployment(Deployment {
                metadata: self.metadata(),
                spec: Some(DeploymentSpec {
                    replicas: Some(self.replicas),
                    selector,
                    template: self.template.clone(),
                    strategy: self.has_claims().then(|| DeploymentStrategy {
                        type_: Some("Recreate".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            })),
            ControllerKind::DaemonSet => Some(Resource::DaemonSet(DaemonSet {
                metadata: self.metadata(),
                spec: Some(DaemonSetSpec {
                    selector,
                    template: self.template.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            })),
            ControllerKind::ReplicationController => {
                Some(Resource::ReplicationController(ReplicationController {
                    metadata: self.metadata(),
                    spec: Some(ReplicationControllerSpec {
                        replicas: Some(self.replicas),
                        selector: Some(self.labels.clone()),
                        template: Some(self.template.clone()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }))
            }
            ControllerKind::DeploymentConfig => None,
        }
    }

    /// The Service exposing this unit's ports, if it has any
    pub fn service_object(&self, warnings: &mut Warnings) -> Result<Option<Resource>> {
        if !self.service.has_ports() {
            return Ok(None);
        }

        let mut seen = BTreeSet::new();
        let mut ports = Vec::new();
        for mapping in &self.service.ports {
            let port = mapping.service_port();
            if !seen.insert((port, mapping.protocol)) {
                warnings.warn(ConversionWarning::for_service(
                    &self.name,
                    "ports",
                    format!("port {}/{} is declared twice, keeping the first", port, mapping.protocol),
                ))?;
                continue;
            }
            ports.push(ServicePort {
                name: Some(format!("{}-{}", port, mapping.protocol)),
                port: i32::from(port),
                target_port: Some(IntOrString::Int(i32::from(mapping.container_port))),
                protocol: Some(mapping.protocol.as_kube_str().to_string()),
                ..Default::default()
            });
        }

        let (service_type, cluster_ip) = self.service_type(warnings)?;
        Ok(Some(Resource::Service(Service {
            metadata: self.metadata(),
            spec: Some(ServiceSpec {
                selector: Some(self.labels.clone()),
                ports: Some(ports),
                type_: Some(service_type.to_string()),
                cluster_ip: cluster_ip.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        })))
    }

    fn service_type(&self, warnings: &mut Warnings) -> Result<(&'static str, Option<&'static str>)> {
        let Some(value) = self.service.labels.get(SERVICE_TYPE_LABEL) else {
            return Ok(("ClusterIP", None));
        };

        let resolved = match value.to_ascii_lowercase().as_str() {
            "clusterip" => ("ClusterIP", None),
            "nodeport" => ("NodePort", None),
            "loadbalancer" => ("LoadBalancer", None),
            "headless" => ("ClusterIP", Some("None")),
            _ => {
                warnings.warn(
                    ConversionWarning::for_service(
                        &self.name,
                        SERVICE_TYPE_LABEL,
                        format!("unknown service type '{}', using ClusterIP", value),
                    )
                    .with_suggestion("use clusterip, nodeport, loadbalancer or headless"),
                )?;
                ("ClusterIP", None)
            }
        };
        Ok(resolved)
    }

    /// One claim per named or host volume
    pub fn claim_objects(&self) -> Vec<Resource> {
        self.claims
            .iter()
            .map(|claim| {
                let access_mode = if claim.read_only {
                    "ReadOnlyMany"
                } else {
                    "ReadWriteOnce"
                };
                Resource::PersistentVolumeClaim(PersistentVolumeClaim {
                    metadata: ObjectMeta {
                        name: Some(claim.name.clone()),
                        labels: Some(self.labels.clone()),
                        ..Default::default()
                    },
                    spec: Some(PersistentVolumeClaimSpec {
                        access_modes: Some(vec![access_mode.to_string()]),
                        resources: Some(VolumeResourceRequirements {
                            requests: Some(BTreeMap::from([(
                                "storage".to_string(),
                                Quantity(DEFAULT_CLAIM_SIZE.to_string()),
                            )])),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                })
            })
            .collect()
    }
}

fn container_ports(service: &ServiceConfig) -> Vec<ContainerPort> {
    let mut seen = BTreeSet::new();
    service
        .ports
        .iter()
        .filter(|p| seen.insert((p.container_port, p.protocol)))
        .map(|p| ContainerPort {
            container_port: i32::from(p.container_port),
            protocol: Some(p.protocol.as_kube_str().to_string()),
            ..Default::default()
        })
        .collect()
}

fn resource_requirements(service: &ServiceConfig) -> Option<ResourceRequirements> {
    if service.resources.is_empty() {
        return None;
    }

    let mut limits = BTreeMap::new();
    if let Some(bytes) = service.resources.memory_bytes {
        limits.insert("memory".to_string(), Quantity(bytes.to_string()));
    }
    if let Some(cpus) = &service.resources.cpus {
        limits.insert("cpu".to_string(), Quantity(cpus.clone()));
    }
    Some(ResourceRequirements {
        limits: Some(limits),
        ..Default::default()
    })
}

fn security_context(
    name: &str,
    service: &ServiceConfig,
    warnings: &mut Warnings,
) -> Result<Option<SecurityContext>> {
    let mut context = SecurityContext {
        privileged: service.privileged.then_some(true),
        ..Default::default()
    };

    if !service.cap_add.is_empty() || !service.cap_drop.is_empty() {
        context.capabilities = Some(LinuxCapabilities {
            add: non_empty(service.cap_add.clone()),
            drop: non_empty(service.cap_drop.clone()),
        });
    }

    if let Some(user) = &service.user {
        let (uid, gid) = match user.split_once(':') {
            Some((uid, gid)) => (uid, Some(gid)),
            None => (user.as_str(), None),
        };
        match (uid.parse::<i64>(), gid.map(str::parse::<i64>).transpose()) {
            (Ok(uid), Ok(gid)) => {
                context.run_as_user = Some(uid);
                context.run_as_group = gid;
            }
            _ => warnings.warn(ConversionWarning::for_service(
                name,
                "user",
                format!("'{}' is not a numeric uid[:gid], ignored", user),
            ))?,
        }
    }

    Ok((context != SecurityContext::default()).then_some(context))
}

/// Append `suffix` to `name`, shortening `name` to stay a valid label
pub(crate) fn suffixed(name: &str, suffix: &str) -> String {
    let keep = MAX_NAME_LENGTH.saturating_sub(suffix.len()).min(name.len());
    format!("{}{}", name[..keep].trim_end_matches('-'), suffix)
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

fn non_empty_map(map: BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    (!map.is_empty()).then_some(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipyard_core::{PortMapping, Protocol, RestartPolicy, VolumeMount as Mount, WarningPolicy};

    fn unit<'a>(service: &'a ServiceConfig, warnings: &mut Warnings) -> ServiceUnit<'a> {
        ServiceUnit::new("web".to_string(), service, &ConvertOptions::default(), warnings).unwrap()
    }

    fn spec(resource: &Resource) -> serde_json::Value {
        resource.to_value().unwrap()["spec"].clone()
    }

    #[test]
    fn test_container_fields() {
        let mut service = ServiceConfig::new("nginx:latest");
        service.ports.push(PortMapping::new(8080).published(80));
        service.set_env("MODE", "prod");
        service.args = vec!["serve".to_string()];
        service.resources.memory_bytes = Some(1024);
        service.resources.cpus = Some("0.5".to_string());
        service.privileged = true;
        service.user = Some("1000:2000".to_string());
        service.tty = true;

        let mut warnings = Warnings::default();
        let unit = unit(&service, &mut warnings);
        let deployment = unit.controller(ControllerKind::Deployment).unwrap();
        let container = &spec(&deployment)["template"]["spec"]["containers"][0];

        assert_eq!(container["name"], "web");
        assert_eq!(container["image"], "nginx:latest");
        assert_eq!(container["ports"][0]["containerPort"], 8080);
        assert_eq!(container["env"][0]["name"], "MODE");
        assert_eq!(container["args"][0], "serve");
        assert_eq!(container["resources"]["limits"]["memory"], "1024");
        assert_eq!(container["resources"]["limits"]["cpu"], "0.5");
        assert_eq!(container["securityContext"]["privileged"], true);
        assert_eq!(container["securityContext"]["runAsUser"], 1000);
        assert_eq!(container["securityContext"]["runAsGroup"], 2000);
        assert_eq!(container["tty"], true);
        assert!(container.get("stdin").is_none());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_volumes_and_claims() {
        let mut service = ServiceConfig::new("postgres");
        service.volumes = vec![
            Mount::named("data", "/var/lib/postgresql/data"),
            Mount::anonymous("/tmp"),
            Mount::host("./conf", "/etc/conf").read_only(),
        ];

        let mut warnings = Warnings::default();
        let unit = unit(&service, &mut warnings);
        assert_eq!(
            unit.claims,
            vec![
                Claim { name: "web-claim0".to_string(), read_only: false },
                Claim { name: "web-claim1".to_string(), read_only: true },
            ]
        );

        let claims = unit.claim_objects();
        assert_eq!(claims.len(), 2);
        assert_eq!(spec(&claims[0])["accessModes"][0], "ReadWriteOnce");
        assert_eq!(spec(&claims[1])["accessModes"][0], "ReadOnlyMany");
        assert_eq!(spec(&claims[0])["resources"]["requests"]["storage"], "100Mi");

        let deployment = unit.controller(ControllerKind::Deployment).unwrap();
        let pod = &spec(&deployment)["template"]["spec"];
        assert_eq!(pod["volumes"][1]["name"], "web-empty0");
        assert!(pod["volumes"][1]["emptyDir"].is_object());
        assert_eq!(pod["containers"][0]["volumeMounts"][2]["readOnly"], true);
        assert_eq!(spec(&deployment)["strategy"]["type"], "Recreate");
    }

    #[test]
    fn test_service_ports_and_dedup() {
        let mut service = ServiceConfig::new("dns");
        service.ports = vec![
            PortMapping::new(53).published(5353).protocol(Protocol::Udp),
            PortMapping::new(53).published(5353).protocol(Protocol::Udp),
            PortMapping::new(8080),
        ];

        let mut warnings = Warnings::default();
        let unit = unit(&service, &mut warnings);
        let svc = unit.service_object(&mut warnings).unwrap().unwrap();
        let ports = &spec(&svc)["ports"];

        assert_eq!(ports.as_array().unwrap().len(), 2);
        assert_eq!(ports[0]["name"], "5353-udp");
        assert_eq!(ports[0]["port"], 5353);
        assert_eq!(ports[0]["targetPort"], 53);
        assert_eq!(ports[0]["protocol"], "UDP");
        assert_eq!(ports[1]["name"], "8080-tcp");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_service_type_label() {
        let mut service = ServiceConfig::new("nginx");
        service.ports.push(PortMapping::new(80));
        service
            .labels
            .insert(SERVICE_TYPE_LABEL.to_string(), "headless".to_string());

        let mut warnings = Warnings::default();
        let unit = unit(&service, &mut warnings);
        let svc = unit.service_object(&mut warnings).unwrap().unwrap();
        assert_eq!(spec(&svc)["clusterIP"], "None");
        assert!(unit.annotations.is_empty());

        service
            .labels
            .insert(SERVICE_TYPE_LABEL.to_string(), "ingress".to_string());
        let unit = ServiceUnit::new(
            "web".to_string(),
            &service,
            &ConvertOptions::default(),
            &mut warnings,
        )
        .unwrap();
        let svc = unit.service_object(&mut warnings).unwrap().unwrap();
        assert_eq!(spec(&svc)["type"], "ClusterIP");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_no_ports_no_service() {
        let service = ServiceConfig::new("worker");
        let mut warnings = Warnings::default();
        assert!(unit(&service, &mut warnings).service_object(&mut warnings).unwrap().is_none());
    }

    #[test]
    fn test_unexpressible_fields_warn() {
        let mut service = ServiceConfig::new("job");
        service.restart = Some(RestartPolicy::Never);
        service.user = Some("www-data".to_string());
        service.hostname = Some("Not_Valid".to_string());

        let mut warnings = Warnings::default();
        let unit = unit(&service, &mut warnings);
        let fields: Vec<&str> = warnings.iter().map(|w| w.field.as_str()).collect();
        assert_eq!(fields, vec!["restart", "user", "hostname"]);

        let deployment = unit.controller(ControllerKind::Deployment).unwrap();
        assert_eq!(spec(&deployment)["template"]["spec"]["restartPolicy"], "Always");
    }

    #[test]
    fn test_escalated_warning_aborts() {
        let mut service = ServiceConfig::new("job");
        service.restart = Some(RestartPolicy::OnFailure);
        let mut warnings = Warnings::new(WarningPolicy::Escalate);
        assert!(
            ServiceUnit::new("job".to_string(), &service, &ConvertOptions::default(), &mut warnings)
                .is_err()
        );
    }

    #[test]
    fn test_suffixed_stays_within_limit() {
        let long = "a".repeat(63);
        let name = suffixed(&long, "-claim0");
        assert_eq!(name.len(), 63);
        assert!(name.ends_with("-claim0"));
        assert_eq!(suffixed("web", "-claim1"), "web-claim1");
    }
}
