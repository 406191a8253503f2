//! Shipyard Transform - Application model to platform objects
//!
//! - [`Transformer`]: maps an [`Application`] and [`ConvertOptions`] to
//!   Kubernetes or OpenShift objects
//! - [`output`]: serializes objects to stdout or files
//! - [`chart`]: packages objects as a Helm chart

pub mod capability;
pub mod chart;
pub mod kubernetes;
pub mod objects;
pub mod openshift;
pub mod output;

use std::collections::{BTreeMap, BTreeSet};

use shipyard_core::{
    Application, ControllerKind, ConversionWarning, ConvertOptions, CoreError, MAX_NAME_LENGTH,
    Result, Warnings, to_dns_label,
};

pub use capability::{Capabilities, Platform};
pub use chart::Chart;
pub use kubernetes::{DEFAULT_CLAIM_SIZE, SERVICE_TYPE_LABEL, ServiceUnit};
pub use objects::Resource;
pub use openshift::ImageReference;

/// Target platform transformer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transformer {
    Kubernetes,
    OpenShift,
}

impl Transformer {
    /// OpenShift when a DeploymentConfig is requested, Kubernetes otherwise
    pub fn for_options(options: &ConvertOptions) -> Self {
        match Platform::for_options(options) {
            Platform::Kubernetes => Self::Kubernetes,
            Platform::OpenShift => Self::OpenShift,
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            Self::Kubernetes => Platform::Kubernetes,
            Self::OpenShift => Platform::OpenShift,
        }
    }

    /// Map `app` to platform objects
    ///
    /// Services are processed in name order. Per service the order is
    /// image stream (OpenShift), controllers, Service, claims. Nothing is
    /// returned unless every service converted.
    pub fn transform(
        &self,
        app: &Application,
        options: &ConvertOptions,
        warnings: &mut Warnings,
    ) -> Result<Vec<Resource>> {
        let platform = self.platform();
        let capabilities = platform.capabilities();
        let controllers = options.effective_controllers();

        if let Some(kind) = controllers.iter().find(|k| !capabilities.supports(**k)) {
            return Err(CoreError::validation(format!(
                "{} is not supported by the {} transformer",
                kind, platform
            )));
        }

        let names = canonical_names(app)?;
        let mut objects = Vec::new();
        let mut streams = StreamRegistry::default();

        for ((service_name, service), name) in app.services.iter().zip(names) {
            tracing::debug!("Transforming service {} as {}", service_name, name);
            let unit = ServiceUnit::new(name, service, options, warnings)?;

            let reference = if capabilities.image_streams {
                let mut reference = ImageReference::parse(&service.image)?;
                match streams.get(&reference.repository) {
                    Some((index, stream_name)) => {
                        reference.stream = stream_name.to_string();
                        if let Resource::ImageStream(stream) = &mut objects[index] {
                            stream.add_tag(&reference.tag, &service.image)?;
                        }
                    }
                    None => {
                        let stream_name = streams.claim(&reference, objects.len())?;
                        if stream_name != reference.stream {
                            warnings.warn(ConversionWarning::for_service(
                                service_name,
                                "image",
                                format!(
                                    "image stream '{}' is taken by another repository, using '{}' for {}",
                                    reference.stream, stream_name, reference.repository
                                ),
                            ))?;
                            reference.stream = stream_name;
                        }
                        objects.push(Resource::ImageStream(openshift::image_stream(
                            &unit, &reference,
                        )?));
                    }
                }
                Some(reference)
            } else {
                None
            };

            for kind in &controllers {
                let controller = match kind {
                    ControllerKind::DeploymentConfig => openshift::deployment_config(
                        &unit,
                        reference.as_ref().filter(|_| capabilities.image_triggers),
                    ),
                    kind => match unit.controller(*kind) {
                        Some(controller) => controller,
                        None => continue,
                    },
                };
                objects.push(controller);
            }

            if let Some(service) = unit.service_object(warnings)? {
                objects.push(service);
            }
            objects.extend(unit.claim_objects());
        }

        Ok(objects)
    }
}

/// Image streams emitted so far, keyed by image repository
#[derive(Debug, Default)]
struct StreamRegistry {
    /// Repository -> (index in the object list, stream name)
    by_repository: BTreeMap<String, (usize, String)>,
    names: BTreeSet<String>,
}

impl StreamRegistry {
    fn get(&self, repository: &str) -> Option<(usize, &str)> {
        self.by_repository
            .get(repository)
            .map(|(index, name)| (*index, name.as_str()))
    }

    /// Register a new repository, suffixing the stream name while it is taken
    fn claim(&mut self, reference: &ImageReference, index: usize) -> Result<String> {
        let mut name = reference.stream.clone();
        let mut suffix = 2;
        while self.names.contains(&name) {
            let suffix_text = format!("-{}", suffix);
            let keep = reference.stream.len().min(MAX_NAME_LENGTH - suffix_text.len());
            name = to_dns_label(&format!("{}{}", &reference.stream[..keep], suffix_text))?;
            suffix += 1;
        }
        self.names.insert(name.clone());
        self.by_repository
            .insert(reference.repository.clone(), (index, name.clone()));
        Ok(name)
    }
}

/// Canonical object names in service order, rejecting collisions
fn canonical_names(app: &Application) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(app.len());
    let mut owners: BTreeMap<String, &str> = BTreeMap::new();

    for service_name in app.service_names() {
        let name = to_dns_label(service_name)?;
        if let Some(other) = owners.insert(name.clone(), service_name) {
            return Err(CoreError::validation(format!(
                "services '{}' and '{}' both map to the object name '{}'",
                other, service_name, name
            )));
        }
        names.push(name);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipyard_core::{
        OutputFormat, PortMapping, SELECTOR_LABEL, ServiceConfig, VolumeMount, WarningPolicy,
    };

    fn web_app() -> Application {
        let mut web = ServiceConfig::new("nginx:latest");
        web.ports.push(PortMapping::new(8080).published(80));
        Application::new("demo").with_service("web", web)
    }

    fn transform(app: &Application, options: &ConvertOptions) -> Result<Vec<Resource>> {
        let mut warnings = Warnings::new(WarningPolicy::Report);
        Transformer::for_options(options).transform(app, options, &mut warnings)
    }

    #[test]
    fn test_web_scenario() {
        let objects = transform(&web_app(), &ConvertOptions::default()).unwrap();
        assert_eq!(objects.len(), 2);

        let deployment = objects[0].to_value().unwrap();
        assert_eq!(deployment["kind"], "Deployment");
        assert_eq!(deployment["spec"]["replicas"], 1);
        assert_eq!(
            deployment["spec"]["template"]["spec"]["containers"][0]["ports"][0]["containerPort"],
            8080
        );

        let service = objects[1].to_value().unwrap();
        assert_eq!(service["kind"], "Service");
        assert_eq!(service["spec"]["ports"][0]["port"], 80);
        assert_eq!(service["spec"]["ports"][0]["targetPort"], 8080);

        assert_eq!(
            deployment["spec"]["selector"]["matchLabels"][SELECTOR_LABEL],
            "web"
        );
        assert_eq!(service["spec"]["selector"][SELECTOR_LABEL], "web");
        assert_eq!(objects[0].labels(), objects[1].labels());
    }

    #[test]
    fn test_depends_on_does_not_alter_output() {
        let mut web = ServiceConfig::new("nginx");
        web.ports.push(PortMapping::new(80));
        let mut db = ServiceConfig::new("postgres");
        db.ports.push(PortMapping::new(5432));

        let independent = Application::new("demo")
            .with_service("web", web.clone())
            .with_service("db", db.clone());
        web.depends_on.insert("db".to_string());
        let dependent = Application::new("demo")
            .with_service("web", web)
            .with_service("db", db);

        let options = ConvertOptions::default();
        let with_dep = transform(&dependent, &options).unwrap();
        assert_eq!(with_dep, transform(&independent, &options).unwrap());

        let kinds: Vec<(&str, &str)> = with_dep.iter().map(|o| (o.name(), o.kind())).collect();
        assert_eq!(
            kinds,
            vec![
                ("db", "Deployment"),
                ("db", "Service"),
                ("web", "Deployment"),
                ("web", "Service"),
            ]
        );
    }

    #[test]
    fn test_deterministic_output() {
        let mut app = web_app();
        let mut db = ServiceConfig::new("postgres");
        db.set_env("B", "2");
        db.set_env("A", "1");
        db.volumes.push(VolumeMount::named("data", "/data"));
        app.services.insert("db".to_string(), db);

        let options = ConvertOptions::default();
        let first = output::render(&transform(&app, &options).unwrap(), OutputFormat::Yaml).unwrap();
        let second = output::render(&transform(&app, &options).unwrap(), OutputFormat::Yaml).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_one_controller_per_service_by_default() {
        let app = Application::new("demo")
            .with_service("a", ServiceConfig::new("x"))
            .with_service("b", ServiceConfig::new("y"))
            .with_service("c", ServiceConfig::new("z"));
        let objects = transform(&app, &ConvertOptions::default()).unwrap();
        assert_eq!(objects.iter().filter(|o| o.is_controller()).count(), 3);
    }

    #[test]
    fn test_replicas_zero_and_hint() {
        let mut app = web_app();
        app.services.get_mut("web").unwrap().replicas = Some(3);

        let objects = transform(&app, &ConvertOptions::default()).unwrap();
        assert_eq!(objects[0].to_value().unwrap()["spec"]["replicas"], 3);

        let objects = transform(&app, &ConvertOptions::default().with_replicas(0)).unwrap();
        assert_eq!(objects[0].to_value().unwrap()["spec"]["replicas"], 0);
    }

    #[test]
    fn test_multiple_controller_kinds() {
        let options = ConvertOptions::default()
            .with_controller(ControllerKind::DaemonSet)
            .with_controller(ControllerKind::ReplicationController);
        let objects = transform(&web_app(), &options).unwrap();
        let kinds: Vec<&str> = objects.iter().map(Resource::kind).collect();
        assert_eq!(kinds, vec!["DaemonSet", "ReplicationController", "Service"]);
        assert!(objects[0].to_value().unwrap()["spec"].get("replicas").is_none());
    }

    #[test]
    fn test_unsupported_controller_is_validation_error() {
        let options = ConvertOptions::default().with_controller(ControllerKind::DeploymentConfig);
        let mut warnings = Warnings::default();
        let err = Transformer::Kubernetes
            .transform(&web_app(), &options, &mut warnings)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));

        let options = options.with_controller(ControllerKind::DaemonSet);
        let err = transform(&web_app(), &options).unwrap_err();
        assert!(err.to_string().contains("DaemonSet is not supported by the OpenShift"));
    }

    #[test]
    fn test_openshift_image_streams() {
        let app = Application::new("demo")
            .with_service("api", ServiceConfig::new("registry.local/team/app:v1"))
            .with_service("worker", ServiceConfig::new("registry.local/team/app:v2"))
            .with_service("web", ServiceConfig::new("nginx"));
        let options = ConvertOptions::default().with_controller(ControllerKind::DeploymentConfig);
        assert_eq!(Transformer::for_options(&options), Transformer::OpenShift);

        let objects = transform(&app, &options).unwrap();
        let kinds: Vec<(&str, &str)> = objects.iter().map(|o| (o.name(), o.kind())).collect();
        assert_eq!(
            kinds,
            vec![
                ("app", "ImageStream"),
                ("api", "DeploymentConfig"),
                ("nginx", "ImageStream"),
                ("web", "DeploymentConfig"),
                ("worker", "DeploymentConfig"),
            ]
        );

        let Resource::ImageStream(stream) = &objects[0] else {
            panic!("expected image stream");
        };
        let tags: Vec<&str> = stream.spec.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tags, vec!["v1", "v2"]);

        let worker = objects[4].to_value().unwrap();
        assert_eq!(
            worker["spec"]["triggers"][1]["imageChangeParams"]["from"]["name"],
            "app:v2"
        );
    }

    #[test]
    fn test_image_streams_keep_repositories_apart() {
        let app = Application::new("demo")
            .with_service("alpha", ServiceConfig::new("registry-a.example/team/app:v1"))
            .with_service("beta", ServiceConfig::new("registry-b.example/other/app:v1"));
        let options = ConvertOptions::default().with_controller(ControllerKind::DeploymentConfig);
        let mut warnings = Warnings::new(WarningPolicy::Report);
        let objects = Transformer::OpenShift
            .transform(&app, &options, &mut warnings)
            .unwrap();

        let kinds: Vec<(&str, &str)> = objects.iter().map(|o| (o.name(), o.kind())).collect();
        assert_eq!(
            kinds,
            vec![
                ("app", "ImageStream"),
                ("alpha", "DeploymentConfig"),
                ("app-2", "ImageStream"),
                ("beta", "DeploymentConfig"),
            ]
        );

        for (stream_index, image) in [
            (0, "registry-a.example/team/app:v1"),
            (2, "registry-b.example/other/app:v1"),
        ] {
            let Resource::ImageStream(stream) = &objects[stream_index] else {
                panic!("expected image stream");
            };
            assert_eq!(stream.spec.tags.len(), 1);
            assert_eq!(stream.spec.tags[0].from.name, image);
        }

        let from = |index: usize| {
            objects[index].to_value().unwrap()["spec"]["triggers"][1]["imageChangeParams"]["from"]
                ["name"]
                .clone()
        };
        assert_eq!(from(1), "app:v1");
        assert_eq!(from(3), "app-2:v1");

        assert_eq!(objects[2].labels().unwrap()[SELECTOR_LABEL], "beta");
        assert_eq!(warnings.len(), 1);
        let warning = warnings.iter().next().unwrap();
        assert_eq!(warning.service.as_deref(), Some("beta"));
        assert!(warning.message.contains("using 'app-2'"));
    }

    #[test]
    fn test_same_tag_for_different_images_is_rejected() {
        let app = Application::new("demo")
            .with_service("api", ServiceConfig::new("registry.local/app:v1@sha256:aaaa"))
            .with_service("worker", ServiceConfig::new("registry.local/app:v1@sha256:bbbb"));
        let options = ConvertOptions::default().with_controller(ControllerKind::DeploymentConfig);

        let err = transform(&app, &options).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert!(err.to_string().contains("registry.local/app:v1@sha256:bbbb"));

        let app = Application::new("demo")
            .with_service("api", ServiceConfig::new("registry.local/app:v1"))
            .with_service("worker", ServiceConfig::new("registry.local/app:v1"));
        let objects = transform(&app, &options).unwrap();
        assert_eq!(objects.iter().filter(|o| o.kind() == "ImageStream").count(), 1);
    }

    #[test]
    fn test_name_normalization_and_collision() {
        let app = Application::new("demo").with_service("My_Web", ServiceConfig::new("nginx"));
        let objects = transform(&app, &ConvertOptions::default()).unwrap();
        assert_eq!(objects[0].name(), "my-web");

        let app = app.with_service("my-web", ServiceConfig::new("nginx"));
        let err = transform(&app, &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));

        let app = Application::new("demo").with_service("___", ServiceConfig::new("nginx"));
        assert!(transform(&app, &ConvertOptions::default()).is_err());
    }

    #[test]
    fn test_failed_transform_returns_nothing() {
        let mut job = ServiceConfig::new("busybox");
        job.restart = Some(shipyard_core::RestartPolicy::Never);
        let app = web_app().with_service("job", job);

        let mut warnings = Warnings::new(WarningPolicy::Escalate);
        let options = ConvertOptions::default();
        let result = Transformer::for_options(&options).transform(&app, &options, &mut warnings);
        assert!(matches!(result, Err(CoreError::WarningEscalated { .. })));
    }
}
