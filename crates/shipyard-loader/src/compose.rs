//! Compose file loader
//!
//! Reads one or more compose documents, interpolates variables, merges them
//! in order and normalizes every service into a [`ServiceConfig`].

use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use shipyard_core::{
    Application, ConversionWarning, CoreError, PortMapping, Protocol, Result, RestartPolicy,
    ServiceConfig, VolumeMount, VolumeSource, Warnings,
};

use crate::interpolate::{Environment, InterpolationError, interpolate_value};
use crate::merge::{merge_documents, scalar_to_string, to_key_value_mapping};
use crate::ports::{parse_port, parse_volume, volume_source};
use crate::{app_name_from_path, read_input, suggest};

/// Service keys mapped into the model
const SUPPORTED_KEYS: &[&str] = &[
    "image",
    "ports",
    "expose",
    "environment",
    "env_file",
    "volumes",
    "command",
    "entrypoint",
    "depends_on",
    "restart",
    "deploy",
    "mem_limit",
    "cpus",
    "scale",
    "labels",
    "working_dir",
    "user",
    "hostname",
    "privileged",
    "cap_add",
    "cap_drop",
    "stdin_open",
    "tty",
];

/// Valid compose keys with no counterpart on the target platforms
const UNSUPPORTED_KEYS: &[&str] = &[
    "build",
    "cgroup_parent",
    "configs",
    "container_name",
    "cpu_quota",
    "cpu_shares",
    "cpuset",
    "devices",
    "dns",
    "dns_search",
    "domainname",
    "extends",
    "external_links",
    "extra_hosts",
    "healthcheck",
    "init",
    "ipc",
    "isolation",
    "links",
    "logging",
    "mac_address",
    "mem_reservation",
    "memswap_limit",
    "network_mode",
    "networks",
    "oom_score_adj",
    "pid",
    "platform",
    "profiles",
    "pull_policy",
    "read_only",
    "secrets",
    "security_opt",
    "shm_size",
    "stop_grace_period",
    "stop_signal",
    "sysctls",
    "tmpfs",
    "ulimits",
    "volume_driver",
    "volumes_from",
];

/// Top-level keys that may appear next to `services`
const TOP_LEVEL_KEYS: &[&str] = &["version", "name", "services", "volumes", "networks", "secrets", "configs"];

/// Loads compose documents
#[derive(Debug, Clone, Default)]
pub struct ComposeLoader {
    env: Environment,
}

impl ComposeLoader {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    /// Load and merge compose files, later files overriding earlier ones
    pub fn load_files(&self, paths: &[PathBuf], warnings: &mut Warnings) -> Result<Application> {
        let Some(first) = paths.first() else {
            return Err(CoreError::configuration("no compose file given"));
        };

        let mut merged: Option<Mapping> = None;
        for path in paths {
            let content = read_input(path)?;
            let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
            let doc = self.parse_document(&content, &path.display().to_string(), base_dir, warnings)?;
            tracing::debug!("Loaded compose file {}", path.display());

            match merged.as_mut() {
                Some(base) => merge_documents(base, &doc),
                None => merged = Some(doc),
            }
        }

        let source = first.display().to_string();
        let doc = merged.unwrap_or_default();
        self.normalize(&app_name_from_path(first), doc, &source, warnings)
    }

    /// Load a single compose document from a string
    ///
    /// `env_file` references are resolved relative to the current directory.
    pub fn load_str(
        &self,
        app_name: &str,
        content: &str,
        source: &str,
        warnings: &mut Warnings,
    ) -> Result<Application> {
        let doc = self.parse_document(content, source, Path::new(""), warnings)?;
        self.normalize(app_name, doc, source, warnings)
    }

    /// Parse, interpolate and shape-normalize one document
    fn parse_document(
        &self,
        content: &str,
        source: &str,
        base_dir: &Path,
        warnings: &mut Warnings,
    ) -> Result<Mapping> {
        let mut value: Value =
            serde_yaml::from_str(content).map_err(|e| CoreError::format(source, e.to_string()))?;

        let missing = interpolate_value(&mut value, &self.env).map_err(|e| match e {
            InterpolationError::Required { .. } => CoreError::schema(source, e.to_string()),
            other => CoreError::format(source, other.to_string()),
        })?;
        let mut reported = Vec::new();
        for name in missing {
            if !reported.contains(&name) {
                warnings.warn(ConversionWarning::new(
                    "interpolation",
                    format!("variable '{}' is not set, substituting an empty string", name),
                ))?;
                reported.push(name);
            }
        }

        let mut doc = match value {
            Value::Mapping(map) => map,
            Value::Null => return Err(CoreError::format(source, "document is empty")),
            _ => return Err(CoreError::format(source, "expected a mapping at the top level")),
        };

        // Version 1 files list services at the top level
        if !doc.contains_key("services") && !doc.contains_key("version") {
            let mut wrapped = Mapping::new();
            wrapped.insert(Value::from("services"), Value::Mapping(doc));
            doc = wrapped;
        }

        if let Some(Value::Mapping(services)) = doc.get_mut("services") {
            for (_, service) in services.iter_mut() {
                if let Value::Mapping(service) = service {
                    resolve_env_files(service, base_dir, source)?;
                }
            }
        }

        Ok(doc)
    }

    fn normalize(
        &self,
        app_name: &str,
        mut doc: Mapping,
        source: &str,
        warnings: &mut Warnings,
    ) -> Result<Application> {
        for key in doc.keys() {
            let key = key.as_str().unwrap_or_default();
            if !TOP_LEVEL_KEYS.contains(&key) && !key.starts_with("x-") {
                warnings.warn(ConversionWarning::new(key, "unknown top-level key, ignored"))?;
            }
        }

        let name = doc
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(app_name)
            .to_string();
        let mut app = Application::new(name);

        let services = match doc.remove("services") {
            Some(Value::Mapping(services)) => services,
            Some(Value::Null) | None => Mapping::new(),
            Some(_) => return Err(CoreError::schema(source, "'services' must be a mapping")),
        };

        for (name, definition) in services {
            let Some(name) = name.as_str().map(str::to_string) else {
                return Err(CoreError::schema(source, "service names must be strings"));
            };
            let definition = match definition {
                Value::Mapping(map) => map,
                Value::Null => Mapping::new(),
                _ => {
                    return Err(CoreError::schema(
                        source,
                        format!("service '{}' must be a mapping", name),
                    ));
                }
            };

            let service = self.normalize_service(&name, definition, source, warnings)?;
            app.services.insert(name, service);
        }

        app.validate(source)?;
        Ok(app)
    }

    fn normalize_service(
        &self,
        name: &str,
        definition: Mapping,
        source: &str,
        warnings: &mut Warnings,
    ) -> Result<ServiceConfig> {
        let mut known = Mapping::new();
        for (key, value) in definition {
            let field = key.as_str().unwrap_or_default().to_string();
            if SUPPORTED_KEYS.contains(&field.as_str()) {
                known.insert(key, value);
            } else if field.starts_with("x-") {
                continue;
            } else if UNSUPPORTED_KEYS.contains(&field.as_str()) {
                warnings.warn(ConversionWarning::for_service(
                    name,
                    &field,
                    "not supported, ignored",
                ))?;
            } else {
                let candidates = SUPPORTED_KEYS.iter().chain(UNSUPPORTED_KEYS);
                let mut warning = ConversionWarning::for_service(name, &field, "unknown key, ignored");
                if let Some(closest) = suggest(&field, candidates.copied()) {
                    warning = warning.with_suggestion(format!("did you mean '{}'?", closest));
                }
                warnings.warn(warning)?;
            }
        }

        let raw: RawService = serde_yaml::from_value(Value::Mapping(known))
            .map_err(|e| CoreError::schema(source, format!("service '{}': {}", name, e)))?;

        let schema_err = |message: String| CoreError::schema(source, format!("service '{}': {}", name, message));

        let mut service = ServiceConfig {
            image: raw
                .image
                .filter(|i| !i.trim().is_empty())
                .ok_or_else(|| schema_err("no image specified".to_string()))?,
            ..Default::default()
        };

        for port in raw.ports {
            let mappings = match port {
                RawPort::Short(spec) => parse_port(&spec.to_string()).map_err(&schema_err)?,
                RawPort::Long(long) => vec![long.to_mapping().map_err(&schema_err)?],
            };
            service.ports.extend(mappings);
        }

        for exposed in raw.expose {
            for mapping in parse_port(&exposed.to_string()).map_err(&schema_err)? {
                let declared = service.ports.iter().any(|p| {
                    p.container_port == mapping.container_port && p.protocol == mapping.protocol
                });
                if !declared {
                    service.ports.push(PortMapping {
                        published: None,
                        host_ip: None,
                        ..mapping
                    });
                }
            }
        }

        if let Some(environment) = raw.environment {
            for (key, value) in environment.into_pairs() {
                match value.or_else(|| self.env.get(&key).map(str::to_string)) {
                    Some(value) => service.set_env(key, value),
                    None => warnings.warn(ConversionWarning::for_service(
                        name,
                        format!("environment.{}", key),
                        "no value given and not set in the environment, dropped",
                    ))?,
                }
            }
        }

        for volume in raw.volumes {
            match volume {
                RawVolume::Short(spec) => service.volumes.push(parse_volume(&spec).map_err(&schema_err)?),
                RawVolume::Long(long) => match long.to_mount() {
                    Some(mount) => service.volumes.push(mount),
                    None => warnings.warn(ConversionWarning::for_service(
                        name,
                        format!("volumes.{}", long.target),
                        format!(
                            "volume type '{}' is not supported, ignored",
                            long.kind.as_deref().unwrap_or_default()
                        ),
                    ))?,
                },
            }
        }

        service.command = raw.entrypoint.map(StringOrList::into_args).unwrap_or_default();
        service.args = raw.command.map(StringOrList::into_args).unwrap_or_default();

        service.depends_on = match raw.depends_on {
            Some(DependsOn::List(names)) => names.into_iter().collect(),
            Some(DependsOn::Map(map)) => map.into_keys().collect(),
            None => Default::default(),
        };

        let deploy = raw.deploy.unwrap_or_default();

        let restart = raw.restart.or_else(|| {
            deploy
                .restart_policy
                .as_ref()
                .and_then(|p| p.condition.clone())
        });
        if let Some(restart) = restart {
            match RestartPolicy::parse(&restart) {
                Some(policy) => service.restart = Some(policy),
                None => warnings.warn(ConversionWarning::for_service(
                    name,
                    "restart",
                    format!("unknown restart policy '{}', ignored", restart),
                ))?,
            }
        }

        let limits = deploy.resources.as_ref().and_then(|r| r.limits.as_ref());
        let memory = limits.and_then(|l| l.memory.as_ref()).or(raw.mem_limit.as_ref());
        if let Some(memory) = memory {
            let text = memory.to_string();
            service.resources.memory_bytes = Some(
                parse_memory(&text).ok_or_else(|| schema_err(format!("invalid memory limit '{}'", text)))?,
            );
        }
        let cpus = limits.and_then(|l| l.cpus.as_ref()).or(raw.cpus.as_ref());
        if let Some(cpus) = cpus {
            let text = cpus.to_string();
            match text.parse::<f64>() {
                Ok(value) if value > 0.0 => service.resources.cpus = Some(text),
                _ => return Err(schema_err(format!("invalid cpu limit '{}'", text))),
            }
        }

        service.replicas = deploy.replicas.or(raw.scale);

        for key in deploy.other.keys() {
            warnings.warn(ConversionWarning::for_service(
                name,
                format!("deploy.{}", key),
                "not supported, ignored",
            ))?;
        }
        if let Some(resources) = &deploy.resources {
            for key in resources.other.keys() {
                warnings.warn(ConversionWarning::for_service(
                    name,
                    format!("deploy.resources.{}", key),
                    "not supported, ignored",
                ))?;
            }
        }

        service.labels = raw
            .labels
            .map(|labels| {
                labels
                    .into_pairs()
                    .into_iter()
                    .map(|(k, v)| (k, v.unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default();

        service.working_dir = raw.working_dir;
        service.user = raw.user.map(|u| u.to_string());
        service.hostname = raw.hostname;
        service.privileged = raw.privileged;
        service.cap_add = raw.cap_add;
        service.cap_drop = raw.cap_drop;
        service.stdin_open = raw.stdin_open;
        service.tty = raw.tty;

        Ok(service)
    }
}

/// Fold `env_file` entries into `environment`; explicit entries win
fn resolve_env_files(service: &mut Mapping, base_dir: &Path, source: &str) -> Result<()> {
    let Some(env_file) = service.remove("env_file") else {
        return Ok(());
    };

    let files: Vec<String> = match &env_file {
        Value::String(file) => vec![file.clone()],
        Value::Sequence(items) => items.iter().filter_map(scalar_to_string).collect(),
        _ => return Err(CoreError::schema(source, "'env_file' must be a string or a list")),
    };

    let mut merged = Mapping::new();
    for file in files {
        let path = base_dir.join(&file);
        let content = read_input(&path)?;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').unwrap_or((line, ""));
            merged.insert(Value::from(key.trim()), Value::from(value));
        }
    }

    if let Some(existing) = service.get("environment") {
        for (k, v) in to_key_value_mapping(existing) {
            merged.insert(k, v);
        }
    }
    service.insert(Value::from("environment"), Value::Mapping(merged));
    Ok(())
}

/// Parse a compose byte size (`512m`, `1g`, `1024k`, `100b`, `2048`)
pub fn parse_memory(value: &str) -> Option<u64> {
    let value = value.trim().to_ascii_lowercase();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: f64 = number.parse().ok()?;

    let multiplier: u64 = match unit.trim() {
        "" | "b" => 1,
        "k" | "kb" => 1 << 10,
        "m" | "mb" => 1 << 20,
        "g" | "gb" => 1 << 30,
        _ => return None,
    };

    if number < 0.0 {
        return None;
    }
    Some((number * multiplier as f64).round() as u64)
}

/// Split a command string into arguments, honouring quotes
pub fn split_command(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_arg = false;

    for c in command.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_arg = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_arg = true;
            }
        }
    }
    if in_arg {
        args.push(current);
    }
    args
}

// =============================================================================
// Raw document shapes
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrList {
    String(String),
    List(Vec<Scalar>),
}

impl StringOrList {
    fn into_args(self) -> Vec<String> {
        match self {
            Self::String(command) => split_command(&command),
            Self::List(items) => items.iter().map(Scalar::to_string).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeyValues {
    Map(IndexMap<String, Option<Scalar>>),
    List(Vec<String>),
}

impl KeyValues {
    /// Entries in declaration order; `None` when no value was given
    fn into_pairs(self) -> Vec<(String, Option<String>)> {
        match self {
            Self::Map(map) => map
                .into_iter()
                .map(|(k, v)| (k, v.map(|v| v.to_string())))
                .collect(),
            Self::List(items) => items
                .into_iter()
                .map(|entry| match entry.split_once('=') {
                    Some((k, v)) => (k.to_string(), Some(v.to_string())),
                    None => (entry, None),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DependsOn {
    List(Vec<String>),
    Map(IndexMap<String, Value>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPort {
    Short(Scalar),
    Long(LongPort),
}

#[derive(Debug, Deserialize)]
struct LongPort {
    target: u16,
    #[serde(default)]
    published: Option<Scalar>,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    host_ip: Option<String>,
}

impl LongPort {
    fn to_mapping(&self) -> std::result::Result<PortMapping, String> {
        let protocol = match &self.protocol {
            Some(p) => Protocol::parse(p).ok_or_else(|| format!("unsupported protocol '{}'", p))?,
            None => Protocol::Tcp,
        };
        let published = match &self.published {
            Some(p) => Some(
                p.to_string()
                    .parse::<u16>()
                    .map_err(|_| format!("invalid published port '{}'", p))?,
            ),
            None => None,
        };
        Ok(PortMapping {
            container_port: self.target,
            published,
            host_ip: self.host_ip.clone(),
            protocol,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawVolume {
    Short(String),
    Long(LongVolume),
}

#[derive(Debug, Deserialize)]
struct LongVolume {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    source: Option<String>,
    target: String,
    #[serde(default)]
    read_only: bool,
}

impl LongVolume {
    fn to_mount(&self) -> Option<VolumeMount> {
        let source = match (self.kind.as_deref(), self.source.as_deref()) {
            (Some("bind"), Some(path)) => VolumeSource::Host(path.to_string()),
            (Some("volume"), Some(name)) => VolumeSource::Named(name.to_string()),
            (Some("volume") | Some("tmpfs"), None) | (Some("tmpfs"), Some(_)) => VolumeSource::Anonymous,
            (None, source) => source.map_or(VolumeSource::Anonymous, volume_source),
            _ => return None,
        };
        Some(VolumeMount {
            source,
            target: self.target.clone(),
            read_only: self.read_only,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct Deploy {
    #[serde(default)]
    replicas: Option<u32>,
    #[serde(default)]
    resources: Option<Resources>,
    #[serde(default)]
    restart_policy: Option<DeployRestartPolicy>,
    #[serde(flatten)]
    other: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Resources {
    #[serde(default)]
    limits: Option<Limits>,
    #[serde(flatten)]
    other: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Limits {
    #[serde(default)]
    cpus: Option<Scalar>,
    #[serde(default)]
    memory: Option<Scalar>,
}

#[derive(Debug, Deserialize)]
struct DeployRestartPolicy {
    #[serde(default)]
    condition: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawService {
    image: Option<String>,
    ports: Vec<RawPort>,
    expose: Vec<Scalar>,
    environment: Option<KeyValues>,
    volumes: Vec<RawVolume>,
    command: Option<StringOrList>,
    entrypoint: Option<StringOrList>,
    depends_on: Option<DependsOn>,
    restart: Option<String>,
    deploy: Option<Deploy>,
    mem_limit: Option<Scalar>,
    cpus: Option<Scalar>,
    scale: Option<u32>,
    labels: Option<KeyValues>,
    working_dir: Option<String>,
    user: Option<Scalar>,
    hostname: Option<String>,
    privileged: bool,
    cap_add: Vec<String>,
    cap_drop: Vec<String>,
    stdin_open: bool,
    tty: bool,
}
