//! Conversion options and their validation

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Compose file used when no input file is given
pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";

/// Default namespace for cluster submission
pub const DEFAULT_NAMESPACE: &str = "default";

/// Workload controller to emit for each service
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ControllerKind {
    Deployment,
    DaemonSet,
    ReplicationController,
    DeploymentConfig,
}

impl ControllerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::DaemonSet => "DaemonSet",
            Self::ReplicationController => "ReplicationController",
            Self::DeploymentConfig => "DeploymentConfig",
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialization format of emitted objects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

/// Where the emitted objects go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// One file per object in the current directory
    Files,
    /// All objects in a single file
    File(PathBuf),
    Stdout,
    /// Submitted to a cluster
    Cluster,
}

/// User intent for one conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Selected controller kinds; empty means Deployment
    pub controllers: BTreeSet<ControllerKind>,
    pub out_file: Option<PathBuf>,
    pub to_stdout: bool,
    pub create_chart: bool,
    pub format: OutputFormat,
    /// Replica override; `None` keeps the per-service hint
    pub replicas: Option<i32>,
    pub input_files: Vec<PathBuf>,
    pub bundle_file: Option<PathBuf>,
    /// Submit to a cluster instead of writing
    pub submit: bool,
    pub namespace: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            controllers: BTreeSet::new(),
            out_file: None,
            to_stdout: false,
            create_chart: false,
            format: OutputFormat::default(),
            replicas: None,
            input_files: vec![PathBuf::from(DEFAULT_COMPOSE_FILE)],
            bundle_file: None,
            submit: false,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl ConvertOptions {
    pub fn with_controller(mut self, kind: ControllerKind) -> Self {
        self.controllers.insert(kind);
        self
    }

    pub fn with_replicas(mut self, replicas: i32) -> Self {
        self.replicas = Some(replicas);
        self
    }

    /// Whether output is constrained to a single artifact
    pub fn single_output(&self) -> bool {
        self.out_file.is_some() || self.to_stdout
    }

    pub fn output_target(&self) -> OutputTarget {
        if self.submit {
            OutputTarget::Cluster
        } else if self.to_stdout {
            OutputTarget::Stdout
        } else if let Some(path) = &self.out_file {
            OutputTarget::File(path.clone())
        } else {
            OutputTarget::Files
        }
    }

    /// Controller kinds to emit, defaulting to Deployment
    pub fn effective_controllers(&self) -> BTreeSet<ControllerKind> {
        if self.controllers.is_empty() {
            BTreeSet::from([ControllerKind::Deployment])
        } else {
            self.controllers.clone()
        }
    }

    /// Replica count for a service: explicit option, then hint, then 1
    pub fn replicas_for(&self, hint: Option<u32>) -> i32 {
        match (self.replicas, hint) {
            (Some(replicas), _) => replicas,
            (None, Some(hint)) => i32::try_from(hint).unwrap_or(i32::MAX),
            (None, None) => 1,
        }
    }

    /// The input file the loader reads first
    pub fn primary_input(&self) -> Option<&Path> {
        self.bundle_file
            .as_deref()
            .or_else(|| self.input_files.first().map(PathBuf::as_path))
    }

    /// Validate these options against their own flags
    pub fn validate(&self) -> Result<()> {
        let input = self
            .input_files
            .iter()
            .find(|p| p.as_os_str() != DEFAULT_COMPOSE_FILE)
            .or_else(|| self.input_files.first());
        validate(
            self,
            self.single_output(),
            self.bundle_file.as_deref(),
            input.map(PathBuf::as_path),
        )
    }
}

/// Check that the options are consistent
///
/// Runs before any input is loaded.
pub fn validate(
    options: &ConvertOptions,
    single_output: bool,
    bundle_file: Option<&Path>,
    input_file: Option<&Path>,
) -> Result<()> {
    if options.out_file.is_some() && options.to_stdout {
        return Err(CoreError::configuration(
            "--out and --stdout can't be set at the same time",
        ));
    }

    if options.create_chart && options.to_stdout {
        return Err(CoreError::configuration(
            "chart cannot be generated when --stdout is specified",
        ));
    }

    if let Some(replicas) = options.replicas
        && replicas < 0
    {
        return Err(CoreError::configuration("--replicas cannot be negative"));
    }

    if single_output && options.controllers.len() > 1 {
        let kinds: Vec<&str> = options.controllers.iter().map(|k| k.as_str()).collect();
        return Err(CoreError::configuration(format!(
            "only one kind of controller can be generated when --out or --stdout is specified (got {})",
            kinds.join(", ")
        )));
    }

    let bundle_set = bundle_file.is_some_and(|p| !p.as_os_str().is_empty());
    let custom_input = input_file
        .is_some_and(|p| !p.as_os_str().is_empty() && p.as_os_str() != DEFAULT_COMPOSE_FILE);
    if bundle_set && custom_input {
        return Err(CoreError::configuration(
            "compose file and bundle file cannot be specified at the same time",
        ));
    }

    Ok(())
}
