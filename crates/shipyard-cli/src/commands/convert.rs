//! Convert command - write platform objects for a compose file or bundle

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use clap::Args;
use shipyard_core::{ControllerKind, ConvertOptions, OutputFormat};

use super::InputArgs;
use crate::display;
use crate::driver::{self, Emitted};
use crate::error::Result;
use crate::logging::LogConfig;

/// Value of `--out` selecting stdout
const STDOUT_PATH: &str = "-";

#[derive(Args, Debug, Clone, Default)]
pub struct ConvertArgs {
    /// Write all objects to a single file, or `-` for stdout
    #[arg(short = 'o', long = "out")]
    pub out: Option<PathBuf>,

    /// Print all objects to stdout
    #[arg(long)]
    pub stdout: bool,

    /// Emit YAML
    #[arg(short = 'y', long, conflicts_with = "json")]
    pub yaml: bool,

    /// Emit JSON (default)
    #[arg(long)]
    pub json: bool,

    /// Generate a Deployment per service
    #[arg(short = 'd', long)]
    pub deployment: bool,

    /// Generate a DaemonSet per service
    #[arg(long)]
    pub daemonset: bool,

    /// Generate a ReplicationController per service
    #[arg(long)]
    pub replicationcontroller: bool,

    /// Generate an OpenShift DeploymentConfig per service
    #[arg(long)]
    pub deploymentconfig: bool,

    /// Package the objects as a Helm chart
    #[arg(short = 'c', long)]
    pub chart: bool,

    /// Replica count for every controller
    #[arg(long, allow_negative_numbers = true)]
    pub replicas: Option<i32>,
}

impl ConvertArgs {
    /// Conversion options for these flags and `inputs`
    pub fn options(&self, inputs: &InputArgs) -> ConvertOptions {
        let to_stdout = self.stdout || self.out.as_deref() == Some(Path::new(STDOUT_PATH));
        let out_file = self
            .out
            .clone()
            .filter(|path| path.as_path() != Path::new(STDOUT_PATH));

        let mut controllers = BTreeSet::new();
        for (selected, kind) in [
            (self.deployment, ControllerKind::Deployment),
            (self.daemonset, ControllerKind::DaemonSet),
            (self.replicationcontroller, ControllerKind::ReplicationController),
            (self.deploymentconfig, ControllerKind::DeploymentConfig),
        ] {
            if selected {
                controllers.insert(kind);
            }
        }

        ConvertOptions {
            controllers,
            out_file,
            to_stdout,
            create_chart: self.chart,
            format: if self.yaml {
                OutputFormat::Yaml
            } else {
                OutputFormat::Json
            },
            replicas: self.replicas,
            input_files: inputs.files.clone(),
            bundle_file: inputs.bundle.clone(),
            ..ConvertOptions::default()
        }
    }
}

pub fn run(args: &ConvertArgs, inputs: &InputArgs, log: LogConfig) -> Result<()> {
    let options = args.options(inputs);
    let conversion = driver::convert(&options, log.policy)?;

    let dir = std::env::current_dir()?;
    let emitted = driver::emit(&conversion, &options, &dir)?;

    display::print_warnings(&conversion.warnings);
    match emitted {
        Emitted::Files(files) => display::print_written(&files),
        Emitted::Chart(root) => display::print_chart(&root),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> InputArgs {
        InputArgs {
            files: vec![PathBuf::from("docker-compose.yml")],
            bundle: None,
        }
    }

    #[test]
    fn test_out_dash_means_stdout() {
        let args = ConvertArgs {
            out: Some(PathBuf::from("-")),
            ..Default::default()
        };
        let options = args.options(&inputs());
        assert!(options.to_stdout);
        assert!(options.out_file.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_controller_flags() {
        let args = ConvertArgs {
            daemonset: true,
            replicationcontroller: true,
            yaml: true,
            ..Default::default()
        };
        let options = args.options(&inputs());
        assert_eq!(
            options.controllers,
            BTreeSet::from([
                ControllerKind::DaemonSet,
                ControllerKind::ReplicationController
            ])
        );
        assert_eq!(options.format, OutputFormat::Yaml);
    }

    #[test]
    fn test_default_format_is_json() {
        let options = ConvertArgs::default().options(&inputs());
        assert_eq!(options.format, OutputFormat::Json);
        assert!(options.effective_controllers().contains(&ControllerKind::Deployment));
    }

    #[test]
    fn test_out_and_stdout_conflict() {
        let args = ConvertArgs {
            out: Some(PathBuf::from("all.json")),
            stdout: true,
            ..Default::default()
        };
        assert!(args.options(&inputs()).validate().is_err());
    }
}
