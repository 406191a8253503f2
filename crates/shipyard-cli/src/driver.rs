//! Conversion pipeline shared by every subcommand
//!
//! Options are validated before a loader is picked; nothing is written or
//! submitted until the transform has returned every object.

use std::path::{Path, PathBuf};

use shipyard_core::{
    Application, ConvertOptions, OutputTarget, Result as CoreResult, WarningPolicy, Warnings,
};
use shipyard_kube::{ClusterClient, OperationSummary};
use shipyard_loader::Loader;
use shipyard_transform::{Chart, Resource, Transformer, output};

use crate::error::{CliError, Result};

/// A loaded and transformed application
#[derive(Debug)]
pub struct Conversion {
    pub app: Application,
    pub objects: Vec<Resource>,
    pub warnings: Warnings,
}

/// What `emit` produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emitted {
    /// Files written; empty when objects went to stdout
    Files(Vec<PathBuf>),
    /// Root directory of a chart
    Chart(PathBuf),
}

/// Validate options, then load and transform the inputs they name
pub fn convert(options: &ConvertOptions, policy: WarningPolicy) -> CoreResult<Conversion> {
    options.validate()?;
    let loader = shipyard_loader::loader_for(options);
    convert_with(&loader, options, policy)
}

/// Validate options and load the application without transforming it
pub fn load(options: &ConvertOptions, policy: WarningPolicy) -> CoreResult<(Application, Warnings)> {
    options.validate()?;
    let mut warnings = Warnings::new(policy);
    let app = shipyard_loader::loader_for(options).load(options, &mut warnings)?;
    Ok((app, warnings))
}

/// Load and transform with an explicit loader
pub fn convert_with(
    loader: &Loader,
    options: &ConvertOptions,
    policy: WarningPolicy,
) -> CoreResult<Conversion> {
    let mut warnings = Warnings::new(policy);
    let app = loader.load(options, &mut warnings)?;
    tracing::debug!(
        "Loaded {} service(s) from {:?} input",
        app.len(),
        loader.format()
    );

    let transformer = Transformer::for_options(options);
    let objects = transformer.transform(&app, options, &mut warnings)?;
    tracing::debug!(
        "{} transformer produced {} object(s)",
        transformer.platform(),
        objects.len()
    );

    Ok(Conversion {
        app,
        objects,
        warnings,
    })
}

/// Write the objects of `conversion` relative to `dir`
///
/// With `create_chart` the chart goes under the `--out` directory when one
/// is given.
pub fn emit(conversion: &Conversion, options: &ConvertOptions, dir: &Path) -> CoreResult<Emitted> {
    if options.create_chart {
        let chart = Chart::package(&conversion.app.name, &conversion.objects)?;
        let chart_dir = match options.output_target() {
            OutputTarget::File(path) => dir.join(path),
            _ => dir.to_path_buf(),
        };
        return chart.write_to(&chart_dir).map(Emitted::Chart);
    }

    output::write(&conversion.objects, options, dir).map(Emitted::Files)
}

/// Options for `up`: Kubernetes Deployments with one replica each
pub fn up_options(
    input_files: Vec<PathBuf>,
    bundle_file: Option<PathBuf>,
    namespace: &str,
) -> ConvertOptions {
    ConvertOptions {
        input_files,
        bundle_file,
        submit: true,
        namespace: namespace.to_string(),
        ..ConvertOptions::default()
    }
    .with_replicas(1)
}

/// Convert and submit every object to `client`
pub async fn up(
    client: &dyn ClusterClient,
    conversion: &Conversion,
    namespace: &str,
) -> Result<OperationSummary> {
    let summary = client.create_objects(&conversion.objects, namespace).await?;
    if summary.is_success() {
        Ok(summary)
    } else {
        Err(CliError::cluster(format!(
            "{} object(s) could not be created: {}",
            summary.failed.len(),
            summary.summary()
        )))
    }
}

/// Delete the objects of every service in `app`
pub async fn down(
    client: &dyn ClusterClient,
    app: &Application,
    namespace: &str,
) -> Result<OperationSummary> {
    let mut summary = OperationSummary::default();
    for service_name in app.service_names() {
        tracing::debug!("Deleting objects of service {}", service_name);
        summary.extend(client.delete_objects(service_name, namespace).await?);
    }

    if summary.is_success() {
        Ok(summary)
    } else {
        Err(CliError::cluster(format!(
            "{} object(s) could not be deleted",
            summary.failed.len()
        )))
    }
}
