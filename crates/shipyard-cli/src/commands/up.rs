//! Up command - submit converted objects to the current cluster

use console::style;
use shipyard_kube::KubeClusterClient;

use super::InputArgs;
use crate::display;
use crate::driver;
use crate::error::{CliError, Result};
use crate::logging::LogConfig;

pub fn run(inputs: &InputArgs, namespace: &str, log: LogConfig) -> Result<()> {
    let options = driver::up_options(inputs.files.clone(), inputs.bundle.clone(), namespace);
    let conversion = driver::convert(&options, log.policy)?;
    display::print_warnings(&conversion.warnings);

    eprintln!(
        "{} Deploying {} in namespace {}",
        style("→").blue().bold(),
        style(&conversion.app.name).cyan(),
        style(namespace).yellow()
    );

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::internal(format!("cannot start async runtime: {}", e)))?;
    let summary = runtime.block_on(async {
        let client = KubeClusterClient::try_default().await?;
        driver::up(&client, &conversion, namespace).await
    })?;

    display::print_summary(&summary);
    Ok(())
}
