//! Down command - delete the objects `up` created

use console::style;
use shipyard_core::ConvertOptions;
use shipyard_kube::KubeClusterClient;

use super::InputArgs;
use crate::display;
use crate::driver;
use crate::error::{CliError, Result};
use crate::logging::LogConfig;
use crate::prompt;

pub fn run(inputs: &InputArgs, namespace: &str, yes: bool, log: LogConfig) -> Result<()> {
    let options = ConvertOptions {
        input_files: inputs.files.clone(),
        bundle_file: inputs.bundle.clone(),
        submit: true,
        namespace: namespace.to_string(),
        ..ConvertOptions::default()
    };
    let (app, warnings) = driver::load(&options, log.policy)?;
    display::print_warnings(&warnings);

    if !yes {
        let question = format!(
            "Delete the objects of {} service(s) from namespace '{}'?",
            app.len(),
            namespace
        );
        let mut input = std::io::stdin().lock();
        let mut output = std::io::stderr();
        if !prompt::confirm(&question, &mut input, &mut output)? {
            eprintln!("{} Nothing deleted", style("○").yellow());
            return Ok(());
        }
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::internal(format!("cannot start async runtime: {}", e)))?;
    let summary = runtime.block_on(async {
        let client = KubeClusterClient::try_default().await?;
        driver::down(&client, &app, namespace).await
    })?;

    display::print_summary(&summary);
    Ok(())
}
