//! Shipyard CLI - Convert compose files and bundles to Kubernetes and OpenShift objects

use clap::{Parser, Subcommand};
use shipyard_core::DEFAULT_NAMESPACE;

mod commands;
mod display;
mod driver;
mod error;
mod exit_codes;
mod logging;
mod prompt;

use commands::InputArgs;
use commands::convert::ConvertArgs;
use logging::LogConfig;

#[derive(Parser)]
#[command(name = "shipyard")]
#[command(author = "Shipyard Contributors")]
#[command(version)]
#[command(about = "Convert compose files and bundles to Kubernetes and OpenShift objects", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    inputs: InputArgs,

    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Do not print conversion warnings
    #[arg(long, global = true)]
    suppress_warnings: bool,

    /// Fail on the first conversion warning
    #[arg(long, global = true)]
    error_on_warning: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert to Kubernetes or OpenShift objects
    Convert(ConvertArgs),

    /// Deploy the application to the current cluster
    Up {
        /// Target namespace
        #[arg(long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },

    /// Delete the application's objects from the current cluster
    Down {
        /// Target namespace
        #[arg(long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    let log = LogConfig::from_flags(cli.verbose, cli.suppress_warnings, cli.error_on_warning);
    log.init();

    let result = match &cli.command {
        Commands::Convert(args) => commands::convert::run(args, &cli.inputs, log),
        Commands::Up { namespace } => commands::up::run(&cli.inputs, namespace, log),
        Commands::Down { namespace, yes } => {
            commands::down::run(&cli.inputs, namespace, *yes, log)
        }
    };

    let code = match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };
    std::process::exit(code);
}
