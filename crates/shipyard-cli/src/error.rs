//! CLI error types with exit code handling

use miette::Diagnostic;
use shipyard_core::{CoreError, ErrorKind};
use shipyard_kube::KubeError;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum CliError {
    /// Flags conflict or are out of range
    #[error("Configuration error: {message}")]
    #[diagnostic(code(shipyard::cli::configuration))]
    Configuration {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Input could not be loaded
    #[error("Load error: {message}")]
    #[diagnostic(code(shipyard::cli::load))]
    Load {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Objects could not be built
    #[error("Transform error: {message}")]
    #[diagnostic(code(shipyard::cli::transform))]
    Transform {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(shipyard::cli::io))]
    Io { message: String },

    /// Cluster unreachable or objects rejected
    #[error("Cluster error: {message}")]
    #[diagnostic(code(shipyard::cli::cluster))]
    Cluster {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// No usable answer from the user
    #[error("{message}")]
    #[diagnostic(code(shipyard::cli::input))]
    Input { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(shipyard::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Configuration { .. } => exit_codes::CONFIG_ERROR,
            CliError::Load { .. } => exit_codes::LOAD_ERROR,
            CliError::Transform { .. } => exit_codes::TRANSFORM_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Input { .. } => exit_codes::ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a cluster error
    pub fn cluster(message: impl Into<String>) -> Self {
        Self::Cluster {
            message: message.into(),
            help: None,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Configuration => CliError::Configuration {
                message,
                help: Some("Run with --help to see the accepted flags".to_string()),
            },
            ErrorKind::Format | ErrorKind::Schema => CliError::Load {
                message,
                help: None,
            },
            ErrorKind::Validation => CliError::Transform {
                message,
                help: None,
            },
            ErrorKind::Warning => CliError::Transform {
                message,
                help: Some("Drop --error-on-warning to continue past warnings".to_string()),
            },
            ErrorKind::Input => CliError::Input { message },
            ErrorKind::Io => CliError::Io { message },
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        let help = match &err {
            KubeError::Connection(_) => {
                Some("Check that KUBECONFIG points at a reachable cluster".to_string())
            }
            KubeError::UnknownKind { .. } => {
                Some("The cluster does not serve this kind; OpenShift kinds need an OpenShift cluster".to_string())
            }
            _ => None,
        };
        match err {
            KubeError::Core(core) => core.into(),
            err => CliError::Cluster {
                message: err.to_string(),
                help,
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
