//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Options are invalid or contradict each other
    #[error("{message}")]
    Configuration { message: String },

    /// Input does not match the syntax expected by the selected loader
    #[error("Failed to parse {path}: {message}")]
    Format { path: String, message: String },

    /// Input parses but has missing or invalid fields
    #[error("Invalid {path}: {message}")]
    Schema { path: String, message: String },

    /// Model and options cannot be mapped by the selected transformer
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Interactive input could not be obtained
    #[error("Invalid input: {message}")]
    Input { message: String },

    /// A warning raised while warnings are escalated to errors
    #[error("Warning treated as error: {message}")]
    WarningEscalated { message: String },

    /// An input or output file could not be accessed
    #[error("Failed to access {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error category, used by callers to pick exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Format,
    Schema,
    Validation,
    Input,
    Warning,
    Io,
}

impl CoreError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn format(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    pub fn file(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Format { .. } => ErrorKind::Format,
            Self::Schema { .. } => ErrorKind::Schema,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Input { .. } => ErrorKind::Input,
            Self::WarningEscalated { .. } => ErrorKind::Warning,
            Self::File { .. } | Self::Io(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
