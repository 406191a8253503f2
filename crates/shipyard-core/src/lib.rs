//! Shipyard Core - Core types shared by loaders, transformers and the CLI
//!
//! This crate provides the foundational types used throughout Shipyard:
//! - `Application`: The normalized application model every loader produces
//! - `ConvertOptions`: User intent for a conversion, with validation
//! - `Warnings`: Collected conversion warnings under an explicit policy
//! - `naming`: Platform identifier normalization

pub mod error;
pub mod model;
pub mod naming;
pub mod options;
pub mod warnings;

pub use error::{CoreError, ErrorKind, Result};
pub use model::{
    Application, DEFAULT_APP_NAME, EnvVar, PortMapping, Protocol, ResourceLimits, RestartPolicy, ServiceConfig,
    VolumeMount, VolumeSource,
};
pub use naming::{MAX_NAME_LENGTH, SELECTOR_LABEL, selector_labels, to_dns_label};
pub use options::{
    ControllerKind, ConvertOptions, DEFAULT_COMPOSE_FILE, DEFAULT_NAMESPACE, OutputFormat,
    OutputTarget, validate,
};
pub use warnings::{ConversionWarning, WarningPolicy, Warnings};
