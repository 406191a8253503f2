//! Shipyard Kube - Cluster submission for converted objects
//!
//! - [`ClusterClient`]: the seam `up` and `down` talk to
//! - [`KubeClusterClient`]: Server-Side Apply through discovery
//! - [`MockClusterClient`]: in-memory cluster for tests

pub mod client;
pub mod error;
pub mod mock;
pub mod resources;

pub use client::ClusterClient;
pub use error::{KubeError, Result};
pub use mock::{MockClusterClient, OperationCounts};
pub use resources::{FIELD_MANAGER, KubeClusterClient, OperationSummary, service_selector};
