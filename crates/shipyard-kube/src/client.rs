//! The cluster collaborator used by `up` and `down`

use async_trait::async_trait;
use shipyard_transform::Resource;

use crate::error::Result;
use crate::resources::OperationSummary;

/// Creates and deletes converted objects on a cluster
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Create or update every object in `namespace`, in order
    async fn create_objects(&self, objects: &[Resource], namespace: &str)
    -> Result<OperationSummary>;

    /// Delete every object created for `service_name` in `namespace`
    ///
    /// Objects that are already gone are reported as skipped.
    async fn delete_objects(&self, service_name: &str, namespace: &str)
    -> Result<OperationSummary>;
}
