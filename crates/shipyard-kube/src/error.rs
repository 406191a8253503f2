//! Error types for shipyard-kube

use thiserror::Error;

/// Result type for cluster operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while talking to a cluster
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// No usable cluster configuration
    #[error("cannot connect to a cluster: {0}\nHint: check KUBECONFIG or the in-cluster service account")]
    Connection(String),

    /// The cluster does not serve this kind
    #[error("unknown resource type: {api_version}/{kind}")]
    UnknownKind { api_version: String, kind: String },

    /// Object could not be turned into an API request
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Object name derived from a service name is invalid
    #[error("{0}")]
    Core(#[from] shipyard_core::CoreError),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> KubeError {
        KubeError::Api(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: "NotFound".to_string(),
            code,
        }))
    }

    #[test]
    fn test_status_helpers() {
        assert!(api_error(404).is_not_found());
        assert!(!api_error(409).is_not_found());
        assert!(!KubeError::InvalidObject("x".to_string()).is_not_found());
    }

    #[test]
    fn test_from_serde_json() {
        let err: KubeError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, KubeError::Serialization(_)));
    }
}
