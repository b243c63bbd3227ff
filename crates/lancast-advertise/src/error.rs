//! Error types for service advertisement

use thiserror::Error;

/// Result type alias for advertisement operations
pub type Result<T> = std::result::Result<T, AdvertiseError>;

/// Errors that can occur while managing the service advertisement
#[derive(Debug, Error)]
pub enum AdvertiseError {
    /// Advertisement parameters failed validation
    #[error("Invalid advertisement parameters: {0}")]
    InvalidParams(String),

    /// The discovery backend could not be brought up
    #[error("Failed to initialize discovery backend: {0}")]
    BackendInit(String),

    /// A call into the discovery backend failed
    #[error("Discovery backend call failed: {0}")]
    Backend(String),
}
