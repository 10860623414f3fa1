//! Error types for LwM2M object access
//!
//! Every enabler operation returns one of these typed outcomes; nothing in
//! this crate panics across the instance boundary.

use thiserror::Error;

/// Result type alias for enabler operations
pub type Result<T> = std::result::Result<T, AccessError>;

/// Outcome taxonomy for resource access operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Resource id is not in the instance's supported set
    #[error("Resource not found: {0}")]
    NotFound(u16),

    /// Operation is unsupported for the resource's access mode
    #[error("Method not allowed on resource {0}")]
    MethodNotAllowed(u16),

    /// Value shape or type does not match the resource model
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Attribute validation failure or unexpected fault during application
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AccessError {
    /// Shorthand used by write paths rejecting a mismatched payload.
    pub fn bad_request(detail: impl Into<String>) -> Self {
        AccessError::BadRequest(detail.into())
    }

    /// Shorthand used by the attribute-write boundary.
    pub fn internal(detail: impl Into<String>) -> Self {
        AccessError::Internal(detail.into())
    }
}
