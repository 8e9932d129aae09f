//! Error types for the Lightkeep registry store.

use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur during registry store operations.
///
/// Malformed file content is deliberately *not* represented here: a file
/// that fails to parse is recovered from by treating the collection as
/// empty for that read. Only I/O and serialization failures reach callers.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry file: {0}")]
    Read(std::io::Error),

    #[error("failed to write registry file: {0}")]
    Write(std::io::Error),

    #[error("failed to serialize registry: {0}")]
    Serialize(serde_json::Error),
}
