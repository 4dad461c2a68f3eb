//! Unified error types for the model-graph layer
//!
//! [`GddError`] covers everything that can go wrong before decomposition
//! starts: reading a model, parsing it, and structural validation. The
//! algorithm crate wraps it in its own error type.
//!
//! # Example
//!
//! ```ignore
//! use gdd_core::{GddError, GddResult};
//!
//! fn load_and_check(path: &str) -> GddResult<()> {
//!     let graph = gdd_core::load_graph(path)?;
//!     graph.validate()?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Error type for model-graph operations.
#[derive(Error, Debug)]
pub enum GddError {
    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Structural validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Convenience type alias for Results using GddError.
pub type GddResult<T> = Result<T, GddError>;

impl From<serde_json::Error> for GddError {
    fn from(err: serde_json::Error) -> Self {
        GddError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GddError::Validation("link spans one block".into());
        assert!(err.to_string().contains("Validation error"));
        assert!(err.to_string().contains("link spans one block"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GddError = io_err.into();
        assert!(matches!(err, GddError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: GddError = json_err.into();
        assert!(matches!(err, GddError::Parse(_)));
    }
}
