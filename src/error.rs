//! Error types for the IR engine.

use thiserror::Error;

use crate::analysis::verify::HygieneReport;
use crate::transpiler::Dialect;

/// The main error type for IR compilation.
#[derive(Debug, Error)]
pub enum IrError {
    /// Identifiers escaped the scope that introduced them.
    #[error("Hygiene error: {0}")]
    Hygiene(HygieneReport),

    /// The selected dialect has no valid rendering for the construct.
    #[error("{dialect} does not support {feature}")]
    Unsupported {
        dialect: Dialect,
        feature: String,
    },

    /// The tree violates a structural precondition. Indicates a bug in the
    /// producer of the tree.
    #[error("Malformed tree: {0}")]
    Malformed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IrError {
    /// Create a dialect-capability error.
    pub fn unsupported(dialect: Dialect, feature: impl Into<String>) -> Self {
        Self::Unsupported {
            dialect,
            feature: feature.into(),
        }
    }

    /// Create a malformed-tree error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// Result type alias for IR operations.
pub type IrResult<T> = Result<T, IrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IrError::unsupported(Dialect::H2, "RETURNING rows");
        assert_eq!(err.to_string(), "H2 does not support RETURNING rows");

        let err = IrError::malformed("unreduced lambda");
        assert_eq!(err.to_string(), "Malformed tree: unreduced lambda");
    }
}
