//! AST error types

use explode_foundation::ExplodeError;
use thiserror::Error;

/// AST operation errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AstError {
    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Unsupported syntax: {feature}")]
    UnsupportedSyntax { feature: String },
}

impl AstError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn unsupported_syntax(feature: impl Into<String>) -> Self {
        Self::UnsupportedSyntax {
            feature: feature.into(),
        }
    }
}

impl From<AstError> for ExplodeError {
    fn from(err: AstError) -> Self {
        match err {
            AstError::Parse { message } => ExplodeError::parse(message),
            AstError::UnsupportedSyntax { feature } => ExplodeError::not_supported(feature),
        }
    }
}

/// Result type alias for AST operations
pub type AstResult<T> = Result<T, AstError>;
