//! Conversion error types.

use thiserror::Error;

/// Errors that can occur while converting wire expressions into the AST.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// A required field was missing from the proto expression.
    #[error("expr {expr_id}: missing required field '{field}'")]
    MissingField { expr_id: i64, field: &'static str },

    /// The proto expression has no kind set.
    #[error("expr {expr_id}: unknown expression kind")]
    UnknownExprKind { expr_id: i64 },

    /// Comprehensions are not evaluated by this engine.
    #[error("expr {expr_id}: comprehensions are not supported")]
    UnsupportedComprehension { expr_id: i64 },

    /// A constant value is invalid or malformed.
    #[error("expr {expr_id}: invalid constant: {message}")]
    InvalidConstant { expr_id: i64, message: String },

    /// The payload could not be decoded.
    #[error("failed to decode expression: {0}")]
    Decode(#[from] prost::DecodeError),
}
