//! Parser error types

use quarry_core::CoreError;
use thiserror::Error;

/// Parser error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A `searchFields` override resolved to no usable field
    #[error("None of the search fields were accepted: {fields}. Accepted operators are: {accepted}")]
    InvalidSearchFields { fields: String, accepted: String },

    /// Invalid operator in parser configuration
    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    /// Core model error
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for parser operations
pub type Result<T> = std::result::Result<T, ParseError>;
