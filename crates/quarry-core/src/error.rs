//! Error types for Quarry Core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid condition on '{path}': {message}")]
    InvalidCondition { path: String, message: String },

    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Criterion '{name}' failed: {message}")]
    Criterion { name: String, message: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
