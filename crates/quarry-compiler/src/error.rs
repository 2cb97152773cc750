//! Compiler error types

use quarry_core::CoreError;
use quarry_parser::ParseError;
use thiserror::Error;

/// Compiler error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Request parameters could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A condition could not be turned into a clause
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<CompileError> for CoreError {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::Core(core) => core,
            CompileError::Parse(ParseError::Core(core)) => core,
            CompileError::Parse(other) => CoreError::Criterion {
                name: "request".to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;
