//! Error types for the repository layer

use quarry_compiler::CompileError;
use quarry_core::CoreError;
use quarry_parser::ParseError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::validation::ValidationErrors;

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors that can occur during repository operations
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// A criterion could not be built or registered
    #[error("Invalid criterion: {0}")]
    InvalidCriterion(String),

    /// A `searchFields` override named no usable field
    #[error("Invalid search fields: {fields}. Accepted operators are: {accepted}")]
    InvalidSearchFields { fields: String, accepted: String },

    /// Lookup by primary key found nothing
    #[error("No {entity} found with id {id}")]
    UnknownEntity { entity: String, id: String },

    /// The validator rejected a write
    #[error("Validation failed: {0}")]
    ValidationFailed(ValidationErrors),

    /// Record store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Request parameter error
    #[error("Parse error: {0}")]
    Parse(ParseError),

    /// Request compilation error
    #[error("Compile error: {0}")]
    Compile(CompileError),

    /// Query model error
    #[error("Query error: {0}")]
    Core(#[from] CoreError),

    /// Result (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ParseError> for RepositoryError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::InvalidSearchFields { fields, accepted } => {
                RepositoryError::InvalidSearchFields { fields, accepted }
            }
            other => RepositoryError::Parse(other),
        }
    }
}

impl From<CompileError> for RepositoryError {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::Parse(parse) => parse.into(),
            other => RepositoryError::Compile(other),
        }
    }
}

impl RepositoryError {
    /// Whether this is a not-found condition rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::UnknownEntity { .. })
    }
}
