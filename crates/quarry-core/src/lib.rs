//! Quarry Core - query model shared by the Quarry crates
//!
//! This crate provides the types every other Quarry crate builds on:
//! - `Value` for loosely typed request and record data
//! - `FilterCondition` and `SearchSpec`, the normalized output of request parsing
//! - `QueryBuilder`, the backend-agnostic condition tree criteria mutate
//! - `Criterion`, the composable unit a repository applies before every read
//! - `SqlRenderer` for turning a built query into parameterized SQL

pub mod condition;
pub mod criterion;
pub mod error;
pub mod query;
pub mod types;

// Re-export commonly used types
pub use condition::{Boolean, FilterCondition, Operator, SearchMode, SearchSpec};
pub use criterion::{ClosureCriterion, Criterion};
pub use error::{CoreError, Result};
pub use query::{Clause, Direction, OrderSpec, QueryBuilder, SqlRenderer};
pub use types::{Record, Value};
