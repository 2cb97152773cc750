//! Quarry Compiler - parsed requests to query builder clauses
//!
//! This crate is the trusted half of request handling. It takes a
//! `ParsedRequest` produced by `quarry-parser` and applies it to a
//! `QueryBuilder` in a fixed order: the search group, filter conditions,
//! OR-groups, ordering, then eager loads.

pub mod compiler;
pub mod criteria;
pub mod error;

// Re-export main types
pub use compiler::{CompilerOptions, FilterQueryCompiler};
pub use criteria::RequestCriteria;
pub use error::{CompileError, Result};
