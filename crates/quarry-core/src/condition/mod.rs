//! Normalized query conditions produced by request parsing

pub mod filter;
pub mod operator;
pub mod search;

pub use filter::{Boolean, FilterCondition};
pub use operator::Operator;
pub use search::{SearchMode, SearchSpec, GLOBAL_TERM};
