//! Query construction

pub mod builder;
pub mod clause;
pub mod sql;

pub use builder::{Direction, OrderSpec, QueryBuilder};
pub use clause::Clause;
pub use sql::SqlRenderer;
