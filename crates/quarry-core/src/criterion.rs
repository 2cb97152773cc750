//! The criterion capability
//!
//! A criterion is one composable narrowing step a repository applies to its
//! query builder before every read. Criteria are immutable once built and
//! must produce the same clauses every time they are applied, because the
//! repository rebuilds its builder for each call.

use std::any::{type_name, TypeId};
use std::fmt;

use crate::error::Result;
use crate::query::QueryBuilder;

/// A composable query modifier
pub trait Criterion: Send + Sync + 'static {
    /// Narrow `query` and hand it back
    fn apply(&self, query: QueryBuilder) -> Result<QueryBuilder>;

    /// Type identity used when the criterion is serialized into a cache key
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    /// Embedded configuration used when the criterion is serialized into a
    /// cache key. Two criteria of the same type with different parameters
    /// must return different fingerprints.
    fn fingerprint(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Whether reads under this criterion must bypass the result cache
    fn bypasses_cache(&self) -> bool {
        false
    }

    /// Concrete type of the criterion, for removal by type
    fn type_key(&self) -> TypeId {
        TypeId::of::<Self>()
    }
}

impl dyn Criterion {
    /// Whether this criterion is of concrete type `C`
    pub fn is<C: Criterion>(&self) -> bool {
        self.type_key() == TypeId::of::<C>()
    }

    /// Whether both criteria have the same concrete type
    pub fn same_type(&self, other: &dyn Criterion) -> bool {
        self.type_key() == other.type_key()
    }
}

impl fmt::Debug for dyn Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Criterion")
            .field("name", &self.name())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Ad-hoc criterion wrapping a closure
///
/// The label is part of the cache identity, so two closures doing different
/// things must carry different labels.
pub struct ClosureCriterion<F> {
    label: String,
    f: F,
}

impl<F> ClosureCriterion<F>
where
    F: Fn(QueryBuilder) -> QueryBuilder + Send + Sync + 'static,
{
    pub fn new(label: impl Into<String>, f: F) -> Self {
        Self {
            label: label.into(),
            f,
        }
    }
}

impl<F> Criterion for ClosureCriterion<F>
where
    F: Fn(QueryBuilder) -> QueryBuilder + Send + Sync + 'static,
{
    fn apply(&self, query: QueryBuilder) -> Result<QueryBuilder> {
        Ok((self.f)(query))
    }

    fn name(&self) -> &str {
        "closure"
    }

    fn fingerprint(&self) -> serde_json::Value {
        serde_json::json!({ "label": self.label, "type": type_name::<F>() })
    }
}
