//! Criteria stack and named-criterion registry

use quarry_core::{Criterion, QueryBuilder};
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::error::{RepositoryError, RepositoryResult};

/// Builds a criterion from JSON parameters
pub type CriterionFactory =
    Box<dyn Fn(&serde_json::Value) -> Result<Box<dyn Criterion>, String> + Send + Sync>;

/// Named criterion factories, for criteria chosen at runtime
#[derive(Default)]
pub struct CriteriaRegistry {
    factories: HashMap<String, CriterionFactory>,
}

impl CriteriaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any previous one
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Value) -> Result<Box<dyn Criterion>, String> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&serde_json::Value) -> Result<Box<dyn Criterion>, String> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build the criterion registered under `name`
    pub fn build(&self, name: &str, params: &serde_json::Value) -> RepositoryResult<Box<dyn Criterion>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            RepositoryError::InvalidCriterion(format!("no criterion registered as '{}'", name))
        })?;
        factory(params).map_err(|message| {
            RepositoryError::InvalidCriterion(format!("'{}': {}", name, message))
        })
    }
}

impl fmt::Debug for CriteriaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("CriteriaRegistry").field("names", &names).finish()
    }
}

/// Ordered criteria a repository applies before every read
#[derive(Debug, Default)]
pub struct CriteriaStack {
    entries: Vec<Box<dyn Criterion>>,
    skipped: bool,
}

impl CriteriaStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a criterion; it applies after every criterion already pushed
    pub fn push<C: Criterion>(&mut self, criterion: C) {
        self.push_boxed(Box::new(criterion));
    }

    pub fn push_boxed(&mut self, criterion: Box<dyn Criterion>) {
        debug!(criterion = criterion.name(), position = self.entries.len(), "Pushed criterion");
        self.entries.push(criterion);
    }

    /// Build a criterion through `registry` and append it
    pub fn push_named(
        &mut self,
        registry: &CriteriaRegistry,
        name: &str,
        params: &serde_json::Value,
    ) -> RepositoryResult<()> {
        let criterion = registry.build(name, params)?;
        self.push_boxed(criterion);
        Ok(())
    }

    /// Remove the first criterion of type `C`
    pub fn pop<C: Criterion>(&mut self) -> Option<Box<dyn Criterion>> {
        let index = self.entries.iter().position(|c| c.is::<C>())?;
        Some(self.entries.remove(index))
    }

    /// Remove the first criterion with the same concrete type as `like`
    pub fn pop_like(&mut self, like: &dyn Criterion) -> Option<Box<dyn Criterion>> {
        let index = self.entries.iter().position(|c| c.same_type(like))?;
        Some(self.entries.remove(index))
    }

    /// Suspend or resume application without dropping membership
    pub fn skip(&mut self, skip: bool) {
        self.skipped = skip;
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Criterion> {
        self.entries.iter().map(|c| c.as_ref())
    }

    /// Fold every criterion over `query` in push order
    pub fn apply_all(&self, query: QueryBuilder) -> RepositoryResult<QueryBuilder> {
        if self.skipped {
            debug!(count = self.entries.len(), "Criteria skipped");
            return Ok(query);
        }

        let mut query = query;
        for criterion in &self.entries {
            query = criterion.apply(query)?;
            debug!(criterion = criterion.name(), clauses = query.clauses().len(), "Applied criterion");
        }
        Ok(query)
    }

    /// Whether any active criterion asks for the cache to be bypassed
    pub fn bypasses_cache(&self) -> bool {
        !self.skipped && self.entries.iter().any(|c| c.bypasses_cache())
    }

    /// Serialized form of the active criteria, in push order
    pub fn fingerprint(&self) -> serde_json::Value {
        if self.skipped {
            return json!([]);
        }
        serde_json::Value::Array(self.entries.iter().map(|c| describe(c.as_ref())).collect())
    }
}

/// Cache identity of one criterion: its name and embedded configuration
pub fn describe(criterion: &dyn Criterion) -> serde_json::Value {
    json!({
        "name": criterion.name(),
        "config": criterion.fingerprint(),
    })
}
