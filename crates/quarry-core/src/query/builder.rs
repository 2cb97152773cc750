//! Backend-agnostic query builder
//!
//! `QueryBuilder` records the shape of a read: the WHERE tree, ordering,
//! relations to eager load, projected columns and paging. Criteria take a
//! builder by value and hand back a narrowed one; a record store executes the
//! final builder.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::clause::Clause;
use crate::condition::{Boolean, Operator};
use crate::types::Value;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Parse `asc`/`desc` (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(Direction::Asc),
            "desc" => Some(Direction::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One ORDER BY entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub field: String,
    pub direction: Direction,
}

impl OrderSpec {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Query under construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryBuilder {
    table: String,
    clauses: Vec<Clause>,
    orders: Vec<OrderSpec>,
    relations: Vec<String>,
    columns: Vec<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl QueryBuilder {
    /// Create an unconstrained builder over `table`
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            clauses: Vec::new(),
            orders: Vec::new(),
            relations: Vec::new(),
            columns: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Fresh builder over the same table
    pub fn reset(&self) -> Self {
        Self::new(self.table.clone())
    }

    // Condition clauses

    /// Binary comparison (`eq` .. `lte` and the LIKE family)
    pub fn where_cmp(
        self,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
        boolean: Boolean,
    ) -> Self {
        self.push(Clause::Compare {
            field: field.into(),
            operator,
            value: value.into(),
            boolean,
        })
    }

    /// `field = value` joined with AND
    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_cmp(field, Operator::Eq, value, Boolean::And)
    }

    /// `field = value` joined with OR
    pub fn or_where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_cmp(field, Operator::Eq, value, Boolean::Or)
    }

    pub fn where_in(self, field: impl Into<String>, values: Vec<Value>, boolean: Boolean) -> Self {
        self.push(Clause::In {
            field: field.into(),
            values,
            negated: false,
            boolean,
        })
    }

    pub fn where_not_in(
        self,
        field: impl Into<String>,
        values: Vec<Value>,
        boolean: Boolean,
    ) -> Self {
        self.push(Clause::In {
            field: field.into(),
            values,
            negated: true,
            boolean,
        })
    }

    pub fn where_between(
        self,
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
        boolean: Boolean,
    ) -> Self {
        self.push(Clause::Between {
            field: field.into(),
            low: low.into(),
            high: high.into(),
            negated: false,
            boolean,
        })
    }

    pub fn where_not_between(
        self,
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
        boolean: Boolean,
    ) -> Self {
        self.push(Clause::Between {
            field: field.into(),
            low: low.into(),
            high: high.into(),
            negated: true,
            boolean,
        })
    }

    pub fn where_null(self, field: impl Into<String>, boolean: Boolean) -> Self {
        self.push(Clause::Null {
            field: field.into(),
            negated: false,
            boolean,
        })
    }

    pub fn where_not_null(self, field: impl Into<String>, boolean: Boolean) -> Self {
        self.push(Clause::Null {
            field: field.into(),
            negated: true,
            boolean,
        })
    }

    /// Compare the calendar date part of `field` with `date` (`YYYY-MM-DD`)
    pub fn where_date(
        self,
        field: impl Into<String>,
        operator: Operator,
        date: impl Into<String>,
        boolean: Boolean,
    ) -> Self {
        self.push(Clause::Date {
            field: field.into(),
            operator,
            date: date.into(),
            boolean,
        })
    }

    /// Approximate match; the store decides how distance is measured
    pub fn where_fuzzy(
        self,
        field: impl Into<String>,
        term: impl Into<String>,
        distance: u32,
        boolean: Boolean,
    ) -> Self {
        self.push(Clause::Fuzzy {
            field: field.into(),
            term: term.into(),
            distance,
            boolean,
        })
    }

    /// Parenthesized group built by `f`; an empty group adds nothing
    pub fn where_group<F>(self, boolean: Boolean, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let inner = f(self.reset());
        if inner.clauses.is_empty() {
            return self;
        }
        self.push(Clause::Group {
            clauses: inner.clauses,
            boolean,
        })
    }

    /// Existence subquery over `relation` (dotted paths allowed)
    pub fn where_has<F>(self, relation: impl Into<String>, boolean: Boolean, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.push_has(relation.into(), boolean, false, f)
    }

    /// Negated existence subquery
    pub fn where_doesnt_have<F>(self, relation: impl Into<String>, boolean: Boolean, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.push_has(relation.into(), boolean, true, f)
    }

    fn push_has<F>(self, relation: String, boolean: Boolean, negated: bool, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let table = relation.rsplit('.').next().unwrap_or(&relation).to_string();
        let inner = f(QueryBuilder::new(table));
        self.push(Clause::Has {
            relation,
            clauses: inner.clauses,
            negated,
            boolean,
        })
    }

    fn push(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    // Shaping

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.orders.push(OrderSpec::new(field, direction));
        self
    }

    /// Eager load a relation path; duplicates are ignored
    pub fn with_relation(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        if !self.relations.contains(&path) {
            self.relations.push(path);
        }
        self
    }

    /// Restrict the returned columns
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Drop paging, keeping conditions (used for counting)
    pub fn without_paging(mut self) -> Self {
        self.limit = None;
        self.offset = None;
        self
    }

    // Accessors

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn orders(&self) -> &[OrderSpec] {
        &self.orders
    }

    pub fn relations(&self) -> &[String] {
        &self.relations
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<usize> {
        self.offset
    }

    /// True when no clause, ordering, relation or paging was recorded
    pub fn is_unconstrained(&self) -> bool {
        self.clauses.is_empty()
            && self.orders.is_empty()
            && self.relations.is_empty()
            && self.columns.is_empty()
            && self.limit.is_none()
            && self.offset.is_none()
    }
}
