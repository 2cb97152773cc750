//! Clause tree recorded by the query builder

use serde::{Deserialize, Serialize};

use crate::condition::{Boolean, Operator};
use crate::types::Value;

/// One node of a WHERE tree
///
/// Every clause carries the connector that joins it to the clause before it
/// in the same group. The connector of the first clause of a group is kept
/// but has no effect on evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Clause {
    /// Binary comparison, including the LIKE family
    Compare {
        field: String,
        operator: Operator,
        value: Value,
        boolean: Boolean,
    },
    In {
        field: String,
        values: Vec<Value>,
        negated: bool,
        boolean: Boolean,
    },
    Between {
        field: String,
        low: Value,
        high: Value,
        negated: bool,
        boolean: Boolean,
    },
    /// `IS NULL`, or `IS NOT NULL` when negated
    Null {
        field: String,
        negated: bool,
        boolean: Boolean,
    },
    /// Calendar date comparison; `date` is `YYYY-MM-DD`
    Date {
        field: String,
        operator: Operator,
        date: String,
        boolean: Boolean,
    },
    /// Approximate match within `distance` edits
    Fuzzy {
        field: String,
        term: String,
        distance: u32,
        boolean: Boolean,
    },
    /// Parenthesized sub-tree
    Group {
        clauses: Vec<Clause>,
        boolean: Boolean,
    },
    /// Existence subquery over a (possibly dotted) relation path
    Has {
        relation: String,
        clauses: Vec<Clause>,
        negated: bool,
        boolean: Boolean,
    },
}

impl Clause {
    pub fn boolean(&self) -> Boolean {
        match self {
            Clause::Compare { boolean, .. }
            | Clause::In { boolean, .. }
            | Clause::Between { boolean, .. }
            | Clause::Null { boolean, .. }
            | Clause::Date { boolean, .. }
            | Clause::Fuzzy { boolean, .. }
            | Clause::Group { boolean, .. }
            | Clause::Has { boolean, .. } => *boolean,
        }
    }

    /// Column the clause reads, `None` for groups and relation subqueries
    pub fn field(&self) -> Option<&str> {
        match self {
            Clause::Compare { field, .. }
            | Clause::In { field, .. }
            | Clause::Between { field, .. }
            | Clause::Null { field, .. }
            | Clause::Date { field, .. }
            | Clause::Fuzzy { field, .. } => Some(field),
            Clause::Group { .. } | Clause::Has { .. } => None,
        }
    }

    /// Number of leaf clauses in this sub-tree
    pub fn leaf_count(&self) -> usize {
        match self {
            Clause::Group { clauses, .. } | Clause::Has { clauses, .. } => {
                clauses.iter().map(Clause::leaf_count).sum()
            }
            _ => 1,
        }
    }
}
