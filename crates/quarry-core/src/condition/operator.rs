//! Comparison operators accepted in filter conditions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Equal (=)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Greater than (>)
    Gt,
    /// Less than (<)
    Lt,
    /// Greater than or equal (>=)
    Gte,
    /// Less than or equal (<=)
    Lte,
    /// Case-sensitive pattern match
    Like,
    /// Case-insensitive pattern match
    Ilike,
    NotLike,
    In,
    NotIn,
    Between,
    NotBetween,
    /// Calendar date equality (time of day ignored)
    DateEq,
    /// Inclusive calendar date range
    DateBetween,
    /// Field is not null
    Exists,
    /// Field is null
    NotExists,
}

impl Operator {
    /// All operators, in declaration order
    pub const ALL: [Operator; 17] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Lt,
        Operator::Gte,
        Operator::Lte,
        Operator::Like,
        Operator::Ilike,
        Operator::NotLike,
        Operator::In,
        Operator::NotIn,
        Operator::Between,
        Operator::NotBetween,
        Operator::DateEq,
        Operator::DateBetween,
        Operator::Exists,
        Operator::NotExists,
    ];

    /// Canonical snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::Like => "like",
            Operator::Ilike => "ilike",
            Operator::NotLike => "not_like",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Between => "between",
            Operator::NotBetween => "not_between",
            Operator::DateEq => "date_eq",
            Operator::DateBetween => "date_between",
            Operator::Exists => "exists",
            Operator::NotExists => "not_exists",
        }
    }

    /// SQL spelling for operators that render as a binary comparison
    pub fn sql_symbol(&self) -> Option<&'static str> {
        match self {
            Operator::Eq | Operator::DateEq => Some("="),
            Operator::Ne => Some("!="),
            Operator::Gt => Some(">"),
            Operator::Lt => Some("<"),
            Operator::Gte => Some(">="),
            Operator::Lte => Some("<="),
            Operator::Like => Some("LIKE"),
            Operator::Ilike => Some("ILIKE"),
            Operator::NotLike => Some("NOT LIKE"),
            _ => None,
        }
    }

    /// Returns true for the LIKE family
    pub fn is_pattern(&self) -> bool {
        matches!(self, Operator::Like | Operator::Ilike | Operator::NotLike)
    }

    /// Returns true for operators taking a list value
    pub fn is_list(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    /// Returns true for operators taking a two element range
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Operator::Between | Operator::NotBetween | Operator::DateBetween
        )
    }

    /// Returns true for operators that carry no value
    pub fn is_nullary(&self) -> bool {
        matches!(self, Operator::Exists | Operator::NotExists)
    }

    /// Returns true for gt/lt/gte/lte
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            Operator::Gt | Operator::Lt | Operator::Gte | Operator::Lte
        )
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Operator::DateEq | Operator::DateBetween)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let op = match normalized.as_str() {
            "=" | "==" | "eq" => Operator::Eq,
            "!=" | "<>" | "ne" | "neq" => Operator::Ne,
            ">" | "gt" => Operator::Gt,
            "<" | "lt" => Operator::Lt,
            ">=" | "gte" | "ge" => Operator::Gte,
            "<=" | "lte" | "le" => Operator::Lte,
            "like" => Operator::Like,
            "ilike" => Operator::Ilike,
            "not_like" | "not like" | "notlike" => Operator::NotLike,
            "in" => Operator::In,
            "not_in" | "not in" | "notin" => Operator::NotIn,
            "between" => Operator::Between,
            "not_between" | "not between" => Operator::NotBetween,
            "date" | "date_eq" => Operator::DateEq,
            "date_between" => Operator::DateBetween,
            "exists" | "not_null" | "notnull" => Operator::Exists,
            "not_exists" | "null" | "is_null" => Operator::NotExists,
            _ => return Err(CoreError::InvalidOperator(s.to_string())),
        };
        Ok(op)
    }
}
