//! Normalized filter conditions

use serde::{Deserialize, Serialize};
use std::fmt;

use super::operator::Operator;
use crate::error::{CoreError, Result};
use crate::types::Value;

/// How a clause joins the clauses before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boolean {
    #[default]
    And,
    Or,
}

impl Boolean {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Boolean::And => "AND",
            Boolean::Or => "OR",
        }
    }

    /// Parse `and`/`or` (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" => Some(Boolean::And),
            "or" => Some(Boolean::Or),
            _ => None,
        }
    }
}

impl fmt::Display for Boolean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One normalized `(path, operator, value, boolean)` tuple
///
/// `path` is dot separated: the last segment is the column, any preceding
/// segments name the relation the column lives on (`roles.name`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub path: String,
    pub operator: Operator,
    pub value: Value,
    pub boolean: Boolean,
}

impl FilterCondition {
    /// Create a validated condition joined with `AND`
    pub fn new(path: impl Into<String>, operator: Operator, value: Value) -> Result<Self> {
        Self::with_boolean(path, operator, value, Boolean::And)
    }

    /// Create a validated condition with an explicit connector
    pub fn with_boolean(
        path: impl Into<String>,
        operator: Operator,
        value: Value,
        boolean: Boolean,
    ) -> Result<Self> {
        let path = path.into();
        validate(&path, operator, &value)?;
        Ok(Self {
            path,
            operator,
            value,
            boolean,
        })
    }

    /// Relation path for relation-scoped conditions (`a.b` for `a.b.field`)
    pub fn relation(&self) -> Option<&str> {
        self.path.rsplit_once('.').map(|(relation, _)| relation)
    }

    /// Column the condition compares
    pub fn field(&self) -> &str {
        self.path
            .rsplit_once('.')
            .map(|(_, field)| field)
            .unwrap_or(&self.path)
    }

    /// Copy of this condition joined with `boolean`
    pub fn joined(mut self, boolean: Boolean) -> Self {
        self.boolean = boolean;
        self
    }
}

fn invalid(path: &str, message: impl Into<String>) -> CoreError {
    CoreError::InvalidCondition {
        path: path.to_string(),
        message: message.into(),
    }
}

fn validate(path: &str, operator: Operator, value: &Value) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(path, "path must not be empty"));
    }
    if path.split('.').any(|segment| segment.trim().is_empty()) {
        return Err(invalid(path, "path contains an empty segment"));
    }

    if operator.is_list() && !matches!(value, Value::Array(_)) {
        return Err(invalid(
            path,
            format!("{} requires a list, got {}", operator, value.type_name()),
        ));
    }

    if operator.is_range() {
        match value {
            Value::Array(items) if items.len() == 2 => {}
            _ => {
                return Err(invalid(
                    path,
                    format!("{} requires exactly two values", operator),
                ))
            }
        }
    }

    if operator.is_nullary() && !value.is_null() {
        return Err(invalid(path, format!("{} carries no value", operator)));
    }

    Ok(())
}
