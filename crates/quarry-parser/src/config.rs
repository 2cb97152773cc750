//! Parser configuration
//!
//! Parameter names and the operator allow-list are passed to the parser as an
//! explicit value; nothing is read from global state.

use quarry_core::Operator;
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, Result};

/// Names of the request parameters the parser reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamNames {
    pub search: String,
    pub search_fields: String,
    pub search_join: String,
    pub filter: String,
    pub order_by: String,
    pub sorted_by: String,
    pub with: String,
    pub skip_cache: String,
}

impl Default for ParamNames {
    fn default() -> Self {
        Self {
            search: "search".to_string(),
            search_fields: "searchFields".to_string(),
            search_join: "searchJoin".to_string(),
            filter: "filter".to_string(),
            order_by: "orderBy".to_string(),
            sorted_by: "sortedBy".to_string(),
            with: "with".to_string(),
            skip_cache: "skipCache".to_string(),
        }
    }
}

/// Parser configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Request parameter names
    pub params: ParamNames,

    /// Operators a `searchFields` override may assign
    pub accepted_operators: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            params: ParamNames::default(),
            accepted_operators: ["=", "like", "ilike", "in", "between", "date"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ParserConfig {
    /// Replace the accepted operator list
    pub fn with_accepted_operators<I, S>(mut self, operators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_operators = operators.into_iter().map(Into::into).collect();
        self
    }

    /// Resolve the accepted operator spellings
    pub fn accepted(&self) -> Result<Vec<Operator>> {
        let mut operators = Vec::with_capacity(self.accepted_operators.len());
        for spelling in &self.accepted_operators {
            let op: Operator = spelling
                .parse()
                .map_err(|_| ParseError::InvalidOperator(spelling.clone()))?;
            if !operators.contains(&op) {
                operators.push(op);
            }
        }
        Ok(operators)
    }
}
