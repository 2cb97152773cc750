//! Request compiler
//!
//! Turns a `ParsedRequest` into builder calls. The order of application is
//! fixed, so the same request always yields the same clause tree no matter
//! how its parameters were ordered on the wire.

use quarry_core::{Boolean, CoreError, FilterCondition, Operator, QueryBuilder, SearchSpec, Value};
use quarry_parser::coerce::{coerce_ordered, normalize_date, split_list};
use quarry_parser::{ParsedRequest, SearchableFields};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Compiler options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Split unquoted multi-word search terms into one clause per word
    pub tokenize_terms: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            tokenize_terms: true,
        }
    }
}

/// Operand of one clause, resolved from a search term or filter value
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Compare(Value),
    /// LIKE patterns that must all match
    Patterns(Vec<String>),
    List(Vec<Value>),
    Range(Value, Value),
    Date(String),
    DateRange(String, String),
    Fuzzy(String, u32),
    Null,
}

/// Applies parsed requests to query builders
#[derive(Debug, Clone, Default)]
pub struct FilterQueryCompiler {
    options: CompilerOptions,
}

impl FilterQueryCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CompilerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Apply `request` to `query`
    pub fn compile(&self, request: &ParsedRequest, query: QueryBuilder) -> Result<QueryBuilder> {
        let mut query = query;

        if let Some(search) = &request.search {
            query = self.apply_search(search, &request.search_fields, query);
        }

        for condition in &request.filters {
            query = apply_condition(query, condition, Boolean::And)?;
        }

        for group in &request.or_groups {
            let mut inner = query.reset();
            for condition in group {
                inner = apply_condition(inner, condition, Boolean::Or)?;
            }
            query = query.where_group(Boolean::And, |_| inner);
        }

        for order in &request.order {
            query = query.order_by(order.field.clone(), order.direction);
        }

        for relation in &request.with {
            query = query.with_relation(relation.clone());
        }

        debug!(
            table = query.table(),
            clauses = query.clauses().len(),
            orders = query.orders().len(),
            relations = query.relations().len(),
            "Compiled request"
        );

        Ok(query)
    }

    /// One AND-joined group: the first field clause is AND, the rest use the
    /// search combinator
    fn apply_search(
        &self,
        search: &SearchSpec,
        fields: &SearchableFields,
        query: QueryBuilder,
    ) -> QueryBuilder {
        let mut group = query.reset();
        let mut applied = 0usize;

        for (path, operator) in fields.iter() {
            let Some(term) = search.term_for(path) else {
                continue;
            };
            let Some(operand) = self.search_operand(
                operator,
                term,
                search.is_phrase(path),
                search.fuzzy_distance(path),
            ) else {
                debug!(field = path, operator = %operator, "Skipping unusable search term");
                continue;
            };

            let boolean = if applied == 0 {
                Boolean::And
            } else {
                search.combinator
            };
            group = apply_on_path(group, path, operator, operand, boolean);
            applied += 1;
        }

        query.where_group(Boolean::And, |_| group)
    }

    fn search_operand(
        &self,
        operator: Operator,
        term: &str,
        phrase: bool,
        fuzzy: Option<u32>,
    ) -> Option<Operand> {
        if let Some(distance) = fuzzy {
            return Some(Operand::Fuzzy(term.to_string(), distance));
        }

        match operator {
            Operator::Like | Operator::Ilike | Operator::NotLike => {
                if phrase {
                    return Some(Operand::Patterns(vec![contains_pattern(&escape_like(term))]));
                }
                let words: Vec<&str> = term.split_whitespace().collect();
                if self.options.tokenize_terms && words.len() > 1 {
                    Some(Operand::Patterns(
                        words.into_iter().map(contains_pattern).collect(),
                    ))
                } else {
                    Some(Operand::Patterns(vec![contains_pattern(term.trim())]))
                }
            }
            Operator::Eq | Operator::Ne => Some(Operand::Compare(Value::String(term.to_string()))),
            Operator::Gt | Operator::Lt | Operator::Gte | Operator::Lte => {
                coerce_ordered(term).map(Operand::Compare)
            }
            Operator::In | Operator::NotIn => {
                let values: Vec<Value> = split_list(term).into_iter().map(Value::String).collect();
                (!values.is_empty()).then_some(Operand::List(values))
            }
            Operator::Between | Operator::NotBetween => match split_list(term).as_slice() {
                [low, high] => Some(Operand::Range(coerce_ordered(low)?, coerce_ordered(high)?)),
                _ => None,
            },
            Operator::DateEq => normalize_date(term).map(Operand::Date),
            Operator::DateBetween => match split_list(term).as_slice() {
                [single] => {
                    let date = normalize_date(single)?;
                    Some(Operand::DateRange(date.clone(), date))
                }
                [low, high] => Some(Operand::DateRange(normalize_date(low)?, normalize_date(high)?)),
                _ => None,
            },
            Operator::Exists | Operator::NotExists => None,
        }
    }
}

/// Apply one filter condition joined with `boolean`
fn apply_condition(
    query: QueryBuilder,
    condition: &FilterCondition,
    boolean: Boolean,
) -> Result<QueryBuilder> {
    let operand = filter_operand(condition)?;
    Ok(apply_on_path(
        query,
        &condition.path,
        condition.operator,
        operand,
        boolean,
    ))
}

fn filter_operand(condition: &FilterCondition) -> Result<Operand> {
    let invalid = |message: &str| CoreError::InvalidCondition {
        path: condition.path.clone(),
        message: message.to_string(),
    };

    let operand = match condition.operator {
        Operator::Exists | Operator::NotExists => Operand::Null,
        Operator::In | Operator::NotIn => Operand::List(
            condition
                .value
                .as_array()
                .ok_or_else(|| invalid("expected a list"))?
                .to_vec(),
        ),
        Operator::Between | Operator::NotBetween => match condition.value.as_array() {
            Some([low, high]) => Operand::Range(low.clone(), high.clone()),
            _ => return Err(invalid("expected two bounds").into()),
        },
        Operator::DateEq => Operand::Date(
            condition
                .value
                .as_str()
                .ok_or_else(|| invalid("expected a date"))?
                .to_string(),
        ),
        Operator::DateBetween => match condition.value.as_array() {
            Some([Value::String(low), Value::String(high)]) => {
                Operand::DateRange(low.clone(), high.clone())
            }
            _ => return Err(invalid("expected two dates").into()),
        },
        _ => Operand::Compare(condition.value.clone()),
    };
    Ok(operand)
}

/// Apply an operand to a column, or inside an existence subquery when the
/// path names a relation
fn apply_on_path(
    query: QueryBuilder,
    path: &str,
    operator: Operator,
    operand: Operand,
    boolean: Boolean,
) -> QueryBuilder {
    match path.rsplit_once('.') {
        Some((relation, column)) => {
            let inner = apply_operand(query.reset(), column, operator, operand, Boolean::And);
            query.where_has(relation, boolean, |_| inner)
        }
        None => apply_operand(query, path, operator, operand, boolean),
    }
}

fn apply_operand(
    query: QueryBuilder,
    column: &str,
    operator: Operator,
    operand: Operand,
    boolean: Boolean,
) -> QueryBuilder {
    match operand {
        Operand::Compare(value) => query.where_cmp(column, operator, value, boolean),
        Operand::Patterns(patterns) if patterns.len() == 1 => {
            let pattern = patterns.into_iter().next().unwrap_or_default();
            query.where_cmp(column, operator, pattern, boolean)
        }
        Operand::Patterns(patterns) => query.where_group(boolean, |group| {
            patterns.into_iter().fold(group, |g, pattern| {
                g.where_cmp(column, operator, pattern, Boolean::And)
            })
        }),
        Operand::List(values) if operator == Operator::NotIn => {
            query.where_not_in(column, values, boolean)
        }
        Operand::List(values) => query.where_in(column, values, boolean),
        Operand::Range(low, high) if operator == Operator::NotBetween => {
            query.where_not_between(column, low, high, boolean)
        }
        Operand::Range(low, high) => query.where_between(column, low, high, boolean),
        Operand::Date(date) => query.where_date(column, Operator::DateEq, date, boolean),
        Operand::DateRange(low, high) => query.where_group(boolean, |group| {
            group
                .where_date(column, Operator::Gte, low, Boolean::And)
                .where_date(column, Operator::Lte, high, Boolean::And)
        }),
        Operand::Fuzzy(term, distance) => query.where_fuzzy(column, term, distance, boolean),
        Operand::Null if operator == Operator::Exists => query.where_not_null(column, boolean),
        Operand::Null => query.where_null(column, boolean),
    }
}

fn contains_pattern(term: &str) -> String {
    format!("%{}%", term)
}

/// Escape LIKE wildcards so a phrase matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::Clause;

    fn compiler() -> FilterQueryCompiler {
        FilterQueryCompiler::new()
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_search_operand_tokenizes_words() {
        let operand = compiler().search_operand(Operator::Like, "john doe", false, None);
        assert_eq!(
            operand,
            Some(Operand::Patterns(vec!["%john%".to_string(), "%doe%".to_string()]))
        );

        let untokenized = FilterQueryCompiler::with_options(CompilerOptions {
            tokenize_terms: false,
        })
        .search_operand(Operator::Like, "john doe", false, None);
        assert_eq!(
            untokenized,
            Some(Operand::Patterns(vec!["%john doe%".to_string()]))
        );
    }

    #[test]
    fn test_search_operand_phrase_not_tokenized() {
        let operand = compiler().search_operand(Operator::Like, "100% cotton", true, None);
        assert_eq!(
            operand,
            Some(Operand::Patterns(vec!["%100\\% cotton%".to_string()]))
        );
    }

    #[test]
    fn test_search_operand_rejects_bad_range() {
        assert_eq!(compiler().search_operand(Operator::Between, "1", false, None), None);
        assert_eq!(compiler().search_operand(Operator::Gt, "abc", false, None), None);
        assert_eq!(compiler().search_operand(Operator::Exists, "x", false, None), None);
    }

    #[test]
    fn test_fuzzy_wins_over_operator() {
        let operand = compiler().search_operand(Operator::Like, "jon", false, Some(1));
        assert_eq!(operand, Some(Operand::Fuzzy("jon".to_string(), 1)));
    }

    #[test]
    fn test_relation_path_uses_has() {
        let query = apply_on_path(
            QueryBuilder::new("users"),
            "roles.name",
            Operator::Eq,
            Operand::Compare(Value::from("admin")),
            Boolean::And,
        );
        match &query.clauses()[0] {
            Clause::Has {
                relation, clauses, ..
            } => {
                assert_eq!(relation, "roles");
                assert_eq!(clauses.len(), 1);
                assert_eq!(clauses[0].field(), Some("name"));
            }
            other => panic!("Expected Has, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_condition_is_error() {
        let condition = FilterCondition {
            path: "age".to_string(),
            operator: Operator::Between,
            value: Value::from("1"),
            boolean: Boolean::And,
        };
        assert!(apply_condition(QueryBuilder::new("users"), &condition, Boolean::And).is_err());
    }
}
