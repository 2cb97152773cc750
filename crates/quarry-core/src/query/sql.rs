//! SQL rendering of a built query
//!
//! Produces parameterized SQL (`?` placeholders plus a binding list) or, for
//! logs and tests, SQL with literals inlined. Relation subqueries are rendered
//! as `EXISTS (SELECT 1 FROM <relation> WHERE ...)`; correlating them with the
//! parent row is left to the store that owns the schema.

use super::builder::QueryBuilder;
use super::clause::Clause;
use crate::condition::Operator;
use crate::error::{CoreError, Result};
use crate::types::Value;

/// Renders `QueryBuilder` values as SQL
#[derive(Debug, Default)]
pub struct SqlRenderer {
    inline: bool,
    bindings: Vec<Value>,
}

impl SqlRenderer {
    /// Render with `?` placeholders, returning the SQL and its bindings
    pub fn render(query: &QueryBuilder) -> Result<(String, Vec<Value>)> {
        let mut renderer = SqlRenderer::default();
        let sql = renderer.build_sql(query)?;
        Ok((sql, renderer.bindings))
    }

    /// Render with literal values inlined
    pub fn render_inline(query: &QueryBuilder) -> Result<String> {
        let mut renderer = SqlRenderer {
            inline: true,
            bindings: Vec::new(),
        };
        renderer.build_sql(query)
    }

    /// Render only the WHERE tree (without the `WHERE` keyword), literals inlined
    pub fn render_where(clauses: &[Clause]) -> Result<String> {
        let mut renderer = SqlRenderer {
            inline: true,
            bindings: Vec::new(),
        };
        renderer.build_clauses(clauses)
    }

    fn build_sql(&mut self, query: &QueryBuilder) -> Result<String> {
        let mut sql = String::from("SELECT ");

        if query.columns().is_empty() {
            sql.push('*');
        } else {
            let columns = query
                .columns()
                .iter()
                .map(|c| identifier(c))
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(&columns.join(", "));
        }

        sql.push_str(&format!(" FROM {}", identifier(query.table())?));

        if !query.clauses().is_empty() {
            sql.push_str(" WHERE ");
            let where_sql = self.build_clauses(query.clauses())?;
            sql.push_str(&where_sql);
        }

        if !query.orders().is_empty() {
            let orders = query
                .orders()
                .iter()
                .map(|o| Ok(format!("{} {}", identifier(&o.field)?, o.direction)))
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
        }

        if let Some(limit) = query.limit_value() {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        if let Some(offset) = query.offset_value() {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        Ok(sql)
    }

    fn build_clauses(&mut self, clauses: &[Clause]) -> Result<String> {
        let mut sql = String::new();
        for (i, clause) in clauses.iter().enumerate() {
            if i > 0 {
                sql.push(' ');
                sql.push_str(clause.boolean().as_sql());
                sql.push(' ');
            }
            let rendered = self.build_clause(clause)?;
            sql.push_str(&rendered);
        }
        Ok(sql)
    }

    fn build_clause(&mut self, clause: &Clause) -> Result<String> {
        let sql = match clause {
            Clause::Compare {
                field,
                operator,
                value,
                ..
            } => {
                let symbol = operator.sql_symbol().ok_or_else(|| {
                    CoreError::InvalidOperator(format!("{} is not a comparison", operator))
                })?;
                format!("{} {} {}", identifier(field)?, symbol, self.bind(value))
            }
            Clause::In {
                field,
                values,
                negated,
                ..
            } => {
                if values.is_empty() {
                    // IN () is not valid SQL
                    let always = if *negated { "1 = 1" } else { "1 = 0" };
                    always.to_string()
                } else {
                    let placeholders: Vec<String> = values.iter().map(|v| self.bind(v)).collect();
                    format!(
                        "{} {}IN ({})",
                        identifier(field)?,
                        if *negated { "NOT " } else { "" },
                        placeholders.join(", ")
                    )
                }
            }
            Clause::Between {
                field,
                low,
                high,
                negated,
                ..
            } => format!(
                "{} {}BETWEEN {} AND {}",
                identifier(field)?,
                if *negated { "NOT " } else { "" },
                self.bind(low),
                self.bind(high)
            ),
            Clause::Null { field, negated, .. } => format!(
                "{} IS {}NULL",
                identifier(field)?,
                if *negated { "NOT " } else { "" }
            ),
            Clause::Date {
                field,
                operator,
                date,
                ..
            } => {
                let symbol = match operator {
                    Operator::DateEq => "=",
                    other => other.sql_symbol().ok_or_else(|| {
                        CoreError::InvalidOperator(format!("{} on a date", other))
                    })?,
                };
                let date = Value::String(date.clone());
                format!("DATE({}) {} {}", identifier(field)?, symbol, self.bind(&date))
            }
            Clause::Fuzzy {
                field,
                term,
                distance,
                ..
            } => {
                let term = Value::String(term.clone());
                format!(
                    "levenshtein({}, {}) <= {}",
                    identifier(field)?,
                    self.bind(&term),
                    distance
                )
            }
            Clause::Group { clauses, .. } => format!("({})", self.build_clauses(clauses)?),
            Clause::Has {
                relation,
                clauses,
                negated,
                ..
            } => {
                let segments: Vec<&str> = relation.split('.').collect();
                let mut inner = if clauses.is_empty() {
                    String::new()
                } else {
                    self.build_clauses(clauses)?
                };
                // Innermost relation first so nested paths read outside-in
                for (depth, segment) in segments.iter().enumerate().rev() {
                    let table = identifier(segment)?;
                    inner = if inner.is_empty() {
                        format!("EXISTS (SELECT 1 FROM {})", table)
                    } else {
                        format!("EXISTS (SELECT 1 FROM {} WHERE {})", table, inner)
                    };
                    if depth == 0 && *negated {
                        inner = format!("NOT {}", inner);
                    }
                }
                inner
            }
        };
        Ok(sql)
    }

    fn bind(&mut self, value: &Value) -> String {
        if self.inline {
            value.to_string()
        } else {
            self.bindings.push(value.clone());
            "?".to_string()
        }
    }
}

/// Validate a (possibly table-qualified) identifier
fn identifier(name: &str) -> Result<String> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !name.starts_with('.')
        && !name.ends_with('.');
    if valid {
        Ok(name.to_string())
    } else {
        Err(CoreError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Boolean;
    use crate::query::Direction;

    #[test]
    fn test_render_placeholders() {
        let query = QueryBuilder::new("users")
            .where_eq("status", "active")
            .where_in("role", vec!["admin".into(), "staff".into()], Boolean::And)
            .order_by("name", Direction::Asc)
            .limit(10)
            .offset(20);

        let (sql, bindings) = SqlRenderer::render(&query).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM users WHERE status = ? AND role IN (?, ?) ORDER BY name ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings[0], Value::from("active"));
    }

    #[test]
    fn test_render_group_and_null() {
        let query = QueryBuilder::new("users")
            .where_group(Boolean::And, |q| {
                q.where_cmp("name", Operator::Like, "%foo%", Boolean::And)
                    .where_cmp("email", Operator::Like, "%foo%", Boolean::Or)
            })
            .where_null("deleted_at", Boolean::And);

        assert_eq!(
            SqlRenderer::render_inline(&query).unwrap(),
            "SELECT * FROM users WHERE (name LIKE '%foo%' OR email LIKE '%foo%') AND deleted_at IS NULL"
        );
    }

    #[test]
    fn test_render_nested_relation() {
        let query = QueryBuilder::new("users").where_has("company.country", Boolean::And, |q| {
            q.where_eq("code", "NL")
        });

        assert_eq!(
            SqlRenderer::render_where(query.clauses()).unwrap(),
            "EXISTS (SELECT 1 FROM company WHERE EXISTS (SELECT 1 FROM country WHERE code = 'NL'))"
        );
    }

    #[test]
    fn test_render_negated_relation() {
        let query =
            QueryBuilder::new("users").where_doesnt_have("roles", Boolean::And, |q| q);
        assert_eq!(
            SqlRenderer::render_where(query.clauses()).unwrap(),
            "NOT EXISTS (SELECT 1 FROM roles)"
        );
    }

    #[test]
    fn test_render_date_and_fuzzy() {
        let query = QueryBuilder::new("posts")
            .where_date("created_at", Operator::DateEq, "2024-03-01", Boolean::And)
            .where_fuzzy("title", "rust", 2, Boolean::And);

        assert_eq!(
            SqlRenderer::render_where(query.clauses()).unwrap(),
            "DATE(created_at) = '2024-03-01' AND levenshtein(title, 'rust') <= 2"
        );
    }

    #[test]
    fn test_render_empty_in() {
        let query = QueryBuilder::new("users")
            .where_in("id", vec![], Boolean::And)
            .where_not_in("id", vec![], Boolean::And);
        assert_eq!(
            SqlRenderer::render_where(query.clauses()).unwrap(),
            "1 = 0 AND 1 = 1"
        );
    }

    #[test]
    fn test_rejects_invalid_identifier() {
        let query = QueryBuilder::new("users").where_eq("name; DROP TABLE users", "x");
        assert!(matches!(
            SqlRenderer::render(&query),
            Err(CoreError::InvalidIdentifier(_))
        ));
    }
}
