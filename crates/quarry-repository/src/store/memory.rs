//! In-memory record store

use async_trait::async_trait;
use quarry_core::{QueryBuilder, Record, Value};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

use super::eval::{matches, sort_records};
use super::RecordStore;
use crate::error::RepositoryResult;

#[derive(Debug, Default)]
struct MemoryTables {
    rows: HashMap<String, Vec<Record>>,
    /// Keys of each table holding embedded related records
    relations: HashMap<String, HashSet<String>>,
}

/// Record store holding every table in memory
///
/// Related records are embedded in their parent row: an object for a to-one
/// relation, an array of objects for a to-many relation. Relation keys are
/// only returned when the query eager loads them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<MemoryTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `table` with rows
    pub fn with_records(mut self, table: &str, records: Vec<Record>) -> Self {
        self.tables
            .get_mut()
            .rows
            .entry(table.to_string())
            .or_default()
            .extend(records);
        self
    }

    /// Seed `table` from JSON objects; non-object values are skipped
    pub fn with_json(self, table: &str, rows: Vec<serde_json::Value>) -> Self {
        let records = rows
            .into_iter()
            .filter_map(|row| match Value::from(row) {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        self.with_records(table, records)
    }

    /// Declare the embedded relation keys of `table`
    pub fn with_relations<I, S>(mut self, table: &str, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables
            .get_mut()
            .relations
            .entry(table.to_string())
            .or_default()
            .extend(relations.into_iter().map(Into::into));
        self
    }

    /// Number of rows currently stored in `table`
    pub async fn len(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.rows.get(table).map_or(0, Vec::len)
    }

    fn filter(rows: &[Record], query: &QueryBuilder) -> RepositoryResult<Vec<Record>> {
        let mut matched = Vec::new();
        for row in rows {
            if matches(row, query.clauses())? {
                matched.push(row.clone());
            }
        }
        Ok(matched)
    }

    fn shape(record: Record, query: &QueryBuilder, relations: Option<&HashSet<String>>) -> Record {
        let loaded: HashSet<&str> = query
            .relations()
            .iter()
            .filter_map(|path| path.split('.').next())
            .collect();
        let columns = query.columns();

        record
            .into_iter()
            .filter(|(key, _)| {
                let is_relation = relations.is_some_and(|r| r.contains(key));
                if is_relation {
                    loaded.contains(key.as_str())
                } else {
                    columns.is_empty() || columns.iter().any(|c| c == key)
                }
            })
            .collect()
    }
}

fn next_id(rows: &[Record], primary_key: &str) -> Value {
    let max = rows
        .iter()
        .filter_map(|row| row.get(primary_key).and_then(Value::as_f64))
        .fold(0.0, f64::max);
    Value::Number(max.floor() + 1.0)
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, query: &QueryBuilder) -> RepositoryResult<Vec<Record>> {
        let tables = self.tables.read().await;
        let Some(rows) = tables.rows.get(query.table()) else {
            return Ok(Vec::new());
        };

        let mut matched = Self::filter(rows, query)?;
        sort_records(&mut matched, query.orders());

        let offset = query.offset_value().unwrap_or(0);
        let limit = query.limit_value().unwrap_or(usize::MAX);
        let relations = tables.relations.get(query.table());

        let result: Vec<Record> = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| Self::shape(row, query, relations))
            .collect();

        debug!(table = query.table(), rows = result.len(), "Executed query");
        Ok(result)
    }

    async fn count(&self, query: &QueryBuilder) -> RepositoryResult<usize> {
        let tables = self.tables.read().await;
        match tables.rows.get(query.table()) {
            Some(rows) => Ok(Self::filter(rows, query)?.len()),
            None => Ok(0),
        }
    }

    async fn insert(
        &self,
        table: &str,
        primary_key: &str,
        mut record: Record,
    ) -> RepositoryResult<Record> {
        let mut tables = self.tables.write().await;
        let rows = tables.rows.entry(table.to_string()).or_default();

        if record.get(primary_key).map_or(true, Value::is_null) {
            record.insert(primary_key.to_string(), next_id(rows, primary_key));
        }
        rows.push(record.clone());

        debug!(table, "Inserted record");
        Ok(record)
    }

    async fn update(
        &self,
        table: &str,
        primary_key: &str,
        id: &Value,
        attributes: Record,
    ) -> RepositoryResult<Option<Record>> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.rows.get_mut(table) else {
            return Ok(None);
        };
        let Some(row) = rows
            .iter_mut()
            .find(|row| row.get(primary_key).is_some_and(|pk| pk.loose_eq(id)))
        else {
            return Ok(None);
        };

        for (key, value) in attributes {
            if key != primary_key {
                row.insert(key, value);
            }
        }
        Ok(Some(row.clone()))
    }

    async fn delete(&self, table: &str, primary_key: &str, id: &Value) -> RepositoryResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.rows.get_mut(table) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|row| !row.get(primary_key).is_some_and(|pk| pk.loose_eq(id)));
        Ok(rows.len() < before)
    }

    async fn delete_where(&self, query: &QueryBuilder) -> RepositoryResult<usize> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.rows.get_mut(query.table()) else {
            return Ok(0);
        };

        let mut doomed = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            doomed.push(matches(row, query.clauses())?);
        }
        let removed = doomed.iter().filter(|hit| **hit).count();

        let mut flags = doomed.into_iter();
        rows.retain(|_| !flags.next().unwrap_or(false));

        debug!(table = query.table(), removed, "Deleted records");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::{Boolean, Direction};
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_json(
                "users",
                vec![
                    json!({ "id": 1, "name": "Alice", "age": 31, "roles": [{ "name": "admin" }] }),
                    json!({ "id": 2, "name": "Bob", "age": 25, "roles": [] }),
                    json!({ "id": 3, "name": "Carol", "age": 40, "roles": [{ "name": "editor" }] }),
                ],
            )
            .with_relations("users", ["roles"])
    }

    #[tokio::test]
    async fn test_get_filters_sorts_and_pages() {
        let store = store();
        let query = QueryBuilder::new("users")
            .where_cmp("age", quarry_core::Operator::Gt, 26i64, Boolean::And)
            .order_by("age", Direction::Desc)
            .limit(1);

        let rows = store.get(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], Value::from("Carol"));
        assert_eq!(store.count(&query).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_relations_loaded_on_request() {
        let store = store();
        let plain = store.get(&QueryBuilder::new("users")).await.unwrap();
        assert!(!plain[0].contains_key("roles"));

        let eager = store
            .get(&QueryBuilder::new("users").with_relation("roles"))
            .await
            .unwrap();
        assert!(eager[0].contains_key("roles"));
    }

    #[tokio::test]
    async fn test_relation_filter_sees_unloaded_relation() {
        let store = store();
        let query = QueryBuilder::new("users")
            .where_has("roles", Boolean::And, |q| q.where_eq("name", "admin"));
        let rows = store.get(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], Value::Number(1.0));
    }

    #[tokio::test]
    async fn test_select_projects_columns() {
        let store = store();
        let rows = store
            .get(&QueryBuilder::new("users").select(["name"]))
            .await
            .unwrap();
        assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["name"]);
    }

    #[tokio::test]
    async fn test_writes() {
        let store = store();
        let mut record = Record::new();
        record.insert("name".to_string(), Value::from("Dave"));

        let created = store.insert("users", "id", record).await.unwrap();
        assert_eq!(created["id"], Value::Number(4.0));

        let mut attrs = Record::new();
        attrs.insert("age".to_string(), Value::from(50i64));
        let updated = store
            .update("users", "id", &Value::from("4"), attrs)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["age"], Value::Number(50.0));

        assert!(store.delete("users", "id", &Value::from(4i64)).await.unwrap());
        assert!(!store.delete("users", "id", &Value::from(4i64)).await.unwrap());

        let removed = store
            .delete_where(&QueryBuilder::new("users").where_cmp(
                "age",
                quarry_core::Operator::Lt,
                35i64,
                Boolean::And,
            ))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.len("users").await, 1);
    }

    #[tokio::test]
    async fn test_missing_table_is_empty() {
        let store = MemoryStore::new();
        assert!(store.get(&QueryBuilder::new("posts")).await.unwrap().is_empty());
        assert_eq!(store.count(&QueryBuilder::new("posts")).await.unwrap(), 0);
    }
}
