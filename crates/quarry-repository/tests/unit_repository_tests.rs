//! Unit tests for Repository reads, criteria handling and writes

use quarry_core::{Boolean, ClosureCriterion, Criterion, Direction, FilterCondition, Operator, QueryBuilder, Record, Value};
use quarry_parser::{Params, SearchableFields};
use quarry_repository::{
    EntityDescriptor, MemoryStore, RecordStore, Repository, RepositoryError, RepositoryEvent,
    RepositoryListener, ValidationErrors, WriteAction,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

// =============================================================================
// Fixtures
// =============================================================================

fn user_entity() -> EntityDescriptor {
    EntityDescriptor::new("User", "users")
        .with_searchable(
            SearchableFields::new()
                .field("name", Operator::Like)
                .field("email", Operator::Like),
        )
        .with_filterable(["status", "active", "age", "deleted_at", "created_at", "roles.name"])
}

fn users_store() -> MemoryStore {
    MemoryStore::new()
        .with_json(
            "users",
            vec![
                json!({
                    "id": 1, "name": "Alice", "email": "alice@example.com", "age": 31,
                    "status": "active", "active": true, "deleted_at": null,
                    "created_at": "2024-01-15 09:30:00", "roles": [{ "name": "admin" }]
                }),
                json!({
                    "id": 2, "name": "Bob", "email": "bob@example.com", "age": 17,
                    "status": "pending", "active": false, "deleted_at": null,
                    "created_at": "2024-02-01 12:00:00", "roles": []
                }),
                json!({
                    "id": 3, "name": "Carol", "email": "carol@corp.io", "age": 45,
                    "status": "active", "active": true, "deleted_at": "2024-03-01",
                    "created_at": "2024-01-20 18:45:00", "roles": [{ "name": "editor" }]
                }),
                json!({
                    "id": 4, "name": "Dave", "email": "dave@example.com", "age": 25,
                    "status": "banned", "active": false, "deleted_at": null,
                    "created_at": "2023-12-31 23:59:59",
                    "roles": [{ "name": "admin" }, { "name": "editor" }]
                }),
            ],
        )
        .with_relations("users", ["roles"])
}

fn repo() -> Repository<MemoryStore> {
    Repository::new(user_entity(), Arc::new(users_store())).unwrap()
}

fn ids(rows: &[Record]) -> Vec<i64> {
    rows.iter()
        .filter_map(|row| row.get("id").and_then(Value::as_f64))
        .map(|id| id as i64)
        .collect()
}

fn attrs(json: serde_json::Value) -> Record {
    match Value::from(json) {
        Value::Object(map) => map,
        other => panic!("Expected object, got {:?}", other),
    }
}

async fn request_ids(query: &str) -> Vec<i64> {
    let mut repo = repo();
    repo.push_request(&Params::from_query_string(query)).unwrap();
    ids(&repo.all().await.unwrap())
}

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    fn names(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl RepositoryListener for RecordingListener {
    fn on_event(&self, event: &RepositoryEvent) {
        self.events.lock().unwrap().push(event.name());
    }
}

struct Adults;

impl Criterion for Adults {
    fn apply(&self, query: QueryBuilder) -> quarry_core::Result<QueryBuilder> {
        Ok(query.where_cmp("age", Operator::Gte, 18i64, Boolean::And))
    }

    fn name(&self) -> &str {
        "adults"
    }
}

// =============================================================================
// Request Criteria Tests
// =============================================================================

#[tokio::test]
async fn test_global_search_matches_any_field() {
    assert_eq!(request_ids("search=example").await, vec![1, 2, 4]);
    assert_eq!(request_ids("search=Carol").await, vec![3]);
}

#[tokio::test]
async fn test_search_and_filter_narrow_together() {
    assert_eq!(request_ids("filter[status]=active&search=example").await, vec![1]);
    assert_eq!(request_ids("search=example&filter[status]=active").await, vec![1]);
}

#[tokio::test]
async fn test_or_group_filter() {
    let found =
        request_ids("filter[or][0]=[email,=,bob@example.com]&filter[or][1]=[status,=,banned]").await;
    assert_eq!(found, vec![2, 4]);
}

#[tokio::test]
async fn test_null_and_boolean_filters() {
    assert_eq!(request_ids("filter[deleted_at]=").await, vec![1, 2, 4]);
    assert_eq!(request_ids("filter[active]=true").await, vec![1, 3]);
    assert_eq!(request_ids("filter[active]=false").await, vec![2, 4]);
}

#[tokio::test]
async fn test_relation_filter() {
    assert_eq!(request_ids("filter[roles.name]=admin").await, vec![1, 4]);
}

#[tokio::test]
async fn test_operator_filters() {
    assert_eq!(request_ids("filter[age][gte]=25").await, vec![1, 3, 4]);
    assert_eq!(
        request_ids("filter[age][operator]=between&filter[age][value]=18,40").await,
        vec![1, 4]
    );
    assert_eq!(request_ids("filter[status][]=pending&filter[status][]=banned").await, vec![2, 4]);
    assert_eq!(
        request_ids("filter[created_at][operator]=date_between&filter[created_at][value]=2024-01-01,2024-01-31").await,
        vec![1, 3]
    );
}

#[tokio::test]
async fn test_ordering_and_includes() {
    let mut repo = repo();
    repo.push_request(&Params::from_query_string("orderBy=age&sortedBy=desc&with=roles"))
        .unwrap();
    let rows = repo.all().await.unwrap();

    assert_eq!(ids(&rows), vec![3, 1, 4, 2]);
    assert!(rows.iter().all(|row| row.contains_key("roles")));
}

#[tokio::test]
async fn test_push_request_replaces_previous_request() {
    let mut repo = repo();
    repo.push_request(&Params::from_query_string("filter[status]=active")).unwrap();
    repo.push_request(&Params::from_query_string("filter[status]=banned")).unwrap();

    assert_eq!(repo.criteria().len(), 1);
    assert_eq!(ids(&repo.all().await.unwrap()), vec![4]);
}

#[tokio::test]
async fn test_invalid_search_fields_surface() {
    let mut repo = repo();
    let err = repo
        .push_request(&Params::from_query_string("search=x&searchFields=password"))
        .err()
        .unwrap();
    assert!(matches!(err, RepositoryError::InvalidSearchFields { .. }));
    assert!(repo.criteria().is_empty());
}

// =============================================================================
// Criteria Stack Tests
// =============================================================================

#[tokio::test]
async fn test_criteria_persist_across_reads() {
    let mut repo = repo();
    repo.push_criteria(Adults);

    assert_eq!(ids(&repo.all().await.unwrap()), vec![1, 3, 4]);
    assert_eq!(ids(&repo.all().await.unwrap()), vec![1, 3, 4]);
    assert_eq!(repo.count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_criteria_apply_in_push_order() {
    let mut repo = repo();
    repo.push_criteria(Adults).push_criteria(ClosureCriterion::new(
        "oldest_first",
        |q: QueryBuilder| q.order_by("age", Direction::Desc),
    ));

    let criteria: Vec<&str> = repo.criteria().iter().map(|c| c.name()).collect();
    assert_eq!(criteria, vec!["adults", "closure"]);
    assert_eq!(ids(&repo.all().await.unwrap()), vec![3, 1, 4]);
}

#[tokio::test]
async fn test_skip_and_pop_criteria() {
    let mut repo = repo();
    repo.push_criteria(Adults);

    repo.skip_criteria(true);
    assert_eq!(repo.all().await.unwrap().len(), 4);
    assert_eq!(repo.criteria().len(), 1);

    repo.skip_criteria(false);
    assert_eq!(repo.all().await.unwrap().len(), 3);

    assert!(repo.pop_criteria::<Adults>().is_some());
    assert_eq!(repo.all().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_get_by_criteria_ignores_stack() {
    let mut repo = repo();
    repo.push_criteria(Adults);

    let banned = ClosureCriterion::new("banned", |q: QueryBuilder| q.where_eq("status", "banned"));
    assert_eq!(ids(&repo.get_by_criteria(&banned).await.unwrap()), vec![4]);
    assert_eq!(repo.all().await.unwrap().len(), 3);
}

// =============================================================================
// Read Method Tests
// =============================================================================

#[tokio::test]
async fn test_find() {
    let mut repo = repo();
    let alice = repo.find(1i64).await.unwrap();
    assert_eq!(alice["name"], Value::from("Alice"));

    let err = repo.find(99i64).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, RepositoryError::UnknownEntity { ref id, .. } if id == "99"));
}

#[tokio::test]
async fn test_find_respects_criteria() {
    let mut repo = repo();
    repo.push_criteria(Adults);
    assert!(repo.find(2i64).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_find_variants() {
    let mut repo = repo();

    assert_eq!(ids(&repo.find_by_field("status", "active").await.unwrap()), vec![1, 3]);
    assert_eq!(
        ids(&repo
            .find_where_in("status", vec!["pending".into(), "banned".into()])
            .await
            .unwrap()),
        vec![2, 4]
    );
    assert_eq!(
        ids(&repo.find_where_not_in("status", vec!["active".into()]).await.unwrap()),
        vec![2, 4]
    );
    assert_eq!(
        ids(&repo.find_where_between("age", 20i64, 40i64).await.unwrap()),
        vec![1, 4]
    );

    let conditions = vec![
        FilterCondition::new("age", Operator::Gte, Value::from(25i64)).unwrap(),
        FilterCondition::new("roles.name", Operator::Eq, Value::from("editor")).unwrap(),
    ];
    assert_eq!(ids(&repo.find_where(&conditions).await.unwrap()), vec![3, 4]);
}

#[tokio::test]
async fn test_first_and_count() {
    let mut repo = repo();
    repo.order_by("age", Direction::Asc);
    let youngest = repo.first().await.unwrap().unwrap();
    assert_eq!(youngest["name"], Value::from("Bob"));
    assert_eq!(repo.count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_paginate() {
    let mut repo = repo();
    let page = repo.paginate(Some(3), 2).await.unwrap();

    assert_eq!(page.total, 4);
    assert_eq!(page.current_page, 2);
    assert_eq!(page.last_page(), 2);
    assert_eq!(ids(&page.items), vec![4]);

    let capped = repo.paginate(Some(1000), 1).await.unwrap();
    assert_eq!(capped.per_page, 100);

    let default = repo.paginate(None, 1).await.unwrap();
    assert_eq!(default.per_page, 15);
}

#[tokio::test]
async fn test_get_selects_columns() {
    let mut repo = repo();
    let rows = repo.get(&["id", "name"]).await.unwrap();
    assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["id", "name"]);
}

// =============================================================================
// Transient State Tests
// =============================================================================

#[tokio::test]
async fn test_scope_is_one_shot() {
    let mut repo = repo();
    repo.scope_query(|q| q.where_eq("status", "active"));

    assert_eq!(ids(&repo.all().await.unwrap()), vec![1, 3]);
    assert_eq!(repo.all().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_reset_scope() {
    let mut repo = repo();
    repo.scope_query(|q| q.where_eq("status", "active")).reset_scope();
    assert_eq!(repo.all().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_shaping_calls_reset_after_read() {
    let mut repo = repo();
    repo.with(["roles"]).order_by("age", Direction::Desc).limit(1);

    let rows = repo.all().await.unwrap();
    assert_eq!(ids(&rows), vec![3]);
    assert!(rows[0].contains_key("roles"));

    let rows = repo.all().await.unwrap();
    assert_eq!(ids(&rows), vec![1, 2, 3, 4]);
    assert!(!rows[0].contains_key("roles"));
}

#[tokio::test]
async fn test_transient_state_reset_after_failed_read() {
    let mut repo = repo();
    repo.limit(1);
    assert!(repo.find(99i64).await.is_err());
    assert_eq!(repo.all().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_hidden_and_visible() {
    let mut repo = repo();

    repo.hidden(["email", "deleted_at"]);
    let row = repo.find(1i64).await.unwrap();
    assert!(!row.contains_key("email"));
    assert!(row.contains_key("name"));

    repo.visible(["id", "name"]);
    let rows = repo.all().await.unwrap();
    assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["id", "name"]);

    let row = repo.find(1i64).await.unwrap();
    assert!(row.contains_key("email"));
}

// =============================================================================
// Write Tests
// =============================================================================

#[tokio::test]
async fn test_create_assigns_id() {
    let mut repo = repo();
    let created = repo
        .create(attrs(json!({ "name": "Eve", "email": "eve@example.com" })))
        .await
        .unwrap();

    assert_eq!(created["id"], Value::Number(5.0));
    assert_eq!(repo.count().await.unwrap(), 5);
}

#[tokio::test]
async fn test_validation_failure_blocks_write() {
    let validator = |_: WriteAction, attrs: &Record| {
        let mut errors = ValidationErrors::new();
        if !attrs.contains_key("email") {
            errors.add("email", "is required");
        }
        errors.into_result()
    };
    let listener = Arc::new(RecordingListener::default());
    let mut repo = repo()
        .with_validator(validator)
        .with_listener(listener.clone());

    let err = repo.create(attrs(json!({ "name": "Eve" }))).await.unwrap_err();
    match err {
        RepositoryError::ValidationFailed(errors) => {
            assert_eq!(errors.get("email").map(<[String]>::len), Some(1));
        }
        other => panic!("Expected ValidationFailed, got {:?}", other),
    }

    let err = repo.update(1i64, attrs(json!({ "name": "Al" }))).await.unwrap_err();
    assert!(matches!(err, RepositoryError::ValidationFailed(_)));

    assert_eq!(repo.store().len("users").await, 4);
    assert_eq!(repo.find(1i64).await.unwrap()["name"], Value::from("Alice"));
    assert!(listener.names().is_empty());
}

#[tokio::test]
async fn test_update_and_delete() {
    let mut repo = repo();

    let updated = repo.update(2i64, attrs(json!({ "status": "active" }))).await.unwrap();
    assert_eq!(updated["status"], Value::from("active"));
    assert_eq!(updated["name"], Value::from("Bob"));

    assert!(repo.update(99i64, Record::new()).await.unwrap_err().is_not_found());

    repo.delete(2i64).await.unwrap();
    assert!(repo.delete(2i64).await.unwrap_err().is_not_found());
    assert_eq!(repo.count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_update_or_create() {
    let mut repo = repo();

    let existing = repo
        .update_or_create(
            attrs(json!({ "email": "bob@example.com" })),
            attrs(json!({ "age": 18 })),
        )
        .await
        .unwrap();
    assert_eq!(existing["id"], Value::Number(2.0));
    assert_eq!(existing["age"], Value::Number(18.0));

    let created = repo
        .update_or_create(
            attrs(json!({ "email": "zed@example.com" })),
            attrs(json!({ "name": "Zed" })),
        )
        .await
        .unwrap();
    assert_eq!(created["id"], Value::Number(5.0));
    assert_eq!(created["email"], Value::from("zed@example.com"));
    assert_eq!(repo.count().await.unwrap(), 5);
}

#[tokio::test]
async fn test_delete_where() {
    let mut repo = repo();
    let conditions = vec![FilterCondition::new("roles.name", Operator::Eq, Value::from("admin")).unwrap()];

    assert_eq!(repo.delete_where(&conditions).await.unwrap(), 2);
    assert_eq!(ids(&repo.all().await.unwrap()), vec![2, 3]);
}

#[tokio::test]
async fn test_write_events() {
    let listener = Arc::new(RecordingListener::default());
    let mut repo = repo().with_listener(listener.clone());

    let created = repo.create(attrs(json!({ "name": "Eve" }))).await.unwrap();
    repo.update(created["id"].clone(), attrs(json!({ "age": 20 })))
        .await
        .unwrap();
    repo.delete(created["id"].clone()).await.unwrap();

    assert_eq!(
        listener.names(),
        vec![
            "user.creating",
            "user.created",
            "user.updating",
            "user.updated",
            "user.deleting",
            "user.deleted",
        ]
    );
}

#[tokio::test]
async fn test_writes_bypass_criteria() {
    let mut repo = repo();
    repo.push_criteria(Adults);

    // Bob is hidden from reads but can still be updated by id
    let updated = repo.update(2i64, attrs(json!({ "age": 19 }))).await.unwrap();
    assert_eq!(updated["age"], Value::Number(19.0));
    assert_eq!(repo.count().await.unwrap(), 4);

    let stored = repo
        .store()
        .get(&QueryBuilder::new("users").where_eq("id", 2i64))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}
