//! Unit tests for request compilation
//!
//! Each test parses a raw query string, compiles it onto a fresh builder and
//! checks the resulting clause tree, mostly through its inline SQL rendering.

use quarry_compiler::*;
use quarry_core::{Boolean, Clause, Criterion, Operator, QueryBuilder, SqlRenderer, Value};
use quarry_parser::{Params, ParserConfig, RequestParser, SearchableFields};

fn user_fields() -> SearchableFields {
    SearchableFields::new()
        .field("name", Operator::Like)
        .field("email", Operator::Like)
}

const FILTERABLE: [&str; 6] = [
    "status",
    "active",
    "age",
    "deleted_at",
    "created_at",
    "roles.name",
];

fn parser(fields: SearchableFields) -> RequestParser {
    RequestParser::new(ParserConfig::default(), fields)
        .unwrap()
        .with_filterable(FILTERABLE)
}

fn compile_with(fields: SearchableFields, query: &str) -> QueryBuilder {
    let parser = parser(fields);
    let criteria = RequestCriteria::new(&parser, &Params::from_query_string(query)).unwrap();
    criteria.apply(QueryBuilder::new("users")).unwrap()
}

fn sql(query: &str) -> String {
    SqlRenderer::render_inline(&compile_with(user_fields(), query)).unwrap()
}

// =============================================================================
// Search
// =============================================================================

#[test]
fn test_search_precedence_over_filters() {
    let expected =
        "SELECT * FROM users WHERE (name LIKE '%foo%' OR email LIKE '%foo%') AND status = 'active'";
    assert_eq!(sql("search=foo&filter[status]=active"), expected);
    assert_eq!(sql("filter[status]=active&search=foo"), expected);
}

#[test]
fn test_search_join_and() {
    assert_eq!(
        sql("search=foo&searchJoin=and"),
        "SELECT * FROM users WHERE (name LIKE '%foo%' AND email LIKE '%foo%')"
    );
}

#[test]
fn test_per_field_search_uses_fallback_term() {
    assert_eq!(
        sql("search=bar;email:foo@x.com"),
        "SELECT * FROM users WHERE (name LIKE '%bar%' OR email LIKE '%foo@x.com%')"
    );
}

#[test]
fn test_multi_word_search_is_tokenized() {
    assert_eq!(
        sql("search=name:john+doe"),
        "SELECT * FROM users WHERE ((name LIKE '%john%' AND name LIKE '%doe%'))"
    );
}

#[test]
fn test_phrase_search_matches_literally() {
    assert_eq!(
        sql("search=name:%22john+doe%22"),
        "SELECT * FROM users WHERE (name LIKE '%john doe%')"
    );
}

#[test]
fn test_fuzzy_search() {
    assert_eq!(
        sql("search=name:jon~1"),
        "SELECT * FROM users WHERE (levenshtein(name, 'jon') <= 1)"
    );
}

#[test]
fn test_search_fields_override_operator() {
    let query = compile_with(user_fields(), "search=bob&searchFields=name:%3D");
    assert_eq!(
        SqlRenderer::render_inline(&query).unwrap(),
        "SELECT * FROM users WHERE (name = 'bob')"
    );
}

#[test]
fn test_search_on_relation_field() {
    let fields = user_fields().field("roles.name", Operator::Like);
    let query = compile_with(fields, "search=roles.name:adm");
    assert_eq!(
        SqlRenderer::render_inline(&query).unwrap(),
        "SELECT * FROM users WHERE (EXISTS (SELECT 1 FROM roles WHERE name LIKE '%adm%'))"
    );
}

// =============================================================================
// Filters
// =============================================================================

#[test]
fn test_or_group() {
    assert_eq!(
        sql("filter[or][0]=[email,=,a@x.com]&filter[or][1]=[status,=,active]&filter[age][gte]=18"),
        "SELECT * FROM users WHERE age >= 18 AND (email = 'a@x.com' OR status = 'active')"
    );
}

#[test]
fn test_null_filter() {
    assert_eq!(
        sql("filter[deleted_at]="),
        "SELECT * FROM users WHERE deleted_at IS NULL"
    );
}

#[test]
fn test_boolean_filter_is_typed() {
    let query = compile_with(user_fields(), "filter[active]=true");
    match &query.clauses()[0] {
        Clause::Compare { field, value, .. } => {
            assert_eq!(field, "active");
            assert_eq!(*value, Value::Bool(true));
        }
        other => panic!("Expected Compare, got {:?}", other),
    }

    let query = compile_with(user_fields(), "filter[active]=false");
    assert_eq!(
        SqlRenderer::render_inline(&query).unwrap(),
        "SELECT * FROM users WHERE active = false"
    );
}

#[test]
fn test_relation_filter_is_subquery() {
    let query = compile_with(user_fields(), "filter[roles.name]=admin");
    match &query.clauses()[0] {
        Clause::Has {
            relation,
            clauses,
            negated,
            boolean,
        } => {
            assert_eq!(relation, "roles");
            assert!(!negated);
            assert_eq!(*boolean, Boolean::And);
            assert_eq!(clauses.len(), 1);
            assert_eq!(clauses[0].field(), Some("name"));
        }
        other => panic!("Expected Has, got {:?}", other),
    }
    assert_eq!(
        SqlRenderer::render_inline(&query).unwrap(),
        "SELECT * FROM users WHERE EXISTS (SELECT 1 FROM roles WHERE name = 'admin')"
    );
}

#[test]
fn test_every_operator_yields_one_clause() {
    let cases = [
        ("eq", "bob"),
        ("ne", "bob"),
        ("gt", "3"),
        ("lt", "3"),
        ("gte", "3"),
        ("lte", "3"),
        ("like", "bo"),
        ("ilike", "bo"),
        ("not_like", "bo"),
        ("in", "1,2"),
        ("not_in", "1,2"),
        ("between", "1,2"),
        ("not_between", "1,2"),
        ("date", "2024-01-01"),
    ];

    for (op, value) in cases {
        let query = compile_with(
            user_fields(),
            &format!("filter[age][operator]={}&filter[age][value]={}", op, value),
        );
        assert_eq!(query.clauses().len(), 1, "operator {}", op);
        assert_eq!(query.clauses()[0].field(), Some("age"), "operator {}", op);
        assert_eq!(query.clauses()[0].leaf_count(), 1, "operator {}", op);
    }
}

#[test]
fn test_date_between_filter() {
    assert_eq!(
        sql("filter[created_at][operator]=date_between&filter[created_at][value]=2024-01-01,2024-01-31+23:59:59"),
        "SELECT * FROM users WHERE (DATE(created_at) >= '2024-01-01' AND DATE(created_at) <= '2024-01-31')"
    );
}

#[test]
fn test_unknown_filter_field_ignored() {
    assert_eq!(sql("filter[password]=x"), "SELECT * FROM users");
}

// =============================================================================
// Ordering and eager loading
// =============================================================================

#[test]
fn test_order_and_with() {
    let query = compile_with(
        user_fields(),
        "orderBy=name,age&sortedBy=desc&with=roles",
    );
    assert_eq!(
        SqlRenderer::render_inline(&query).unwrap(),
        "SELECT * FROM users ORDER BY name DESC, age DESC"
    );
    assert_eq!(query.relations(), ["roles".to_string()]);
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_idempotent_application() {
    let parser = parser(user_fields());
    let criteria = RequestCriteria::new(
        &parser,
        &Params::from_query_string("search=foo&filter[roles.name]=admin&orderBy=name"),
    )
    .unwrap();

    let first = criteria.apply(QueryBuilder::new("users")).unwrap();
    let second = criteria.apply(QueryBuilder::new("users")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_compile_onto_existing_builder() {
    let compiler = FilterQueryCompiler::new();
    let parser = parser(user_fields());
    let request = parser
        .parse(&Params::from_query_string("filter[status]=active"))
        .unwrap();

    let base = QueryBuilder::new("users").where_null("deleted_at", Boolean::And);
    let query = compiler.compile(&request, base).unwrap();
    assert_eq!(
        SqlRenderer::render_inline(&query).unwrap(),
        "SELECT * FROM users WHERE deleted_at IS NULL AND status = 'active'"
    );
}
