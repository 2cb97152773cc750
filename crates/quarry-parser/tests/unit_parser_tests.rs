//! Unit tests for request parsing
//!
//! Exercises the full `RequestParser` path from raw query strings and JSON
//! bodies to a `ParsedRequest`.

use quarry_core::{Boolean, Direction, Operator, SearchMode, Value};
use quarry_parser::*;

fn user_fields() -> SearchableFields {
    SearchableFields::new()
        .field("name", Operator::Like)
        .field("email", Operator::Like)
        .field("status", Operator::Eq)
        .field("active", Operator::Eq)
        .field("age", Operator::Eq)
        .field("deleted_at", Operator::Eq)
        .field("roles.name", Operator::Eq)
}

fn parse(query: &str) -> Result<ParsedRequest> {
    let parser = RequestParser::new(ParserConfig::default(), user_fields())?;
    parser.parse(&Params::from_query_string(query))
}

// =============================================================================
// Search Tests
// =============================================================================

#[test]
fn test_global_search() {
    let request = parse("search=foo").unwrap();
    let search = request.search.expect("search expected");
    assert_eq!(search.mode, SearchMode::Global);
    assert_eq!(search.term_for("name"), Some("foo"));
    assert_eq!(search.term_for("email"), Some("foo"));
    assert_eq!(search.combinator, Boolean::Or);
}

#[test]
fn test_per_field_search() {
    let request = parse("search=name:John;email:john@x.com").unwrap();
    let search = request.search.unwrap();
    assert_eq!(search.mode, SearchMode::PerField);
    assert_eq!(search.term_for("name"), Some("John"));
    assert_eq!(search.term_for("email"), Some("john@x.com"));
    assert_eq!(search.term_for("status"), None);
}

#[test]
fn test_search_join_and() {
    let request = parse("search=foo&searchJoin=and").unwrap();
    assert_eq!(request.search.unwrap().combinator, Boolean::And);
}

#[test]
fn test_empty_search_is_none() {
    assert!(parse("search=").unwrap().search.is_none());
    assert!(parse("search=+++").unwrap().search.is_none());
}

#[test]
fn test_search_fields_narrow() {
    let request = parse("search=foo&searchFields=email").unwrap();
    let fields: Vec<&str> = request.search_fields.iter().map(|(f, _)| f).collect();
    assert_eq!(fields, vec!["email"]);
}

#[test]
fn test_search_fields_authorize_extra_field() {
    let request = parse("search=foo&searchFields=nickname:like").unwrap();
    assert_eq!(request.search_fields.get("nickname"), Some(Operator::Like));
    assert_eq!(request.search_fields.len(), 1);
}

#[test]
fn test_search_fields_unusable_override_fails() {
    let err = parse("search=foo&searchFields=nickname:>").unwrap_err();
    match err {
        ParseError::InvalidSearchFields { fields, accepted } => {
            assert_eq!(fields, "nickname:>");
            assert!(accepted.contains("like"));
        }
        other => panic!("Expected InvalidSearchFields, got {:?}", other),
    }
}

#[test]
fn test_phrase_and_fuzzy_terms() {
    let request = parse("search=name:%22john+doe%22;email:jon~1").unwrap();
    let search = request.search.unwrap();
    assert_eq!(search.term_for("name"), Some("john doe"));
    assert!(search.is_phrase("name"));
    assert_eq!(search.fuzzy_distance("email"), Some(1));
}

// =============================================================================
// Filter Tests
// =============================================================================

#[test]
fn test_filter_and_search_order_independent() {
    let a = parse("search=foo&filter[status]=active").unwrap();
    let b = parse("filter[status]=active&search=foo").unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_filter_operators_one_condition_each() {
    let cases = [
        ("=", "bob", Operator::Eq, Value::from("bob")),
        ("!=", "bob", Operator::Ne, Value::from("bob")),
        (">", "30", Operator::Gt, Value::Number(30.0)),
        ("<", "30", Operator::Lt, Value::Number(30.0)),
        (">=", "30", Operator::Gte, Value::Number(30.0)),
        ("<=", "30", Operator::Lte, Value::Number(30.0)),
        ("like", "%bo%", Operator::Like, Value::from("%bo%")),
        ("ilike", "bo%", Operator::Ilike, Value::from("bo%")),
        ("not_like", "%x", Operator::NotLike, Value::from("%x")),
        ("in", "a,b", Operator::In, Value::from(vec!["a", "b"])),
        ("not_in", "a,b", Operator::NotIn, Value::from(vec!["a", "b"])),
        (
            "between",
            "1,5",
            Operator::Between,
            Value::Array(vec![Value::Number(1.0), Value::Number(5.0)]),
        ),
        ("date", "2024-01-02", Operator::DateEq, Value::from("2024-01-02")),
    ];

    for (op, value, expected_op, expected_value) in cases {
        let query = format!(
            "filter[age][operator]={}&filter[age][value]={}",
            urlencode(op),
            urlencode(value)
        );
        let request = parse(&query).unwrap();
        assert_eq!(request.filters.len(), 1, "operator {}", op);
        let condition = &request.filters[0];
        assert_eq!(condition.path, "age");
        assert_eq!(condition.operator, expected_op, "operator {}", op);
        assert_eq!(condition.value, expected_value, "operator {}", op);
        assert!(request.or_groups.is_empty());
    }
}

fn urlencode(raw: &str) -> String {
    raw.replace('%', "%25")
        .replace('=', "%3D")
        .replace('<', "%3C")
        .replace('>', "%3E")
        .replace('!', "%21")
}

#[test]
fn test_null_filter() {
    let request = parse("filter[deleted_at]=").unwrap();
    assert_eq!(request.filters[0].operator, Operator::NotExists);
}

#[test]
fn test_boolean_filter_values() {
    let request = parse("filter[active]=true").unwrap();
    assert_eq!(request.filters[0].value, Value::Bool(true));
    let request = parse("filter[active]=false").unwrap();
    assert_eq!(request.filters[0].value, Value::Bool(false));
}

#[test]
fn test_or_group() {
    let request =
        parse("filter[or][0]=[email,=,a@x.com]&filter[or][1]=[status,=,active]").unwrap();
    assert!(request.filters.is_empty());
    assert_eq!(request.or_groups.len(), 1);
    assert_eq!(request.or_groups[0].len(), 2);
}

#[test]
fn test_malformed_filters_do_not_fail_request() {
    let request = parse("filter[age][operator]=gt&filter[age][value]=old&filter[status]=on").unwrap();
    assert_eq!(request.filters.len(), 1);
    assert_eq!(request.filters[0].path, "status");
}

#[test]
fn test_json_body() {
    let parser = RequestParser::new(ParserConfig::default(), user_fields()).unwrap();
    let params = Params::from_json(&serde_json::json!({
        "search": { "name": "ann" },
        "filter": {
            "active": true,
            "age": { "operator": ">=", "value": 21 },
            "roles.name": "admin"
        },
        "orderBy": "name",
        "sortedBy": "desc",
        "with": "roles",
        "skipCache": true
    }));

    let request = parser.parse(&params).unwrap();
    assert_eq!(request.search.unwrap().term_for("name"), Some("ann"));
    assert_eq!(request.filters.len(), 3);
    assert_eq!(request.filters[0].value, Value::Bool(true));
    assert_eq!(request.filters[1].operator, Operator::Gte);
    assert_eq!(request.filters[2].relation(), Some("roles"));
    assert_eq!(request.order[0].direction, Direction::Desc);
    assert_eq!(request.with, vec!["roles"]);
    assert_eq!(request.skip_cache, Some(true));
}

// =============================================================================
// Serialization
// =============================================================================

#[test]
fn test_parsed_request_serializes_deterministically() {
    let a = serde_json::to_string(&parse("search=foo&filter[status]=active").unwrap()).unwrap();
    let b = serde_json::to_string(&parse("filter[status]=active&search=foo").unwrap()).unwrap();
    assert_eq!(a, b);
}
