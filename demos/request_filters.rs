//! Request filters example
//!
//! This example demonstrates:
//! - Parsing search, filter, ordering and include parameters
//! - Compiling the parsed request into SQL
//! - Narrowing repository reads with request criteria
//!
//! Run with: `RUST_LOG=debug cargo run --example request_filters`

use quarry_compiler::FilterQueryCompiler;
use quarry_core::{Operator, QueryBuilder, SqlRenderer};
use quarry_parser::{ParserConfig, Params, RequestParser, SearchableFields};
use quarry_repository::{EntityDescriptor, MemoryStore, Repository};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn searchable() -> SearchableFields {
    SearchableFields::new()
        .field("name", Operator::Like)
        .field("email", Operator::Like)
        .field("status", Operator::Eq)
}

fn seed() -> MemoryStore {
    MemoryStore::new()
        .with_json(
            "users",
            vec![
                json!({ "id": 1, "name": "Alice Adams", "email": "alice@example.com", "status": "active", "age": 31,
                        "roles": [{ "name": "admin" }] }),
                json!({ "id": 2, "name": "Bob Brown", "email": "bob@example.org", "status": "pending", "age": 17,
                        "roles": [] }),
                json!({ "id": 3, "name": "Carol Clark", "email": "carol@example.com", "status": "active", "age": 45,
                        "roles": [{ "name": "editor" }] }),
            ],
        )
        .with_relations("users", ["roles"])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Request Filters Example ===\n");

    // Step 1: Compile a request straight to SQL
    let parser = RequestParser::new(ParserConfig::default(), searchable())?
        .with_filterable(["age", "roles.name"]);
    let compiler = FilterQueryCompiler::new();

    let requests = [
        "search=alice",
        "search=status:active;name:carol&searchJoin=and",
        "filter[age][gte]=18&orderBy=age&sortedBy=desc",
        "filter[roles.name]=admin&with=roles",
    ];

    for raw in requests {
        let parsed = parser.parse(&Params::from_query_string(raw))?;
        let query = compiler.compile(&parsed, QueryBuilder::new("users"))?;
        println!("{}", raw);
        println!("  -> {}\n", SqlRenderer::render_inline(&query)?);
    }

    // Step 2: Run the same kind of request against a repository
    let entity = EntityDescriptor::new("User", "users")
        .with_searchable(searchable())
        .with_filterable(["age", "roles.name"]);
    let mut repo = Repository::new(entity, Arc::new(seed()))?;

    repo.push_request(&Params::from_query_string(
        "filter[age][gte]=18&orderBy=name&with=roles",
    ))?;
    println!("--- Adults, ordered by name ---");
    for user in repo.all().await? {
        println!("{}", serde_json::to_string(&user)?);
    }

    // Replacing the request criteria swaps the narrowing
    repo.push_request(&Params::from_query_string("search=example.org"))?;
    println!("\n--- Matching 'example.org' ---");
    for user in repo.all().await? {
        println!("{}", serde_json::to_string(&user)?);
    }

    Ok(())
}
