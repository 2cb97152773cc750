//! Cached reads example
//!
//! This example demonstrates:
//! - Loading repository settings from YAML
//! - Read-through caching keyed by method, arguments and criteria
//! - Tag invalidation after writes
//!
//! Run with: `RUST_LOG=quarry_repository=debug cargo run --example cached_reads`

use quarry_core::{Operator, Record, Value};
use quarry_parser::{Params, SearchableFields};
use quarry_repository::{
    EntityDescriptor, MemoryCacheStore, MemoryStore, Repository, RepositoryConfig,
};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const CONFIG: &str = r#"
cache:
  enabled: true
  ttl_secs: 600
  except: [count]
  clean:
    on_update: false
pagination:
  default_per_page: 2
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Cached Reads Example ===\n");

    let config = RepositoryConfig::from_yaml_str(CONFIG)?;
    let store = MemoryStore::new().with_json(
        "posts",
        vec![
            json!({ "id": 1, "title": "Hello world", "published": true }),
            json!({ "id": 2, "title": "Draft notes", "published": false }),
            json!({ "id": 3, "title": "Release day", "published": true }),
        ],
    );
    let entity = EntityDescriptor::new("Post", "posts")
        .with_searchable(SearchableFields::new().field("title", Operator::Like))
        .with_filterable(["published"]);

    let mut repo = Repository::with_config(entity, Arc::new(store), config)?
        .with_cache(Arc::new(MemoryCacheStore::new()));

    // First read misses, second read hits
    repo.push_request(&Params::from_query_string("filter[published]=true"))?;
    let first = repo.all().await?;
    let second = repo.all().await?;
    println!("Published posts: {} (then {})", first.len(), second.len());
    print_stats(&repo).await;

    // Same method and arguments under a different request: a new entry
    let page = repo.paginate(None, 1).await?;
    println!("Page 1 of {}: {} items", page.last_page(), page.items.len());
    print_stats(&repo).await;

    // Creating a post clears every cached read for the entity
    let mut attributes = Record::new();
    attributes.insert("title".to_string(), Value::from("Fresh post"));
    attributes.insert("published".to_string(), Value::from(true));
    let created = repo.create(attributes).await?;
    println!("\nCreated post {}", created.get("id").cloned().unwrap_or_default());
    print_stats(&repo).await;

    println!("Published posts after create: {}", repo.all().await?.len());

    // skipCache bypasses the cache for this request only
    repo.push_request(&Params::from_query_string("filter[published]=true&skipCache=true"))?;
    println!("Uncached read: {}", repo.all().await?.len());
    print_stats(&repo).await;

    Ok(())
}

async fn print_stats(repo: &Repository<MemoryStore>) {
    if let Some(stats) = repo.cache_stats().await {
        println!(
            "  cache: {} hits, {} misses, {} entries, hit rate {:.0}%",
            stats.hits,
            stats.misses,
            stats.size,
            stats.hit_rate() * 100.0
        );
    }
}
