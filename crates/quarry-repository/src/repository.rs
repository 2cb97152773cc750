//! Repository core
//!
//! Every read follows the same path: take the transient builder state,
//! apply the criteria stack, apply the one-shot scope, add the method's own
//! conditions, then execute through the cache layer. Transient state is
//! taken before anything can fail, so nothing from one call leaks into the
//! next one. Criteria stay until they are popped or cleared.

use quarry_compiler::{FilterQueryCompiler, RequestCriteria};
use quarry_core::{Boolean, Criterion, Direction, FilterCondition, QueryBuilder, Record, Value};
use quarry_parser::{ParsedRequest, Params, RequestParser};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{CacheKey, CacheKeyDeriver, CacheLayer, CacheStore};
use crate::config::{RepositoryConfig, WriteAction};
use crate::criteria::{describe, CriteriaRegistry, CriteriaStack};
use crate::entity::EntityDescriptor;
use crate::error::{RepositoryError, RepositoryResult};
use crate::events::{RepositoryEvent, RepositoryListener};
use crate::models::{CacheStats, Page};
use crate::store::RecordStore;
use crate::validation::Validator;

type Scope = Box<dyn FnOnce(QueryBuilder) -> QueryBuilder + Send>;

/// Field visibility applied to results after they leave the cache
#[derive(Debug, Clone, Default)]
struct Visibility {
    hidden: Vec<String>,
    visible: Vec<String>,
}

impl Visibility {
    fn apply(&self, record: &mut Record) {
        if !self.visible.is_empty() {
            record.retain(|key, _| self.visible.contains(key));
        }
        if !self.hidden.is_empty() {
            record.retain(|key, _| !self.hidden.contains(key));
        }
    }

    fn apply_all(&self, records: &mut [Record]) {
        for record in records {
            self.apply(record);
        }
    }
}

/// Query and cache inputs of one read
struct Prepared {
    query: QueryBuilder,
    criteria: serde_json::Value,
    skip_cache: bool,
    visibility: Visibility,
}

/// Criteria-driven repository over one entity
///
/// An instance holds per-call state and is meant for one logical call at a
/// time; create one per request when serving concurrent callers.
pub struct Repository<S: RecordStore> {
    entity: EntityDescriptor,
    store: Arc<S>,
    config: RepositoryConfig,
    parser: RequestParser,
    criteria: CriteriaStack,
    registry: CriteriaRegistry,
    cache: Option<CacheLayer>,
    keys: CacheKeyDeriver,
    validator: Option<Box<dyn Validator>>,
    listeners: Vec<Arc<dyn RepositoryListener>>,

    // Transient, reset by every call
    query: QueryBuilder,
    scope: Option<Scope>,
    visibility: Visibility,
    skip_cache_once: bool,
}

impl<S: RecordStore> Repository<S> {
    /// Repository with the default configuration and no cache
    pub fn new(entity: EntityDescriptor, store: Arc<S>) -> RepositoryResult<Self> {
        Self::with_config(entity, store, RepositoryConfig::default())
    }

    pub fn with_config(
        entity: EntityDescriptor,
        store: Arc<S>,
        config: RepositoryConfig,
    ) -> RepositoryResult<Self> {
        config.validate()?;
        let parser = RequestParser::new(config.parser.clone(), entity.searchable.clone())?
            .with_filterable(entity.filterable.iter().cloned());

        Ok(Self {
            query: QueryBuilder::new(entity.table.as_str()),
            entity,
            store,
            config,
            parser,
            criteria: CriteriaStack::new(),
            registry: CriteriaRegistry::new(),
            cache: None,
            keys: CacheKeyDeriver::new(),
            validator: None,
            listeners: Vec::new(),
            scope: None,
            visibility: Visibility::default(),
            skip_cache_once: false,
        })
    }

    /// Cache reads in `store` according to the configured cache settings
    pub fn with_cache(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(CacheLayer::new(
            store,
            self.config.cache.clone(),
            self.entity.cache_tags(),
        ));
        self
    }

    pub fn with_validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn RepositoryListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn with_registry(mut self, registry: CriteriaRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn entity(&self) -> &EntityDescriptor {
        &self.entity
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // Criteria

    pub fn criteria(&self) -> &CriteriaStack {
        &self.criteria
    }

    pub fn push_criteria<C: Criterion>(&mut self, criterion: C) -> &mut Self {
        self.criteria.push(criterion);
        self
    }

    /// Push a criterion built from the registry
    pub fn push_criteria_named(
        &mut self,
        name: &str,
        params: &serde_json::Value,
    ) -> RepositoryResult<&mut Self> {
        self.criteria.push_named(&self.registry, name, params)?;
        Ok(self)
    }

    /// Push the criterion for request parameters, replacing the one from a
    /// previous request
    pub fn push_request(&mut self, params: &Params) -> RepositoryResult<&mut Self> {
        let criterion = RequestCriteria::new(&self.parser, params)?;
        self.criteria.pop::<RequestCriteria>();
        self.criteria.push(criterion);
        Ok(self)
    }

    pub fn pop_criteria<C: Criterion>(&mut self) -> Option<Box<dyn Criterion>> {
        self.criteria.pop::<C>()
    }

    pub fn skip_criteria(&mut self, skip: bool) -> &mut Self {
        self.criteria.skip(skip);
        self
    }

    pub fn reset_criteria(&mut self) -> &mut Self {
        self.criteria.clear();
        self
    }

    // Transient builder state

    /// Eager load relations on the next read
    pub fn with<I, P>(&mut self, relations: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let mut query = self.take_query();
        for relation in relations {
            query = query.with_relation(relation);
        }
        self.query = query;
        self
    }

    pub fn order_by(&mut self, field: &str, direction: Direction) -> &mut Self {
        self.query = self.take_query().order_by(field, direction);
        self
    }

    pub fn limit(&mut self, limit: usize) -> &mut Self {
        self.query = self.take_query().limit(limit);
        self
    }

    /// Narrow the next read with `scope`, applied after the criteria
    pub fn scope_query<F>(&mut self, scope: F) -> &mut Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder + Send + 'static,
    {
        self.scope = Some(Box::new(scope));
        self
    }

    pub fn reset_scope(&mut self) -> &mut Self {
        self.scope = None;
        self
    }

    /// Remove `fields` from the results of the next read
    pub fn hidden<I, F>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.visibility.hidden = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Keep only `fields` in the results of the next read
    pub fn visible<I, F>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.visibility.visible = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Bypass the cache for the next read
    pub fn skip_cache(&mut self, skip: bool) -> &mut Self {
        self.skip_cache_once = skip;
        self
    }

    // Cache

    /// Key the next read through `method` with `args` is stored under.
    ///
    /// Covers the criteria and the pending shaping calls. Conditions a
    /// method adds itself (`find`, `find_where`, ..) and a pending scope are
    /// not known here, so the key matches `all`, `get`, `first`, `count` and
    /// `paginate` reads.
    pub fn cache_key(
        &self,
        method: &str,
        args: &serde_json::Value,
    ) -> RepositoryResult<CacheKey> {
        let query = self.criteria.apply_all(self.query.clone())?;
        self.read_key(method, args, &query, &self.criteria.fingerprint())
    }

    pub async fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.flush().await;
        }
    }

    pub async fn cache_stats(&self) -> Option<CacheStats> {
        match &self.cache {
            Some(cache) => Some(cache.stats().await),
            None => None,
        }
    }

    // Reads

    pub async fn all(&mut self) -> RepositoryResult<Vec<Record>> {
        self.get(&[]).await
    }

    /// Rows with only `columns` selected; every column when empty
    pub async fn get(&mut self, columns: &[&str]) -> RepositoryResult<Vec<Record>> {
        let select: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let prepared = self.prepare(None, |query| {
            Ok(if select.is_empty() {
                query
            } else {
                query.select(select)
            })
        })?;
        self.fetch_many("all", json!(columns), prepared).await
    }

    pub async fn first(&mut self) -> RepositoryResult<Option<Record>> {
        let prepared = self.prepare(None, Ok)?;
        self.fetch_one("first", json!([]), prepared).await
    }

    /// Row with primary key `id`
    pub async fn find(&mut self, id: impl Into<Value>) -> RepositoryResult<Record> {
        let id = id.into();
        let primary_key = self.entity.primary_key.clone();
        let key = id.clone();
        let prepared = self.prepare(None, move |query| Ok(query.where_eq(primary_key, key)))?;

        self.fetch_one("find", json!([id.to_json()]), prepared)
            .await?
            .ok_or_else(|| RepositoryError::UnknownEntity {
                entity: self.entity.name.clone(),
                id: id.to_json().to_string(),
            })
    }

    pub async fn find_by_field(
        &mut self,
        field: &str,
        value: impl Into<Value>,
    ) -> RepositoryResult<Vec<Record>> {
        let value = value.into();
        let args = json!([field, value.to_json()]);
        let field = field.to_string();
        let prepared = self.prepare(None, move |query| Ok(query.where_eq(field, value)))?;
        self.fetch_many("findByField", args, prepared).await
    }

    /// Rows matching every condition; relation paths become existence
    /// subqueries
    pub async fn find_where(
        &mut self,
        conditions: &[FilterCondition],
    ) -> RepositoryResult<Vec<Record>> {
        let args = serde_json::to_value(conditions)?;
        let request = ParsedRequest {
            filters: conditions.to_vec(),
            ..Default::default()
        };
        let prepared = self.prepare(None, move |query| {
            Ok(FilterQueryCompiler::new().compile(&request, query)?)
        })?;
        self.fetch_many("findWhere", args, prepared).await
    }

    pub async fn find_where_in(
        &mut self,
        field: &str,
        values: Vec<Value>,
    ) -> RepositoryResult<Vec<Record>> {
        let args = json!([field, Value::Array(values.clone()).to_json()]);
        let field = field.to_string();
        let prepared = self.prepare(None, move |query| {
            Ok(query.where_in(field, values, Boolean::And))
        })?;
        self.fetch_many("findWhereIn", args, prepared).await
    }

    pub async fn find_where_not_in(
        &mut self,
        field: &str,
        values: Vec<Value>,
    ) -> RepositoryResult<Vec<Record>> {
        let args = json!([field, Value::Array(values.clone()).to_json()]);
        let field = field.to_string();
        let prepared = self.prepare(None, move |query| {
            Ok(query.where_not_in(field, values, Boolean::And))
        })?;
        self.fetch_many("findWhereNotIn", args, prepared).await
    }

    pub async fn find_where_between(
        &mut self,
        field: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> RepositoryResult<Vec<Record>> {
        let (low, high) = (low.into(), high.into());
        let args = json!([field, low.to_json(), high.to_json()]);
        let field = field.to_string();
        let prepared = self.prepare(None, move |query| {
            Ok(query.where_between(field, low, high, Boolean::And))
        })?;
        self.fetch_many("findWhereBetween", args, prepared).await
    }

    /// One page of rows; `per_page` falls back to the configured default
    /// and is capped at the configured maximum
    pub async fn paginate(
        &mut self,
        per_page: Option<usize>,
        page: usize,
    ) -> RepositoryResult<Page<Record>> {
        let limits = &self.config.pagination;
        let per_page = per_page
            .unwrap_or(limits.default_per_page)
            .clamp(1, limits.max_per_page);
        let page = page.max(1);

        let prepared = self.prepare(None, Ok)?;
        let visibility = prepared.visibility.clone();
        let mut result: Page<Record> = self
            .execute("paginate", json!([per_page, page]), prepared, move |store, query| async move {
                store.paginate(&query, per_page, page).await
            })
            .await?;
        visibility.apply_all(&mut result.items);
        Ok(result)
    }

    pub async fn count(&mut self) -> RepositoryResult<usize> {
        let prepared = self.prepare(None, Ok)?;
        self.execute("count", json!([]), prepared, |store, query| async move {
            store.count(&query).await
        })
        .await
    }

    /// Rows narrowed by `criterion` alone, ignoring the stack
    pub async fn get_by_criteria(
        &mut self,
        criterion: &dyn Criterion,
    ) -> RepositoryResult<Vec<Record>> {
        let prepared = self.prepare(Some(criterion), Ok)?;
        self.fetch_many("getByCriteria", json!([]), prepared).await
    }

    fn take_query(&mut self) -> QueryBuilder {
        let fresh = self.query.reset();
        std::mem::replace(&mut self.query, fresh)
    }

    fn reset_transient(&mut self) {
        self.take_query();
        self.scope = None;
        self.visibility = Visibility::default();
        self.skip_cache_once = false;
    }

    fn prepare<B>(&mut self, only: Option<&dyn Criterion>, build: B) -> RepositoryResult<Prepared>
    where
        B: FnOnce(QueryBuilder) -> RepositoryResult<QueryBuilder>,
    {
        let base = self.take_query();
        let scope = self.scope.take();
        let visibility = std::mem::take(&mut self.visibility);
        let skip_once = std::mem::take(&mut self.skip_cache_once);

        let (query, criteria, bypass) = match only {
            Some(criterion) => (
                criterion.apply(base)?,
                json!([describe(criterion)]),
                criterion.bypasses_cache(),
            ),
            None => (
                self.criteria.apply_all(base)?,
                self.criteria.fingerprint(),
                self.criteria.bypasses_cache(),
            ),
        };
        let query = match scope {
            Some(scope) => scope(query),
            None => query,
        };
        let query = build(query)?;

        Ok(Prepared {
            query,
            criteria,
            skip_cache: skip_once || bypass,
            visibility,
        })
    }

    /// Cache key of a read running `query`; the final builder carries the
    /// scope and shaping calls
    fn read_key(
        &self,
        method: &str,
        args: &serde_json::Value,
        query: &QueryBuilder,
        criteria: &serde_json::Value,
    ) -> RepositoryResult<CacheKey> {
        let args = json!({
            "args": args,
            "query": serde_json::to_value(query)?,
        });
        Ok(self.keys.derive(&self.entity.name, method, &args, criteria))
    }

    async fn fetch_many(
        &self,
        method: &str,
        args: serde_json::Value,
        prepared: Prepared,
    ) -> RepositoryResult<Vec<Record>> {
        let visibility = prepared.visibility.clone();
        let mut rows: Vec<Record> = self
            .execute(method, args, prepared, |store, query| async move {
                store.get(&query).await
            })
            .await?;
        visibility.apply_all(&mut rows);
        Ok(rows)
    }

    async fn fetch_one(
        &self,
        method: &str,
        args: serde_json::Value,
        prepared: Prepared,
    ) -> RepositoryResult<Option<Record>> {
        let visibility = prepared.visibility.clone();
        let mut row: Option<Record> = self
            .execute(method, args, prepared, |store, query| async move {
                store.first(&query).await
            })
            .await?;
        if let Some(row) = row.as_mut() {
            visibility.apply(row);
        }
        Ok(row)
    }

    async fn execute<T, F, Fut>(
        &self,
        method: &str,
        args: serde_json::Value,
        prepared: Prepared,
        run: F,
    ) -> RepositoryResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Arc<S>, QueryBuilder) -> Fut,
        Fut: Future<Output = RepositoryResult<T>>,
    {
        let store = Arc::clone(&self.store);
        let Some(cache) = &self.cache else {
            return run(store, prepared.query).await;
        };

        let key = self.read_key(method, &args, &prepared.query, &prepared.criteria)?;
        debug!(method, key = %key, "Repository read");

        let query = prepared.query;
        cache
            .get_or_compute(&key, method, prepared.skip_cache, move || run(store, query))
            .await
    }

    // Writes

    /// Validate and insert `attributes`
    pub async fn create(&mut self, attributes: Record) -> RepositoryResult<Record> {
        self.reset_transient();
        self.validate(WriteAction::Create, &attributes)?;

        self.emit(
            RepositoryEvent::before(WriteAction::Create, &self.entity.name)
                .with_payload(attributes.clone()),
        );
        let record = self
            .store
            .insert(&self.entity.table, &self.entity.primary_key, attributes)
            .await?;
        self.invalidate(WriteAction::Create).await;

        let mut event = RepositoryEvent::after(WriteAction::Create, &self.entity.name)
            .with_payload(record.clone());
        if let Some(id) = record.get(&self.entity.primary_key) {
            event = event.with_id(id.clone());
        }
        self.emit(event);

        info!(entity = %self.entity.name, "Created record");
        Ok(record)
    }

    /// Validate and merge `attributes` into the row with `id`
    pub async fn update(
        &mut self,
        id: impl Into<Value>,
        attributes: Record,
    ) -> RepositoryResult<Record> {
        let id = id.into();
        self.reset_transient();
        self.validate(WriteAction::Update, &attributes)?;

        self.emit(
            RepositoryEvent::before(WriteAction::Update, &self.entity.name)
                .with_id(id.clone())
                .with_payload(attributes.clone()),
        );
        let record = self
            .store
            .update(&self.entity.table, &self.entity.primary_key, &id, attributes)
            .await?
            .ok_or_else(|| self.unknown(&id))?;
        self.invalidate(WriteAction::Update).await;
        self.emit(
            RepositoryEvent::after(WriteAction::Update, &self.entity.name)
                .with_id(id)
                .with_payload(record.clone()),
        );

        info!(entity = %self.entity.name, "Updated record");
        Ok(record)
    }

    /// Update the first row matching every attribute of `matching` with
    /// `values`, or create one from both
    pub async fn update_or_create(
        &mut self,
        matching: Record,
        values: Record,
    ) -> RepositoryResult<Record> {
        let query = matching
            .iter()
            .fold(QueryBuilder::new(self.entity.table.as_str()), |query, (field, value)| {
                query.where_eq(field.as_str(), value.clone())
            });

        let existing = self
            .store
            .first(&query)
            .await?
            .and_then(|row| row.get(&self.entity.primary_key).cloned());

        match existing {
            Some(id) => self.update(id, values).await,
            None => {
                let mut attributes = matching;
                attributes.extend(values);
                self.create(attributes).await
            }
        }
    }

    /// Delete the row with `id`
    pub async fn delete(&mut self, id: impl Into<Value>) -> RepositoryResult<()> {
        let id = id.into();
        self.reset_transient();

        self.emit(
            RepositoryEvent::before(WriteAction::Delete, &self.entity.name).with_id(id.clone()),
        );
        let removed = self
            .store
            .delete(&self.entity.table, &self.entity.primary_key, &id)
            .await?;
        if !removed {
            return Err(self.unknown(&id));
        }
        self.invalidate(WriteAction::Delete).await;
        self.emit(RepositoryEvent::after(WriteAction::Delete, &self.entity.name).with_id(id));

        info!(entity = %self.entity.name, "Deleted record");
        Ok(())
    }

    /// Delete every row matching all `conditions`; returns how many
    pub async fn delete_where(&mut self, conditions: &[FilterCondition]) -> RepositoryResult<usize> {
        self.reset_transient();
        let request = ParsedRequest {
            filters: conditions.to_vec(),
            ..Default::default()
        };
        let query = FilterQueryCompiler::new()
            .compile(&request, QueryBuilder::new(self.entity.table.as_str()))?;

        self.emit(RepositoryEvent::before(WriteAction::Delete, &self.entity.name));
        let removed = self.store.delete_where(&query).await?;
        self.invalidate(WriteAction::Delete).await;
        self.emit(RepositoryEvent::after(WriteAction::Delete, &self.entity.name));

        info!(entity = %self.entity.name, removed, "Deleted records");
        Ok(removed)
    }

    fn validate(&self, action: WriteAction, attributes: &Record) -> RepositoryResult<()> {
        match &self.validator {
            Some(validator) => validator
                .validate(action, attributes)
                .map_err(RepositoryError::ValidationFailed),
            None => Ok(()),
        }
    }

    async fn invalidate(&self, action: WriteAction) {
        if let Some(cache) = &self.cache {
            cache.invalidate(action).await;
        }
    }

    fn emit(&self, event: RepositoryEvent) {
        debug!(event = %event, "Repository event");
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }

    fn unknown(&self, id: &Value) -> RepositoryError {
        RepositoryError::UnknownEntity {
            entity: self.entity.name.clone(),
            id: id.to_json().to_string(),
        }
    }
}
