//! Cache-aside repository orchestration.
//!
//! Wraps a `DocumentSource` with cache-aside semantics: each cacheable
//! method derives a deterministic key from its options, consults the active
//! driver, and on a miss compiles the declared filters into a query, executes
//! it, and writes the plain-data result back through the driver.
//!
//! There is no single-flight coalescing: concurrent misses for the same key
//! each execute the underlying query. The cache layer trades that stampede
//! for having no locks on the read path.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::driver::SharedDriver;
use crate::error::SourceError;
use crate::filter::{self, FilterSet};
use crate::invalidation::{InvalidationBinding, MutationBus, repository_namespace};
use crate::key::KeySelector;
use crate::locale;
use crate::query::{Query, SortDirection};
use crate::registry::CacheRegistry;
use crate::source::DocumentSource;

/// Runtime arguments for a cached repository call.
///
/// Filter values keep their insertion order, and that order participates in
/// cache-key derivation: two logically identical option sets built in a
/// different order produce different keys. This is a documented limitation —
/// the cost is an extra miss, never a wrong hit.
///
/// The `perform` hook and the cache modifiers (`purge_cache`,
/// `expires_after`) are excluded from key derivation: the hook is a closure
/// and cannot be serialized, and a purging call must hit the same key as the
/// call that populated it for serve-once semantics to work.
#[derive(Clone, Default)]
pub struct RepositoryOptions {
    page: Option<usize>,
    limit: Option<usize>,
    paginate: bool,
    order: Vec<(String, SortDirection)>,
    filters: Vec<(String, Value)>,
    purge_cache: bool,
    expires_after: Option<u64>,
    perform: Option<Arc<dyn Fn(&mut Query) + Send + Sync>>,
}

impl RepositoryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a runtime value for a declared filter field.
    pub fn filter(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filters.push((field.into(), value));
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Turn `page`/`limit` into offset pagination instead of a plain limit.
    pub fn paginate(mut self) -> Self {
        self.paginate = true;
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order.push((column.into(), direction));
        self
    }

    /// Serve the cached value once more, then evict it so the next call
    /// recomputes. Distinct from TTL expiry.
    pub fn purge_cache(mut self) -> Self {
        self.purge_cache = true;
        self
    }

    /// Expiry for the entry written by this call, in seconds.
    pub fn expires_after(mut self, ttl_secs: u64) -> Self {
        self.expires_after = Some(ttl_secs);
        self
    }

    /// Escape hatch: mutate the compiled query before execution.
    pub fn perform(mut self, f: impl Fn(&mut Query) + Send + Sync + 'static) -> Self {
        self.perform = Some(Arc::new(f));
        self
    }

    /// Serialize the identity-relevant parts of the options into a key
    /// selector object, preserving insertion order.
    fn key_selector(&self) -> Option<KeySelector> {
        let mut object = serde_json::Map::new();
        if let Some(page) = self.page {
            object.insert("page".to_string(), Value::from(page));
        }
        if let Some(limit) = self.limit {
            object.insert("limit".to_string(), Value::from(limit));
        }
        if self.paginate {
            object.insert("paginate".to_string(), Value::Bool(true));
        }
        for (column, direction) in &self.order {
            let direction = match direction {
                SortDirection::Asc => "asc",
                SortDirection::Desc => "desc",
            };
            object.insert(format!("order.{column}"), Value::from(direction));
        }
        for (field, value) in &self.filters {
            object.insert(field.clone(), value.clone());
        }
        if object.is_empty() {
            None
        } else {
            Some(KeySelector::Object(Value::Object(object)))
        }
    }
}

impl fmt::Debug for RepositoryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryOptions")
            .field("page", &self.page)
            .field("limit", &self.limit)
            .field("paginate", &self.paginate)
            .field("order", &self.order)
            .field("filters", &self.filters)
            .field("purge_cache", &self.purge_cache)
            .field("expires_after", &self.expires_after)
            .field("perform", &self.perform.as_ref().map(|_| ".."))
            .finish()
    }
}

/// A repository wrapped with cache-aside semantics.
pub struct CachedRepository<S: DocumentSource> {
    source: S,
    driver: SharedDriver,
    filters: FilterSet,
    dependents: Vec<String>,
    default_ttl: Option<u64>,
}

impl<S: DocumentSource> CachedRepository<S> {
    /// Bind a source to a driver with the built-in default filter set.
    pub fn new(source: S, driver: SharedDriver) -> Self {
        Self {
            source,
            driver,
            filters: FilterSet::defaults(),
            dependents: Vec::new(),
            default_ttl: None,
        }
    }

    /// Bind to the registry's active driver and default TTL.
    pub fn from_registry(source: S, registry: &CacheRegistry) -> Self {
        let default_ttl = registry.default_ttl();
        let mut repository = Self::new(source, registry.active());
        repository.default_ttl = default_ttl;
        repository
    }

    /// Merge declared filter specs over the built-in defaults.
    pub fn with_filters(mut self, declared: FilterSet) -> Self {
        self.filters = FilterSet::defaults().merge(declared);
        self
    }

    /// Declare dependent repositories whose namespaces are cleared one level
    /// deep whenever this repository's cache is invalidated.
    pub fn with_dependents(mut self, dependents: Vec<String>) -> Self {
        self.dependents = dependents;
        self
    }

    pub fn with_default_ttl(mut self, ttl_secs: Option<u64>) -> Self {
        self.default_ttl = ttl_secs;
        self
    }

    pub fn collection(&self) -> &str {
        self.source.collection()
    }

    pub fn driver(&self) -> &SharedDriver {
        &self.driver
    }

    /// Subscribe this repository's invalidation binding to the mutation bus.
    pub fn register_with(&self, bus: &MutationBus) {
        bus.subscribe(InvalidationBinding {
            collection: self.collection().to_string(),
            driver: self.driver.clone(),
            dependents: self.dependents.clone(),
        });
    }

    /// Clear this repository's entire cache namespace.
    pub async fn invalidate(&self) {
        let namespace = self
            .driver
            .parse_key(&KeySelector::Text(repository_namespace(self.collection())));
        self.driver.remove_namespace(&namespace).await;
    }

    /// Cached list query: all records matching the compiled options.
    pub async fn list_cached(
        &self,
        options: &RepositoryOptions,
    ) -> Result<Vec<S::Record>, SourceError> {
        let key = self.cache_key("list", options);

        if let Some(cached) = self.read_cached(&key, options).await {
            match serde_json::from_value::<Vec<S::Record>>(cached) {
                Ok(records) => return Ok(records),
                Err(error) => {
                    warn!(key, error = %error, "Cached payload failed rehydration; recomputing");
                }
            }
        }

        let query = self.build_query(options);
        let records = self.source.fetch(&query).await?;
        self.write_through(&key, serde_json::to_value(&records), options)
            .await;
        Ok(records)
    }

    /// Cached point query: the first record matching the compiled options.
    pub async fn get_cached(
        &self,
        options: &RepositoryOptions,
    ) -> Result<Option<S::Record>, SourceError> {
        let key = self.cache_key("get", options);

        if let Some(cached) = self.read_cached(&key, options).await {
            if cached.is_null() {
                return Ok(None);
            }
            match serde_json::from_value::<S::Record>(cached) {
                Ok(record) => return Ok(Some(record)),
                Err(error) => {
                    warn!(key, error = %error, "Cached payload failed rehydration; recomputing");
                }
            }
        }

        let mut query = self.build_query(options);
        query.limit(1);
        let mut records = self.source.fetch(&query).await?;
        let record = if records.is_empty() {
            None
        } else {
            Some(records.remove(0))
        };
        self.write_through(&key, serde_json::to_value(&record), options)
            .await;
        Ok(record)
    }

    /// Cached count of records matching the compiled options.
    pub async fn count_cached(&self, options: &RepositoryOptions) -> Result<u64, SourceError> {
        let key = self.cache_key("count", options);

        if let Some(cached) = self.read_cached(&key, options).await
            && let Some(count) = cached.as_u64()
        {
            return Ok(count);
        }

        let query = self.build_query(options);
        let count = self.source.count(&query).await?;
        self.write_through(&key, Ok(Value::from(count)), options).await;
        Ok(count)
    }

    /// Cached unfiltered listing of the whole collection.
    pub async fn all_cached(&self) -> Result<Vec<S::Record>, SourceError> {
        let options = RepositoryOptions::new();
        let key = self.cache_key("all", &options);

        if let Some(cached) = self.read_cached(&key, &options).await {
            match serde_json::from_value::<Vec<S::Record>>(cached) {
                Ok(records) => return Ok(records),
                Err(error) => {
                    warn!(key, error = %error, "Cached payload failed rehydration; recomputing");
                }
            }
        }

        let records = self.source.fetch(&Query::new()).await?;
        self.write_through(&key, serde_json::to_value(&records), &options)
            .await;
        Ok(records)
    }

    /// Compile options into an executable query.
    fn build_query(&self, options: &RepositoryOptions) -> Query {
        let mut query = Query::new();
        filter::compile(&self.filters, &options.filters, &mut query);

        for (column, direction) in &options.order {
            query.order_by(column.clone(), *direction);
        }
        if options.paginate {
            query.paginate(options.page.unwrap_or(1), options.limit.unwrap_or(25));
        } else if let Some(limit) = options.limit {
            query.limit(limit);
        }
        if let Some(perform) = &options.perform {
            perform(&mut query);
        }
        query
    }

    /// Derive the cache key for a method call:
    /// `[locale.<code>.]repositories.<collection>.<method>[.<options>]`.
    fn cache_key(&self, method: &str, options: &RepositoryOptions) -> String {
        let mut base = format!("{}.{method}", repository_namespace(self.collection()));
        if let Some(selector) = options.key_selector() {
            base.push('.');
            base.push_str(&selector.encode());
        }
        if let Some(code) = locale::current() {
            base = format!("locale.{code}.{base}");
        }
        self.driver.parse_key(&KeySelector::Text(base))
    }

    /// Driver read honoring serve-once purge semantics: a hit with
    /// `purge_cache` set is returned and then evicted, so the *next* call
    /// recomputes.
    async fn read_cached(&self, key: &str, options: &RepositoryOptions) -> Option<Value> {
        let Some(hit) = self.driver.get(key).await else {
            debug!(key, "Cache miss");
            return None;
        };
        debug!(key, "Cache hit");
        if options.purge_cache {
            debug!(key, "Serve-once purge: returning cached value, then evicting");
            self.driver.remove(key).await;
        }
        Some(hit)
    }

    /// Write a computed result back through the driver. Serialization
    /// failures skip the write; the live result is still returned upstream.
    async fn write_through(
        &self,
        key: &str,
        data: Result<Value, serde_json::Error>,
        options: &RepositoryOptions,
    ) {
        match data {
            Ok(data) => {
                let ttl = options.expires_after.or(self.default_ttl);
                self.driver.set(key, &data, ttl).await;
            }
            Err(error) => {
                warn!(key, error = %error, "Result serialization failed; skipping cache write");
            }
        }
    }
}
