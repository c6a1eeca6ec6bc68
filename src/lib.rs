//! Strato — cache-aside query layer for document repositories.
//!
//! Sits between a document-oriented data-access layer and its consumers:
//!
//! - **Cache drivers**: one contract over interchangeable backends
//!   (in-memory nested map, filesystem JSON-per-key, redis, no-op null),
//!   with uniform lazy TTL enforcement and degrade-to-miss failure handling.
//! - **Filter compiler**: declarative per-field filter specifications
//!   compiled into query predicates in deterministic declaration order.
//! - **Repository orchestration**: cache-aside `list`/`get`/`count`/`all`
//!   over an external `DocumentSource`, with serve-once purge semantics and
//!   locale-aware key derivation.
//! - **Invalidation**: post-mutation namespace clears with a one-level
//!   cascade to declared dependent repositories.
//!
//! ## Bootstrap
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use strato::{CacheRegistry, CacheSettings, DriverKind};
//!
//! # async fn bootstrap() -> Result<(), strato::CacheError> {
//! let registry = Arc::new(CacheRegistry::from_settings(&CacheSettings {
//!     driver: DriverKind::Memory,
//!     ttl: Some(300),
//!     ..CacheSettings::default()
//! })?);
//! // Connection failures surface here, fail-fast at startup.
//! registry.active().connect().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod entry;
mod error;
mod filter;
mod invalidation;
mod key;
mod locale;
mod lock;
mod query;
mod registry;
mod repository;
mod source;

pub mod driver;

pub use config::{CacheSettings, DriverKind};
pub use entry::CacheEntry;
pub use error::{CacheError, SourceError};
pub use filter::{FilterSet, FilterSpec, compile};
pub use invalidation::{
    InvalidationBinding, MutationBus, MutationEvent, MutationKind, repository_namespace,
};
pub use key::{KeySelector, Prefix, parse_key};
pub use locale::{current as current_locale, with_locale};
pub use query::{CompareOp, FilterValue, Predicate, Query, SortDirection};
pub use registry::CacheRegistry;
pub use repository::{CachedRepository, RepositoryOptions};
pub use source::DocumentSource;
