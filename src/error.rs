use thiserror::Error;

/// Errors surfaced by the cache layer.
///
/// Only `connect()` and registry lookups produce errors for callers. Runtime
/// driver I/O inside `get`/`set`/`remove` degrades to a miss or no-op instead,
/// because the cache is an optimization layer and must never fail a request.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache driver `{driver}` failed to connect: {message}")]
    Connect { driver: &'static str, message: String },
    #[error("no cache driver registered under `{name}`")]
    UnknownDriver { name: String },
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub fn connect(driver: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Connect {
            driver,
            message: message.to_string(),
        }
    }

    pub fn unknown_driver(name: impl Into<String>) -> Self {
        Self::UnknownDriver { name: name.into() }
    }
}

/// Errors from the external document source backing a cached repository.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("query execution failed: {0}")]
    Query(String),
    #[error("source collection `{collection}` unavailable: {message}")]
    Unavailable { collection: String, message: String },
}

impl SourceError {
    pub fn query(err: impl std::fmt::Display) -> Self {
        Self::Query(err.to_string())
    }

    pub fn unavailable(collection: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            collection: collection.into(),
            message: message.to_string(),
        }
    }
}
