//! The document-source seam.
//!
//! A `DocumentSource` is the external query-execution collaborator backing a
//! cached repository: it owns the actual store and interprets compiled
//! queries against it. The cache layer only ever sees plain serializable
//! record snapshots, never live store handles.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::SourceError;
use crate::query::Query;

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Record type produced by this source. Serialized to plain data before
    /// caching and rehydrated on a hit.
    type Record: Serialize + DeserializeOwned + Send + Sync;

    /// Collection name; doubles as the repository's cache namespace segment.
    fn collection(&self) -> &str;

    /// Execute a compiled query and return matching records.
    async fn fetch(&self, query: &Query) -> Result<Vec<Self::Record>, SourceError>;

    /// Count records matching a compiled query, ignoring pagination.
    async fn count(&self, query: &Query) -> Result<u64, SourceError>;
}
