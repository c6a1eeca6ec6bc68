//! Mutation-driven cache invalidation.
//!
//! Repositories subscribe a binding (collection, driver, declared dependents)
//! to the `MutationBus`. The model layer publishes a mutation event after a
//! record is persisted or removed; the bus then clears the owning
//! repository's namespace and cascades to each declared dependent.
//!
//! The cascade is exactly one level deep: a dependent's own dependents are
//! never touched. Widening this to a transitive closure changes the
//! invalidation blast radius and is a deliberate non-change.

use std::sync::RwLock;

use tracing::{debug, info};

use crate::driver::SharedDriver;
use crate::key::KeySelector;
use crate::lock::{rw_read, rw_write};

const SOURCE: &str = "invalidation";

/// What happened to a record, reported after persistence completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Saved,
    Deleted,
}

/// A mutation event published by the model layer.
#[derive(Debug, Clone)]
pub struct MutationEvent {
    pub collection: String,
    pub kind: MutationKind,
}

/// The cache namespace owned by a repository.
pub fn repository_namespace(collection: &str) -> String {
    format!("repositories.{collection}")
}

/// A repository's static invalidation edge set: its own namespace plus the
/// collections whose caches must be cleared alongside it.
#[derive(Clone)]
pub struct InvalidationBinding {
    pub collection: String,
    pub driver: SharedDriver,
    pub dependents: Vec<String>,
}

/// Dispatches mutation events to namespace clears.
///
/// Bindings are registered once at repository construction; the adjacency
/// list is immutable in practice after bootstrap.
pub struct MutationBus {
    bindings: RwLock<Vec<InvalidationBinding>>,
}

impl MutationBus {
    pub fn new() -> Self {
        Self {
            bindings: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, binding: InvalidationBinding) {
        rw_write(&self.bindings, SOURCE, "subscribe").push(binding);
    }

    /// Publish a post-save mutation for a collection.
    pub async fn saved(&self, collection: &str) {
        self.publish(MutationEvent {
            collection: collection.to_string(),
            kind: MutationKind::Saved,
        })
        .await;
    }

    /// Publish a post-delete mutation for a collection.
    pub async fn deleted(&self, collection: &str) {
        self.publish(MutationEvent {
            collection: collection.to_string(),
            kind: MutationKind::Deleted,
        })
        .await;
    }

    /// Clear the mutated collection's namespace, then cascade one level to
    /// its declared dependents.
    pub async fn publish(&self, event: MutationEvent) {
        info!(
            collection = %event.collection,
            kind = ?event.kind,
            "Mutation event; clearing repository cache namespace"
        );

        // Snapshot the affected bindings before awaiting any driver I/O.
        let (owner, dependents) = {
            let bindings = rw_read(&self.bindings, SOURCE, "publish");
            let Some(owner) = bindings
                .iter()
                .find(|b| b.collection == event.collection)
                .cloned()
            else {
                debug!(
                    collection = %event.collection,
                    "No invalidation binding for mutated collection; nothing to clear"
                );
                return;
            };
            let dependents: Vec<InvalidationBinding> = owner
                .dependents
                .iter()
                .filter_map(|name| bindings.iter().find(|b| b.collection == *name).cloned())
                .collect();
            (owner, dependents)
        };

        clear_binding(&owner).await;
        for dependent in dependents {
            debug!(
                collection = %event.collection,
                dependent = %dependent.collection,
                "Cascading cache invalidation to dependent repository"
            );
            clear_binding(&dependent).await;
        }
    }
}

impl Default for MutationBus {
    fn default() -> Self {
        Self::new()
    }
}

async fn clear_binding(binding: &InvalidationBinding) {
    let namespace = binding
        .driver
        .parse_key(&KeySelector::Text(repository_namespace(&binding.collection)));
    binding.driver.remove_namespace(&namespace).await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::driver::{CacheDriver, MemoryDriver};
    use crate::key::Prefix;

    use super::*;

    fn bus_with(
        driver: &Arc<MemoryDriver>,
        edges: &[(&str, &[&str])],
    ) -> MutationBus {
        let bus = MutationBus::new();
        for (collection, dependents) in edges {
            bus.subscribe(InvalidationBinding {
                collection: collection.to_string(),
                driver: driver.clone(),
                dependents: dependents.iter().map(|d| d.to_string()).collect(),
            });
        }
        bus
    }

    #[tokio::test]
    async fn save_clears_owning_namespace_only() {
        let driver = Arc::new(MemoryDriver::default());
        let bus = bus_with(&driver, &[("posts", &[]), ("tags", &[])]);

        driver.set("repositories.posts.list", &json!([1]), None).await;
        driver.set("repositories.tags.list", &json!([2]), None).await;

        bus.saved("posts").await;

        assert_eq!(driver.get("repositories.posts.list").await, None);
        assert_eq!(driver.get("repositories.tags.list").await, Some(json!([2])));
    }

    #[tokio::test]
    async fn cascade_is_one_level_not_transitive() {
        let driver = Arc::new(MemoryDriver::default());
        // posts -> tags -> archives: clearing posts must not reach archives.
        let bus = bus_with(
            &driver,
            &[
                ("posts", &["tags"]),
                ("tags", &["archives"]),
                ("archives", &[]),
            ],
        );

        driver.set("repositories.posts.list", &json!(1), None).await;
        driver.set("repositories.tags.list", &json!(2), None).await;
        driver.set("repositories.archives.list", &json!(3), None).await;

        bus.deleted("posts").await;

        assert_eq!(driver.get("repositories.posts.list").await, None);
        assert_eq!(driver.get("repositories.tags.list").await, None);
        assert_eq!(
            driver.get("repositories.archives.list").await,
            Some(json!(3))
        );
    }

    #[tokio::test]
    async fn unknown_collection_is_a_noop() {
        let driver = Arc::new(MemoryDriver::default());
        let bus = bus_with(&driver, &[("posts", &[])]);

        driver.set("repositories.posts.list", &json!(1), None).await;
        bus.saved("unregistered").await;
        assert_eq!(driver.get("repositories.posts.list").await, Some(json!(1)));
    }

    #[tokio::test]
    async fn namespace_clear_respects_driver_prefix() {
        let driver = Arc::new(MemoryDriver::new(Prefix::fixed("app")));
        let bus = bus_with(&driver, &[("posts", &[])]);

        driver.set("app.repositories.posts.list", &json!(1), None).await;
        bus.saved("posts").await;
        assert_eq!(driver.get("app.repositories.posts.list").await, None);
    }
}
