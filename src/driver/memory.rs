//! In-process nested-map backend.
//!
//! Keys are split on `.` into a tree of nodes, so a namespace removal is a
//! single subtree detach. Entries carry the TTL envelope; expiry is enforced
//! at read time.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::key::{KeySelector, Prefix};
use crate::lock::{rw_read, rw_write};

use super::{CacheDriver, ConnState, ConnectionState, derive_key};

const SOURCE: &str = "driver::memory";

#[derive(Debug, Default)]
struct Node {
    entry: Option<CacheEntry>,
    children: HashMap<String, Node>,
}

impl Node {
    fn descend(&self, segments: &[&str]) -> Option<&Node> {
        let mut node = self;
        for segment in segments {
            node = node.children.get(*segment)?;
        }
        Some(node)
    }

    #[cfg(test)]
    fn descend_mut(&mut self, segments: &[&str]) -> Option<&mut Node> {
        let mut node = self;
        for segment in segments {
            node = node.children.get_mut(*segment)?;
        }
        Some(node)
    }

    fn is_empty(&self) -> bool {
        self.entry.is_none() && self.children.is_empty()
    }

    fn remove_at(&mut self, segments: &[&str]) {
        match segments {
            [] => self.entry = None,
            [head, rest @ ..] => {
                if let Some(child) = self.children.get_mut(*head) {
                    child.remove_at(rest);
                    if child.is_empty() {
                        self.children.remove(*head);
                    }
                }
            }
        }
    }

    fn detach_at(&mut self, segments: &[&str]) {
        match segments {
            [] => {
                self.entry = None;
                self.children.clear();
            }
            [leaf] => {
                self.children.remove(*leaf);
            }
            [head, rest @ ..] => {
                if let Some(child) = self.children.get_mut(*head) {
                    child.detach_at(rest);
                    if child.is_empty() {
                        self.children.remove(*head);
                    }
                }
            }
        }
    }
}

/// In-memory cache backend backed by a nested map.
pub struct MemoryDriver {
    prefix: Prefix,
    state: ConnState,
    root: RwLock<Node>,
}

impl MemoryDriver {
    pub fn new(prefix: Prefix) -> Self {
        Self {
            prefix,
            state: ConnState::new(),
            root: RwLock::new(Node::default()),
        }
    }

    fn segments(key: &str) -> Vec<&str> {
        key.split('.').filter(|s| !s.is_empty()).collect()
    }
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new(Prefix::None)
    }
}

#[async_trait]
impl CacheDriver for MemoryDriver {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn connect(&self) -> Result<(), CacheError> {
        if self.state.begin_connect() {
            self.state.set(ConnectionState::Connected);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Option<Value> {
        let segments = Self::segments(key);
        let expired = {
            let root = rw_read(&self.root, SOURCE, "get");
            let entry = root.descend(&segments)?.entry.as_ref()?;
            if entry.is_expired() {
                true
            } else {
                return Some(entry.data.clone());
            }
        };
        if expired {
            self.remove(key).await;
        }
        None
    }

    async fn set(&self, key: &str, value: &Value, ttl_secs: Option<u64>) {
        let entry = CacheEntry::new(value.clone(), ttl_secs);
        let mut root = rw_write(&self.root, SOURCE, "set");
        let mut node = &mut *root;
        for segment in Self::segments(key) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.entry = Some(entry);
    }

    async fn remove(&self, key: &str) {
        let segments = Self::segments(key);
        rw_write(&self.root, SOURCE, "remove").remove_at(&segments);
    }

    async fn remove_namespace(&self, namespace: &str) {
        let segments = Self::segments(namespace);
        rw_write(&self.root, SOURCE, "remove_namespace").detach_at(&segments);
    }

    async fn flush(&self) {
        match self.prefix.resolve() {
            Some(prefix) => self.remove_namespace(&prefix).await,
            None => {
                let mut root = rw_write(&self.root, SOURCE, "flush");
                *root = Node::default();
            }
        }
    }

    fn parse_key(&self, selector: &KeySelector) -> String {
        derive_key(&self.prefix, selector)
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }
}
