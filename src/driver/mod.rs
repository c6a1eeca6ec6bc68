//! Cache driver contract.
//!
//! Every backend implements the same surface: connect, get, set, remove,
//! namespace removal, flush, and key derivation. Backends differ only in how
//! they store entries; TTL enforcement and failure semantics are uniform.
//!
//! Failure semantics: `connect()` is the only operation whose errors reach the
//! caller (the application must know at startup whether its backend is
//! reachable). All other operations catch and log backend I/O errors and
//! degrade to a cache miss or no-op.

mod file;
mod memory;
mod null;
mod redis;

pub use file::FileDriver;
pub use memory::MemoryDriver;
pub use null::NullDriver;
pub use redis::{RedisConnection, RedisDriver};

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CacheError;
use crate::key::{self, KeySelector, Prefix};

/// Connection lifecycle of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Uniform contract implemented by every cache backend.
#[async_trait]
pub trait CacheDriver: Send + Sync {
    /// Stable backend identifier, used in logs and registry defaults.
    fn name(&self) -> &'static str;

    /// Establish the backend connection. Idempotent: calling on an already
    /// connected driver returns without work. Failures propagate.
    async fn connect(&self) -> Result<(), CacheError>;

    /// Fetch the unwrapped value for a key, or `None` on miss. A stored entry
    /// whose expiry has passed is deleted and reported as a miss.
    async fn get(&self, key: &str) -> Option<Value>;

    /// Store a value, overwriting unconditionally. A truthy `ttl` sets an
    /// absolute expiry on the entry envelope.
    async fn set(&self, key: &str, value: &Value, ttl_secs: Option<u64>);

    /// Delete one key.
    async fn remove(&self, key: &str);

    /// Delete exactly the keys under `namespace` (and the bare namespace key),
    /// leaving sibling keys untouched.
    async fn remove_namespace(&self, namespace: &str);

    /// Clear everything under the configured global prefix, or the entire
    /// backend when no prefix is set.
    async fn flush(&self);

    /// Derive a full cache key for a selector under this driver's prefix.
    fn parse_key(&self, selector: &KeySelector) -> String;

    /// Current connection state.
    fn state(&self) -> ConnectionState;
}

/// Convenience alias used at the seams.
pub type SharedDriver = Arc<dyn CacheDriver>;

/// Atomic connection-state cell shared by driver implementations.
#[derive(Debug)]
pub(crate) struct ConnState(AtomicU8);

impl ConnState {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Disconnected as u8))
    }

    pub(crate) fn get(&self) -> ConnectionState {
        match self.0.load(Ordering::SeqCst) {
            0 => ConnectionState::Disconnected,
            1 => ConnectionState::Connecting,
            _ => ConnectionState::Connected,
        }
    }

    pub(crate) fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Returns false when already connected, leaving the state untouched.
    /// Otherwise marks the driver as connecting and returns true.
    pub(crate) fn begin_connect(&self) -> bool {
        if self.get() == ConnectionState::Connected {
            return false;
        }
        self.set(ConnectionState::Connecting);
        true
    }
}

pub(crate) fn derive_key(prefix: &Prefix, selector: &KeySelector) -> String {
    key::parse_key(selector, prefix)
}
