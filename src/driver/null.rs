//! No-op backend.
//!
//! The default driver before any backend is configured. Satisfies the full
//! contract while storing nothing, so the rest of the system behaves
//! correctly with caching disabled: every read is a miss, every write
//! succeeds trivially.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CacheError;
use crate::key::{KeySelector, Prefix};

use super::{CacheDriver, ConnState, ConnectionState, derive_key};

pub struct NullDriver {
    prefix: Prefix,
    state: ConnState,
}

impl NullDriver {
    pub fn new(prefix: Prefix) -> Self {
        Self {
            prefix,
            state: ConnState::new(),
        }
    }
}

impl Default for NullDriver {
    fn default() -> Self {
        Self::new(Prefix::None)
    }
}

#[async_trait]
impl CacheDriver for NullDriver {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn connect(&self) -> Result<(), CacheError> {
        if self.state.begin_connect() {
            self.state.set(ConnectionState::Connected);
        }
        Ok(())
    }

    async fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    async fn set(&self, _key: &str, _value: &Value, _ttl_secs: Option<u64>) {}

    async fn remove(&self, _key: &str) {}

    async fn remove_namespace(&self, _namespace: &str) {}

    async fn flush(&self) {}

    fn parse_key(&self, selector: &KeySelector) -> String {
        derive_key(&self.prefix, selector)
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn never_stores_anything() {
        let driver = NullDriver::default();
        driver.connect().await.expect("connect never fails");

        driver.set("k", &json!(1), None).await;
        assert_eq!(driver.get("k").await, None);

        driver.remove("k").await;
        driver.remove_namespace("ns").await;
        driver.flush().await;
        assert_eq!(driver.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn still_derives_keys() {
        let driver = NullDriver::new(Prefix::fixed("app"));
        assert_eq!(driver.parse_key(&KeySelector::from("a:b")), "app.a.b");
    }
}
