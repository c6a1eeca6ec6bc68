//! Driver registry.
//!
//! An owned `CacheRegistry` is constructed at application bootstrap and passed
//! by reference (`Arc`) to every consumer. There is no process-global
//! singleton, and switching the active backend swaps an `Arc` handle rather
//! than mutating a shared driver object in place. Consumers that captured the
//! previous handle keep using it until they re-resolve.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::config::{CacheSettings, DriverKind};
use crate::driver::{
    CacheDriver, FileDriver, MemoryDriver, NullDriver, RedisConnection, RedisDriver, SharedDriver,
};
use crate::error::CacheError;
use crate::key::Prefix;
use crate::lock::{rw_read, rw_write};

const SOURCE: &str = "registry";

pub struct CacheRegistry {
    drivers: RwLock<HashMap<String, SharedDriver>>,
    active: RwLock<SharedDriver>,
    default_ttl: Option<u64>,
}

impl CacheRegistry {
    /// Create a registry whose active driver is the no-op null driver.
    pub fn new() -> Self {
        let null: SharedDriver = Arc::new(NullDriver::default());
        let mut drivers = HashMap::new();
        drivers.insert("null".to_string(), null.clone());
        Self {
            drivers: RwLock::new(drivers),
            active: RwLock::new(null),
            default_ttl: None,
        }
    }

    /// Build a registry from settings, registering and activating the
    /// configured backend. The driver is constructed but not yet connected;
    /// call `connect()` on the active driver during startup so connection
    /// failures surface fail-fast.
    pub fn from_settings(settings: &CacheSettings) -> Result<Self, CacheError> {
        let mut registry = Self::new();
        registry.default_ttl = settings.ttl;

        let prefix = match &settings.global_prefix {
            Some(prefix) => Prefix::fixed(prefix.clone()),
            None => Prefix::None,
        };

        let driver: SharedDriver = match settings.driver {
            DriverKind::Null => Arc::new(NullDriver::new(prefix)),
            DriverKind::Memory => Arc::new(MemoryDriver::new(prefix)),
            DriverKind::File => Arc::new(
                FileDriver::new(settings.directory.clone(), prefix)
                    .with_file_name(settings.file_name.clone()),
            ),
            DriverKind::Redis => {
                let connection = RedisConnection {
                    url: settings.url.clone(),
                    host: settings.host.clone(),
                    port: settings.port,
                    username: settings.username.clone(),
                    password: settings.password.clone(),
                };
                Arc::new(RedisDriver::new(connection, prefix))
            }
        };

        let name = settings.driver.as_str();
        registry.register(name, driver);
        registry.set_active(name)?;
        Ok(registry)
    }

    /// Register a driver under a name, replacing any previous registration.
    pub fn register(&self, name: impl Into<String>, driver: SharedDriver) {
        rw_write(&self.drivers, SOURCE, "register").insert(name.into(), driver);
    }

    /// Resolve a driver by name.
    pub fn driver(&self, name: &str) -> Result<SharedDriver, CacheError> {
        rw_read(&self.drivers, SOURCE, "driver")
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::unknown_driver(name))
    }

    /// Make a registered driver the active default and return the new handle.
    pub fn set_active(&self, name: &str) -> Result<SharedDriver, CacheError> {
        let driver = self.driver(name)?;
        *rw_write(&self.active, SOURCE, "set_active") = driver.clone();
        info!(driver = name, "Active cache driver switched");
        Ok(driver)
    }

    /// Current active driver handle.
    pub fn active(&self) -> SharedDriver {
        rw_read(&self.active, SOURCE, "active").clone()
    }

    /// Default TTL (seconds) applied when a repository write specifies none.
    pub fn default_ttl(&self) -> Option<u64> {
        self.default_ttl
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn starts_with_null_driver_active() {
        let registry = CacheRegistry::new();
        let active = registry.active();
        assert_eq!(active.name(), "null");

        active.set("k", &json!(1), None).await;
        assert_eq!(active.get("k").await, None);
    }

    #[test]
    fn unknown_driver_lookup_fails() {
        let registry = CacheRegistry::new();
        assert!(matches!(
            registry.driver("memcached"),
            Err(CacheError::UnknownDriver { .. })
        ));
    }

    #[tokio::test]
    async fn set_active_swaps_handle_without_mutating_old_one() {
        let registry = CacheRegistry::new();
        registry.register("memory", Arc::new(MemoryDriver::default()));

        let before = registry.active();
        let after = registry.set_active("memory").expect("switch");

        assert_eq!(before.name(), "null");
        assert_eq!(after.name(), "memory");
        assert_eq!(registry.active().name(), "memory");

        // The old handle is untouched: still a functioning null driver.
        before.set("k", &json!(1), None).await;
        assert_eq!(before.get("k").await, None);
        after.set("k", &json!(1), None).await;
        assert_eq!(after.get("k").await, Some(json!(1)));
    }

    #[test]
    fn from_settings_activates_configured_backend() {
        let settings = CacheSettings {
            driver: DriverKind::Memory,
            ttl: Some(120),
            ..CacheSettings::default()
        };
        let registry = CacheRegistry::from_settings(&settings).expect("build");
        assert_eq!(registry.active().name(), "memory");
        assert_eq!(registry.default_ttl(), Some(120));
    }

    #[test]
    fn from_settings_defaults_to_null() {
        let registry = CacheRegistry::from_settings(&CacheSettings::default()).expect("build");
        assert_eq!(registry.active().name(), "null");
    }
}
