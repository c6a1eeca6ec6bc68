//! Cache configuration.
//!
//! `CacheSettings` is the recognized configuration surface for the cache
//! layer. It deserializes from whatever configuration source the host
//! application uses and builds into a registry via
//! [`crate::registry::CacheRegistry::from_settings`].

use serde::Deserialize;

const DEFAULT_DIRECTORY: &str = ".cache";
const DEFAULT_FILE_NAME: &str = "entry.json";

/// Which backend the registry should activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// No-op driver: caching disabled.
    #[default]
    Null,
    Memory,
    File,
    Redis,
}

impl DriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Memory => "memory",
            Self::File => "file",
            Self::Redis => "redis",
        }
    }
}

/// Cache layer settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Backend to activate.
    pub driver: DriverKind,
    /// Default TTL in seconds applied to repository writes that do not
    /// specify one. `None` means entries never expire.
    pub ttl: Option<u64>,
    /// Global key prefix (per-tenant scoping uses a provider set in code).
    pub global_prefix: Option<String>,
    /// Root directory for the file driver.
    pub directory: String,
    /// Leaf file name for the file driver.
    pub file_name: String,
    /// Redis host; ignored when `url` is set.
    pub host: Option<String>,
    /// Redis port; ignored when `url` is set.
    pub port: Option<u16>,
    /// Full redis connection URL.
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            driver: DriverKind::Null,
            ttl: None,
            global_prefix: None,
            directory: DEFAULT_DIRECTORY.to_string(),
            file_name: DEFAULT_FILE_NAME.to_string(),
            host: None,
            port: None,
            url: None,
            username: None,
            password: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_driver_is_null() {
        let settings = CacheSettings::default();
        assert_eq!(settings.driver, DriverKind::Null);
        assert_eq!(settings.ttl, None);
        assert_eq!(settings.directory, ".cache");
        assert_eq!(settings.file_name, "entry.json");
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let settings: CacheSettings = serde_json::from_str(
            r#"{"driver": "memory", "ttl": 300, "global_prefix": "app"}"#,
        )
        .expect("deserialize");

        assert_eq!(settings.driver, DriverKind::Memory);
        assert_eq!(settings.ttl, Some(300));
        assert_eq!(settings.global_prefix.as_deref(), Some("app"));
        assert_eq!(settings.file_name, "entry.json");
    }

    #[test]
    fn driver_kind_names_are_stable() {
        assert_eq!(DriverKind::Null.as_str(), "null");
        assert_eq!(DriverKind::Memory.as_str(), "memory");
        assert_eq!(DriverKind::File.as_str(), "file");
        assert_eq!(DriverKind::Redis.as_str(), "redis");
    }
}
