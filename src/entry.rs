//! Cache entry envelope.
//!
//! Every stored value is wrapped with an optional absolute expiry timestamp.
//! Expiry is enforced lazily at read time, which gives uniform TTL behavior
//! even on backends with no native expiry primitive.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// A cached value with its optional absolute expiry (epoch milliseconds).
///
/// Entries are consulted, never mutated in place: a read either returns the
/// wrapped data or treats the entry as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl CacheEntry {
    /// Wrap a value for storage. A `ttl` of `None` or zero means the entry
    /// never expires.
    pub fn new(data: Value, ttl_secs: Option<u64>) -> Self {
        let expires_at = ttl_secs
            .filter(|ttl| *ttl > 0)
            .map(|ttl| now_ms() + (ttl as i64) * 1000);
        Self { data, expires_at }
    }

    /// Whether the entry has passed its expiry at the given instant.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now_ms)
    }

    /// Whether the entry has passed its expiry now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_ms())
    }
}

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn entry_without_ttl_never_expires() {
        let entry = CacheEntry::new(json!({"n": 1}), None);
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired_at(i64::MAX));
    }

    #[test]
    fn zero_ttl_means_no_expiry() {
        let entry = CacheEntry::new(json!(true), Some(0));
        assert!(entry.expires_at.is_none());
    }

    #[test]
    fn entry_expires_after_ttl() {
        let entry = CacheEntry::new(json!("v"), Some(1));
        let expires_at = entry.expires_at.expect("expiry set");

        assert!(!entry.is_expired_at(expires_at - 1));
        assert!(entry.is_expired_at(expires_at));
        assert!(entry.is_expired_at(expires_at + 1));
    }

    #[test]
    fn serialization_omits_absent_expiry() {
        let entry = CacheEntry::new(json!([1, 2]), None);
        let serialized = serde_json::to_string(&entry).expect("serialize");
        assert!(!serialized.contains("expires_at"));

        let parsed: CacheEntry = serde_json::from_str(&serialized).expect("deserialize");
        assert_eq!(parsed, entry);
    }

    #[test]
    fn serialization_round_trips_expiry() {
        let entry = CacheEntry::new(json!("soon"), Some(60));
        let serialized = serde_json::to_string(&entry).expect("serialize");
        let parsed: CacheEntry = serde_json::from_str(&serialized).expect("deserialize");
        assert_eq!(parsed.expires_at, entry.expires_at);
    }
}
