//! Cache key derivation.
//!
//! Every cache key in the system is produced here: a string-or-object selector
//! is flattened into a dot-delimited key, optionally under a global prefix.
//! Keys are never assembled ad hoc elsewhere.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Selector from which a cache key is derived.
///
/// Structured selectors are serialized and flattened; plain text selectors
/// only get separator normalization. Object key order is preserved as given,
/// not canonicalized: two logically identical selectors built in a different
/// field order produce different keys (an extra miss, never a wrong hit).
#[derive(Debug, Clone, PartialEq)]
pub enum KeySelector {
    Text(String),
    Object(Value),
}

impl KeySelector {
    /// Flatten the selector into a dot-delimited segment string.
    pub fn encode(&self) -> String {
        match self {
            Self::Text(text) => normalize_separators(text),
            Self::Object(value) => {
                let serialized = value.to_string();
                let stripped: String = serialized
                    .chars()
                    .filter(|c| !matches!(c, '{' | '}' | '"'))
                    .collect();
                normalize_separators(&stripped)
            }
        }
    }
}

impl From<&str> for KeySelector {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for KeySelector {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Value> for KeySelector {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            other => Self::Object(other),
        }
    }
}

fn normalize_separators(input: &str) -> String {
    input.replace([':', ','], ".")
}

/// Global key prefix configured on a driver.
///
/// A provider variant is resolved on every call, so prefixes that vary at
/// runtime (per-tenant scoping) stay current without driver reconstruction.
#[derive(Clone, Default)]
pub enum Prefix {
    #[default]
    None,
    Static(String),
    Provider(Arc<dyn Fn() -> String + Send + Sync>),
}

impl Prefix {
    pub fn fixed(prefix: impl Into<String>) -> Self {
        Self::Static(prefix.into())
    }

    pub fn provider(f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self::Provider(Arc::new(f))
    }

    /// Resolve the current prefix value, trimmed of one trailing separator.
    pub fn resolve(&self) -> Option<String> {
        let raw = match self {
            Self::None => return None,
            Self::Static(prefix) => prefix.clone(),
            Self::Provider(provider) => provider(),
        };
        let trimmed = raw.strip_suffix('.').unwrap_or(&raw);
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("Prefix::None"),
            Self::Static(prefix) => write!(f, "Prefix::Static({prefix:?})"),
            Self::Provider(_) => f.write_str("Prefix::Provider(..)"),
        }
    }
}

/// Derive the full cache key for a selector under a prefix.
pub fn parse_key(selector: &KeySelector, prefix: &Prefix) -> String {
    let encoded = selector.encode();
    match prefix.resolve() {
        Some(prefix) => format!("{prefix}.{encoded}"),
        None => encoded,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn object_selector_flattens_to_dot_key() {
        let selector = KeySelector::Object(json!({"a": 1, "b": 2}));
        assert_eq!(
            parse_key(&selector, &Prefix::fixed("app")),
            "app.a.1.b.2"
        );
    }

    #[test]
    fn text_selector_only_normalizes_separators() {
        let selector = KeySelector::from("users:list,active");
        assert_eq!(selector.encode(), "users.list.active");
    }

    #[test]
    fn no_prefix_leaves_key_bare() {
        let selector = KeySelector::from("sessions");
        assert_eq!(parse_key(&selector, &Prefix::None), "sessions");
    }

    #[test]
    fn trailing_separator_in_prefix_is_trimmed() {
        let selector = KeySelector::from("a");
        assert_eq!(parse_key(&selector, &Prefix::fixed("tenant.")), "tenant.a");
    }

    #[test]
    fn provider_prefix_is_resolved_per_call() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let counter = Arc::new(AtomicUsize::new(0));
        let captured = counter.clone();
        let prefix = Prefix::provider(move || {
            format!("tenant-{}", captured.fetch_add(1, Ordering::SeqCst))
        });

        let selector = KeySelector::from("k");
        assert_eq!(parse_key(&selector, &prefix), "tenant-0.k");
        assert_eq!(parse_key(&selector, &prefix), "tenant-1.k");
    }

    #[test]
    fn selector_key_order_is_not_canonicalized() {
        let forward = KeySelector::Object(json!({"a": 1, "b": 2}));
        let reversed = KeySelector::Object(json!({"b": 2, "a": 1}));
        assert_ne!(forward.encode(), reversed.encode());
    }

    #[test]
    fn nested_object_values_flatten() {
        let selector = KeySelector::Object(json!({"page": 1, "order": {"col": "id"}}));
        assert_eq!(selector.encode(), "page.1.order.col.id");
    }
}
