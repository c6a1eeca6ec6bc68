//! Request-scoped locale.
//!
//! Uses `tokio::task_local!` so a locale code set at the edge of a request
//! flows into cache-key derivation without threading a parameter through
//! every call. When no scope is active, keys carry no locale segment.

tokio::task_local! {
    static LOCALE: String;
}

/// Run a future with the given locale code in scope.
pub async fn with_locale<F, R>(code: impl Into<String>, f: F) -> R
where
    F: std::future::Future<Output = R>,
{
    LOCALE.scope(code.into(), f).await
}

/// The locale code in scope for the current task, if any.
pub fn current() -> Option<String> {
    LOCALE.try_with(|code| code.clone()).ok()
}
