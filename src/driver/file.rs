//! Filesystem backend: one JSON file per key.
//!
//! Key segments map to directories under the configured root, with the entry
//! itself written as a fixed leaf file name. A namespace is therefore a
//! directory subtree, and namespace removal is a recursive directory delete.
//! Segments are percent-encoded on the way in, so key text can never name a
//! path outside the root.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::warn;

use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::key::{KeySelector, Prefix};

use super::{CacheDriver, ConnState, ConnectionState, derive_key};

const DEFAULT_FILE_NAME: &str = "entry.json";

/// Filesystem-backed cache driver.
pub struct FileDriver {
    prefix: Prefix,
    state: ConnState,
    directory: PathBuf,
    file_name: String,
}

impl FileDriver {
    pub fn new(directory: impl Into<PathBuf>, prefix: Prefix) -> Self {
        Self {
            prefix,
            state: ConnState::new(),
            directory: directory.into(),
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }

    /// Override the leaf file name used for each stored entry.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    fn namespace_path(&self, key: &str) -> PathBuf {
        let mut path = self.directory.clone();
        for segment in key.split('.').filter(|s| !s.is_empty()) {
            path.push(encode_segment(segment));
        }
        path
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.namespace_path(key).join(&self.file_name)
    }

    async fn remove_entry_file(&self, path: &Path, op: &'static str) {
        if let Err(error) = fs::remove_file(path).await
            && error.kind() != std::io::ErrorKind::NotFound
        {
            warn!(
                op,
                path = %path.display(),
                error = %error,
                "File cache delete failed; entry left behind"
            );
        }
    }
}

/// Encode one key segment as a directory name. Everything outside
/// `[A-Za-z0-9_-]` is percent-encoded; filter values flow into keys as
/// arbitrary caller text, and `PathBuf::push` with an absolute segment would
/// otherwise replace the accumulated root.
fn encode_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' => {
                encoded.push(byte as char);
            }
            other => {
                encoded.push('%');
                encoded.push_str(&format!("{other:02X}"));
            }
        }
    }
    encoded
}

#[async_trait]
impl CacheDriver for FileDriver {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn connect(&self) -> Result<(), CacheError> {
        if !self.state.begin_connect() {
            return Ok(());
        }
        match fs::create_dir_all(&self.directory).await {
            Ok(()) => {
                self.state.set(ConnectionState::Connected);
                Ok(())
            }
            Err(error) => {
                self.state.set(ConnectionState::Disconnected);
                Err(CacheError::connect("file", error))
            }
        }
    }

    async fn get(&self, key: &str) -> Option<Value> {
        let path = self.entry_path(key);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(error) => {
                if error.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        op = "get",
                        path = %path.display(),
                        error = %error,
                        "File cache read failed; treating as miss"
                    );
                }
                return None;
            }
        };

        match serde_json::from_slice::<CacheEntry>(&raw) {
            Ok(entry) if entry.is_expired() => {
                self.remove_entry_file(&path, "get.expired").await;
                None
            }
            Ok(entry) => Some(entry.data),
            Err(error) => {
                // Corrupt entry: evict it so the next read goes to the source.
                warn!(
                    op = "get",
                    path = %path.display(),
                    error = %error,
                    "Corrupt cache entry; evicting and treating as miss"
                );
                self.remove_entry_file(&path, "get.corrupt").await;
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl_secs: Option<u64>) {
        let entry = CacheEntry::new(value.clone(), ttl_secs);
        let serialized = match serde_json::to_vec(&entry) {
            Ok(serialized) => serialized,
            Err(error) => {
                warn!(op = "set", key, error = %error, "Cache entry serialization failed; skipping write");
                return;
            }
        };

        let dir = self.namespace_path(key);
        if let Err(error) = fs::create_dir_all(&dir).await {
            warn!(op = "set", path = %dir.display(), error = %error, "File cache mkdir failed; skipping write");
            return;
        }
        let path = dir.join(&self.file_name);
        if let Err(error) = fs::write(&path, serialized).await {
            warn!(op = "set", path = %path.display(), error = %error, "File cache write failed; skipping write");
        }
    }

    async fn remove(&self, key: &str) {
        let path = self.entry_path(key);
        self.remove_entry_file(&path, "remove").await;
    }

    async fn remove_namespace(&self, namespace: &str) {
        let path = self.namespace_path(namespace);
        if let Err(error) = fs::remove_dir_all(&path).await
            && error.kind() != std::io::ErrorKind::NotFound
        {
            warn!(
                op = "remove_namespace",
                path = %path.display(),
                error = %error,
                "File cache namespace delete failed"
            );
        }
    }

    async fn flush(&self) {
        match self.prefix.resolve() {
            Some(prefix) => self.remove_namespace(&prefix).await,
            None => {
                if let Err(error) = fs::remove_dir_all(&self.directory).await
                    && error.kind() != std::io::ErrorKind::NotFound
                {
                    warn!(
                        op = "flush",
                        path = %self.directory.display(),
                        error = %error,
                        "File cache flush failed"
                    );
                }
                if let Err(error) = fs::create_dir_all(&self.directory).await {
                    warn!(
                        op = "flush",
                        path = %self.directory.display(),
                        error = %error,
                        "File cache root recreation failed"
                    );
                }
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
