use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::SqlRunnerError;

/// External key-value cache of opaque byte blobs.
///
/// Implementations are expected to be safe for concurrent use; the engine
/// adds no locking of its own. Every failure surfaces as
/// [`SqlRunnerError::Cache`], which the engine reports and then ignores —
/// the cache is an optimization, never a correctness dependency.
#[async_trait]
pub trait QueryCache: Send + Sync {
    /// Store `bytes` under `key` for `ttl_seconds`.
    async fn set(&self, key: &str, bytes: &[u8], ttl_seconds: u64) -> Result<(), SqlRunnerError>;

    /// Fetch the bytes stored under `key`, if any.
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, SqlRunnerError>;

    /// Drop `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), SqlRunnerError>;
}

/// Per-call caching instructions, never persisted.
///
/// Passing a directive to a read operation turns on read-through caching for
/// that call; passing one to a write operation invalidates the key after a
/// successful round trip.
#[derive(Clone)]
pub struct CacheDirective {
    cache: Arc<dyn QueryCache>,
    pub key: String,
    pub ttl_seconds: u64,
}

impl CacheDirective {
    pub fn new(cache: Arc<dyn QueryCache>, key: impl Into<String>, ttl_seconds: u64) -> Self {
        Self {
            cache,
            key: key.into(),
            ttl_seconds,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &dyn QueryCache {
        self.cache.as_ref()
    }
}

impl std::fmt::Debug for CacheDirective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheDirective")
            .field("key", &self.key)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

// Persisted entries are serde_json bytes of the decoded destination (or the
// scalar count). The format is private and may change between versions.

pub(crate) fn encode_entry<T: Serialize>(value: &T) -> Result<Vec<u8>, SqlRunnerError> {
    serde_json::to_vec(value).map_err(|e| SqlRunnerError::Cache(format!("encode: {e}")))
}

pub(crate) fn decode_entry<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SqlRunnerError> {
    serde_json::from_slice(bytes).map_err(|e| SqlRunnerError::Cache(format!("decode: {e}")))
}
