//! Cache module
//!
//! Provides caching infrastructure over a pluggable backend (in-memory
//! moka by default), cache key helpers, and the `memoize` combinator.
//!
//! Reads and writes made on behalf of a request are best-effort: a failed
//! write is logged and dropped, a failed read is a miss.

mod backend;
mod error;
mod key;
mod memory;
mod memoize;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use backend::CacheBackend;
pub use error::CacheError;
pub use key::{CacheKey, generate_cache_key, view_cache_key};
pub use memoize::{MemoizeOptions, memoize};

use memory::InMemoryCache;

use crate::core::config::CacheConfig;

/// A cached value stamped with the time it was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedValue<T> {
    pub cached_dttm: DateTime<Utc>,
    pub value: T,
}

/// Cache service providing typed access to cache backend
///
/// Wraps the underlying cache backend and provides:
/// - Raw bytes API for flexibility
/// - Typed API using MessagePack serialization
/// - Logged, non-failing helpers for request-path reads and writes
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
    default_timeout: Duration,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.backend.backend_name())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl CacheService {
    /// Create a new in-memory cache service from configuration
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        if config.max_entries == 0 {
            return Err(CacheError::Config("max_entries must be positive".into()));
        }
        tracing::debug!(
            max_entries = config.max_entries,
            eviction_policy = ?config.eviction_policy,
            "Initializing in-memory cache"
        );
        Ok(Self::with_backend(
            Arc::new(InMemoryCache::new(config)),
            config.default_timeout,
        ))
    }

    /// Create a cache service over an existing backend
    pub fn with_backend(backend: Arc<dyn CacheBackend>, default_timeout: Duration) -> Self {
        Self {
            backend,
            default_timeout,
        }
    }

    /// Get the backend name
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// TTL applied when callers do not pass one
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    // =========================================================================
    // Raw bytes API
    // =========================================================================

    /// Get raw bytes from cache
    pub async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.backend.get(key).await
    }

    /// Set raw bytes in cache
    pub async fn set_raw(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.backend.set(key, value, ttl).await
    }

    // =========================================================================
    // Typed API (serde)
    // =========================================================================

    /// Get a typed value from cache
    ///
    /// Uses MessagePack for compact, fast deserialization.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get_raw(key).await? {
            Some(bytes) => {
                let value = rmp_serde::from_slice(&bytes)
                    .map_err(|e| CacheError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Set a typed value in cache
    ///
    /// Uses MessagePack for compact, fast serialization.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let bytes =
            rmp_serde::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.set_raw(key, bytes, ttl).await
    }

    // =========================================================================
    // Request-path helpers (never fail)
    // =========================================================================

    /// Stamp `value` with the current time and store it.
    ///
    /// Errors are logged and swallowed; the return value reports whether the
    /// write went through. `ttl = None` uses the service default.
    pub async fn set_and_log<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> bool {
        let stamped = CachedValue {
            cached_dttm: Utc::now(),
            value,
        };
        let ttl = ttl.unwrap_or(self.default_timeout);
        match self.set(key, &stamped, Some(ttl)).await {
            Ok(()) => {
                tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "Cached value");
                true
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache write failed");
                false
            }
        }
    }

    /// Read a value stored by `set_and_log`; failures are logged and read as
    /// a miss.
    pub async fn get_cached<T: DeserializeOwned>(&self, key: &str) -> Option<CachedValue<T>> {
        match self.get::<CachedValue<T>>(key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed");
                None
            }
        }
    }
}
