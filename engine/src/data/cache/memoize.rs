//! Conditional memoization over the cache service

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::CacheService;
use crate::core::constants::DEFAULT_MEMOIZE_TTL_SECS;

/// Per-call overrides for `memoize`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoizeOptions {
    /// When false the cache is bypassed entirely (no read, no write)
    pub enabled: bool,
    /// Skip the read but still refresh the cached value
    pub force: bool,
    /// TTL for the stored value; `None` uses the cache service default
    pub ttl: Option<Duration>,
}

impl Default for MemoizeOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            force: false,
            ttl: Some(Duration::from_secs(DEFAULT_MEMOIZE_TTL_SECS)),
        }
    }
}

/// Return the cached result for `key_fn(args)`, or run `compute` and cache
/// what it returns.
///
/// Errors from `compute` are returned as-is and never cached. Cache failures
/// never surface: a failed read is a miss and a failed write is logged.
pub async fn memoize<A, T, E, K, F, Fut>(
    cache: Option<&CacheService>,
    args: &A,
    key_fn: K,
    options: MemoizeOptions,
    compute: F,
) -> Result<T, E>
where
    A: ?Sized,
    T: Serialize + DeserializeOwned,
    K: FnOnce(&A) -> String,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let Some(cache) = cache.filter(|_| options.enabled) else {
        return compute().await;
    };

    let key = key_fn(args);
    if !options.force
        && let Some(hit) = cache.get_cached::<T>(&key).await
    {
        tracing::trace!(key = %key, "Memoized value served from cache");
        return Ok(hit.value);
    }

    let value = compute().await?;
    cache.set_and_log(&key, &value, options.ttl).await;
    Ok(value)
}
