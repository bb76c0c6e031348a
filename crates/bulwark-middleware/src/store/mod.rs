//! Counter store boundary for the rate limiter.
//!
//! All cross-request rate-limit state lives in a [`CounterStore`]. The
//! limiter never caches counts locally: every instance of a service must
//! see the same counter for a client, so the store's atomic increment is
//! the only synchronization the limiter relies on.
//!
//! | Implementation | Scope | Atomic window primitive |
//! |----------------|-------|-------------------------|
//! | [`MemoryCounterStore`] | single process | yes |
//! | `RedisCounterStore` (feature `redis`) | shared across instances | yes (Lua) |
//!
//! Stores without an atomic "increment and set expiry if new" primitive
//! inherit the two-step default of [`CounterStore::increment_window`].

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryCounterStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisCounterStore;

use crate::middleware::BoxFuture;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by a counter store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),

    /// The store did not answer in time.
    #[error("Counter store timed out")]
    Timeout,

    /// The store answered with an error.
    #[error("Counter store error: {0}")]
    Backend(String),
}

/// Result type for counter store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// External key-value service with atomic increment and expiry.
pub trait CounterStore: Send + Sync + 'static {
    /// Atomically increments `key`, creating it at 1 if absent, and returns
    /// the post-increment count.
    fn increment<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StoreResult<i64>>;

    /// Sets the time-to-live of `key`.
    fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> BoxFuture<'a, StoreResult<()>>;

    /// Counts one request against `key` for a window of length `window`.
    ///
    /// The default increments, then registers the expiry when the count is
    /// 1. The two calls are not atomic: if the second never happens the key
    /// never expires. A failed expiry is logged and the count is still
    /// returned. Stores with an atomic primitive override this.
    fn increment_window<'a>(
        &'a self,
        key: &'a str,
        window: Duration,
    ) -> BoxFuture<'a, StoreResult<i64>> {
        Box::pin(async move {
            let count = self.increment(key).await?;

            if count == 1 {
                if let Err(error) = self.expire(key, window).await {
                    tracing::warn!(
                        key,
                        error = %error,
                        "failed to register counter expiry"
                    );
                    bulwark_telemetry::metrics::record_store_failure("expire");
                }
            }

            Ok(count)
        })
    }
}
