//! Redis-backed counter store.

use super::{CounterStore, StoreError, StoreResult};
use crate::middleware::BoxFuture;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError, Script};
use std::time::Duration;

/// Increments `KEYS[1]` and sets its expiry to `ARGV[1]` milliseconds when
/// the increment created it. Runs atomically on the server.
const INCREMENT_WINDOW_SCRIPT: &str = r"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return count
";

/// Counter store shared by every instance pointed at the same Redis.
///
/// Uses a [`ConnectionManager`], which reconnects on its own after a
/// dropped connection; calls made while it is down fail and the limiter
/// admits the request.
#[derive(Clone)]
pub struct RedisCounterStore {
    connection: ConnectionManager,
    window_script: Script,
}

impl RedisCounterStore {
    /// Connects to the Redis server at `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = Client::open(url).map_err(map_error)?;
        let connection = ConnectionManager::new(client).await.map_err(map_error)?;

        tracing::info!(url, "connected to redis counter store");

        Ok(Self::from_connection(connection))
    }

    /// Wraps an existing connection manager.
    #[must_use]
    pub fn from_connection(connection: ConnectionManager) -> Self {
        Self {
            connection,
            window_script: Script::new(INCREMENT_WINDOW_SCRIPT),
        }
    }
}

impl CounterStore for RedisCounterStore {
    fn increment<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StoreResult<i64>> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            let count: i64 = redis::cmd("INCR")
                .arg(key)
                .query_async(&mut connection)
                .await
                .map_err(map_error)?;
            Ok(count)
        })
    }

    fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            let _: i64 = redis::cmd("PEXPIRE")
                .arg(key)
                .arg(millis(ttl))
                .query_async(&mut connection)
                .await
                .map_err(map_error)?;
            Ok(())
        })
    }

    fn increment_window<'a>(
        &'a self,
        key: &'a str,
        window: Duration,
    ) -> BoxFuture<'a, StoreResult<i64>> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            let count: i64 = self
                .window_script
                .key(key)
                .arg(millis(window))
                .invoke_async(&mut connection)
                .await
                .map_err(map_error)?;
            Ok(count)
        })
    }
}

impl std::fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCounterStore").finish_non_exhaustive()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn map_error(error: RedisError) -> StoreError {
    if error.is_timeout() {
        StoreError::Timeout
    } else if error.is_io_error() || error.is_connection_refusal() || error.is_connection_dropped()
    {
        StoreError::Unavailable(error.to_string())
    } else {
        StoreError::Backend(error.to_string())
    }
}
