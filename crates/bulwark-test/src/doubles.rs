//! Test doubles that fail on demand.

use bulwark_middleware::{
    BoxFuture, BufferedResponse, CounterStore, MemoryCounterStore, ResponseSink, StoreError,
    StoreResult,
};
use http::{HeaderMap, StatusCode};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A sink that accepts `capacity` bytes, then fails every write.
///
/// A write straddling the limit is accepted partially, the way a socket
/// that closes mid-response behaves.
#[derive(Debug)]
pub struct FailingSink {
    inner: BufferedResponse,
    remaining: usize,
}

impl FailingSink {
    /// Creates a sink that accepts at most `capacity` body bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: BufferedResponse::new(),
            remaining: capacity,
        }
    }

    /// Creates a sink that rejects every body byte.
    #[must_use]
    pub fn closed() -> Self {
        Self::new(0)
    }

    /// Returns the status recorded so far.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    /// Returns the body bytes that were accepted.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        self.inner.body()
    }
}

impl ResponseSink for FailingSink {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) {
        self.inner.write_status(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"));
        }
        let accepted = buf.len().min(self.remaining);
        let n = self.inner.write(&buf[..accepted])?;
        self.remaining -= n;
        Ok(n)
    }
}

/// A counter store whose every call fails with [`StoreError::Unavailable`].
#[derive(Debug, Default)]
pub struct FailingCounterStore {
    calls: AtomicUsize,
}

impl FailingCounterStore {
    /// Creates the store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store calls made so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> StoreResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("store is down".to_string()))
    }
}

impl CounterStore for FailingCounterStore {
    fn increment<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, StoreResult<i64>> {
        Box::pin(async move { self.fail() })
    }

    fn expire<'a>(&'a self, _key: &'a str, _ttl: Duration) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move { self.fail() })
    }

    fn increment_window<'a>(
        &'a self,
        _key: &'a str,
        _window: Duration,
    ) -> BoxFuture<'a, StoreResult<i64>> {
        Box::pin(async move { self.fail() })
    }
}

/// A counter store that counts correctly but never manages to set an
/// expiry.
///
/// Keeps the two-step window so the limiter goes through the
/// increment-then-expire path.
#[derive(Debug, Default)]
pub struct ExpireFailingStore {
    counts: MemoryCounterStore,
    expire_calls: AtomicUsize,
}

impl ExpireFailingStore {
    /// Creates the store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count for `key`.
    #[must_use]
    pub fn count(&self, key: &str) -> Option<i64> {
        self.counts.count(key)
    }

    /// Number of expiry attempts made so far.
    #[must_use]
    pub fn expire_calls(&self) -> usize {
        self.expire_calls.load(Ordering::SeqCst)
    }
}

impl CounterStore for ExpireFailingStore {
    fn increment<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StoreResult<i64>> {
        self.counts.increment(key)
    }

    fn expire<'a>(&'a self, _key: &'a str, _ttl: Duration) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            self.expire_calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Timeout)
        })
    }
}
