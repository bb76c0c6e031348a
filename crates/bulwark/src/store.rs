//! Counter store selection.

use crate::error::BulwarkResult;
use bulwark_config::StoreSection;
use bulwark_middleware::{CounterStore, MemoryCounterStore};
use std::sync::Arc;

/// Connects the counter store named by `section`.
///
/// Without a URL the in-process [`MemoryCounterStore`] is used; counts are
/// then local to this process.
///
/// # Errors
///
/// Fails if the Redis connection cannot be established, or if a URL is set
/// in a build without the `redis` feature.
pub async fn connect_store(section: &StoreSection) -> BulwarkResult<Arc<dyn CounterStore>> {
    match &section.url {
        None => {
            tracing::info!("using in-process counter store");
            Ok(Arc::new(MemoryCounterStore::new()))
        }
        Some(url) => connect_url(url).await,
    }
}

#[cfg(feature = "redis")]
async fn connect_url(url: &str) -> BulwarkResult<Arc<dyn CounterStore>> {
    let store = bulwark_middleware::store::RedisCounterStore::connect(url).await?;
    tracing::info!("connected to redis counter store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
#[allow(clippy::unused_async)]
async fn connect_url(_url: &str) -> BulwarkResult<Arc<dyn CounterStore>> {
    Err(crate::error::BulwarkError::StoreBackendDisabled)
}
