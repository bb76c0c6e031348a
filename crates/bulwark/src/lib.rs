//! # Bulwark
//!
//! **Composable HTTP middleware with a distributed rate limiter**
//!
//! Bulwark wraps a request handler in an ordered chain of independent stages:
//!
//! - **Security headers** - a fixed hardening policy on every response
//! - **Trace** - trace id and client identity, propagated through the context
//! - **Recover** - a panic in one request never takes down the worker
//! - **Logger** - structured `init` / `done` events per request
//! - **Metrics** - Prometheus duration histogram and request counter
//! - **Rate limit** - per-client quota over a shared counter store, failing
//!   open when the store is down
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bulwark::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BulwarkError> {
//!     let config = ConfigLoader::new()
//!         .with_optional_file("bulwark.toml")?
//!         .with_env_prefix("BULWARK")
//!         .load()?;
//!     bulwark::init_telemetry(&config)?;
//!
//!     let pipeline = bulwark::from_config(&config, handler_fn(|_ctx, _req, sink| {
//!         Box::pin(async move {
//!             let _ = sink.write_all(b"hello");
//!         })
//!     }))
//!     .await?;
//!
//!     // Hand `pipeline.serve(request)` to your transport.
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! With the default stage order:
//!
//! ```text
//! Request → SecurityHeaders → Trace → Recover → Logger → Metrics → RateLimit → Handler
//!                                                                                 ↓
//! Response ←──────────────────── (each stage resumes after next returns) ←────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/bulwark/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod assemble;
mod error;
mod observability;
mod store;

// Re-export the member crates
pub use bulwark_config as config;
pub use bulwark_middleware as middleware;
pub use bulwark_telemetry as telemetry;

pub use assemble::{pipeline_from_config, rate_limit_config, stage_for};
pub use error::{BulwarkError, BulwarkResult};
pub use observability::{init_telemetry, telemetry_config};
pub use store::connect_store;

use bulwark_config::BulwarkConfig;
use bulwark_middleware::{Handler, Pipeline};

/// Connects the configured counter store and builds the configured pipeline
/// around `handler`.
///
/// # Errors
///
/// Fails if the counter store cannot be connected.
pub async fn from_config<H: Handler>(config: &BulwarkConfig, handler: H) -> BulwarkResult<Pipeline> {
    let store = connect_store(&config.store).await?;
    Ok(pipeline_from_config(config, store, handler))
}

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use bulwark::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{BulwarkError, BulwarkResult};

    pub use bulwark_config::{BulwarkConfig, ConfigLoader, StageKind};

    pub use bulwark_middleware::{
        handler_fn, CounterStore, Handler, MemoryCounterStore, Middleware, Next, Pipeline,
        Request, RequestContext, Response, ResponseSink,
    };

    pub use bulwark_middleware::stages::{
        LoggerMiddleware, MetricsMiddleware, RateLimitMiddleware, RecoverMiddleware,
        SecurityHeadersMiddleware, TraceMiddleware,
    };
}
