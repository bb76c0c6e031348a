//! Facade error type.

use bulwark_config::ConfigError;
use bulwark_middleware::StoreError;
use bulwark_telemetry::TelemetryError;
use thiserror::Error;

/// Errors raised while assembling a pipeline from configuration.
#[derive(Debug, Error)]
pub enum BulwarkError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configured counter store could not be reached.
    #[error("counter store: {0}")]
    Store(#[from] StoreError),

    /// Logging or metrics could not be initialised.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// A store URL was configured but this build has no backend for it.
    #[error("store.url is set but bulwark was built without the `redis` feature")]
    StoreBackendDisabled,
}

/// Result alias for facade operations.
pub type BulwarkResult<T> = Result<T, BulwarkError>;
