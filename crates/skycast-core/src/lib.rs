pub mod config;
pub mod error;
pub mod telemetry;

pub use config::{Config, GestureConfig, LocationConfig, RetrySettings, TemperatureUnit, WeatherConfig};
pub use error::{AppError, ConfigError, FetchError, LocationError, NavigationError};
pub use telemetry::{
    ChannelEmitter, Emitter, LogEmitter, NullEmitter, Scalar, TelemetryEmitter, TelemetryEvent,
};

use anyhow::Result;

/// Initialize the core application
pub fn init() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Skycast core initialized");
    Ok(())
}
