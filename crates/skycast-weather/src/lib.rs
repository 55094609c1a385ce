//! Weather domain for Skycast
//!
//! Domain types plus the geocoding, forecast, and device-location
//! boundaries. Clients here are pure request/response: retry, staleness,
//! and caching policy live in the orchestrator.

pub mod geocode;
mod http;
pub mod location;
pub mod provider;
pub mod types;

pub use geocode::{GeocodeFetch, GeocodingClient};
pub use location::{LocationResolver, LocationSensor, SensorFix, UnsupportedSensor};
pub use provider::{WeatherClient, WeatherFetch};
pub use types::*;
