//! Location resolution: device sensor fixes and manual search, both
//! funnelled into validated coordinates. Retry policy lives in the
//! orchestrator, not here.

use async_trait::async_trait;
use skycast_core::{FetchError, LocationError};
use std::sync::Arc;
use std::time::Duration;

use crate::geocode::GeocodeFetch;
use crate::types::{Coordinate, CoordinateSource, PlaceQuery, ResolvedPlace};

/// Raw reading from the platform location sensor, before validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
}

/// Device location sensor boundary. Platform backends and test doubles
/// implement this; the resolver owns validation and accuracy policy.
#[async_trait]
pub trait LocationSensor: Send + Sync {
    async fn read(&self) -> Result<SensorFix, LocationError>;
}

/// A sensor for platforms without location support.
#[derive(Debug, Default)]
pub struct UnsupportedSensor;

#[async_trait]
impl LocationSensor for UnsupportedSensor {
    async fn read(&self) -> Result<SensorFix, LocationError> {
        Err(LocationError::Unavailable)
    }
}

/// Resolves the user's place from either the device sensor or a manual
/// search query.
pub struct LocationResolver {
    sensor: Arc<dyn LocationSensor>,
    geocoder: Arc<dyn GeocodeFetch>,
    max_accuracy_meters: f64,
    sensor_timeout: Duration,
}

impl LocationResolver {
    pub fn new(
        sensor: Arc<dyn LocationSensor>,
        geocoder: Arc<dyn GeocodeFetch>,
        max_accuracy_meters: f64,
        sensor_timeout: Duration,
    ) -> Self {
        Self {
            sensor,
            geocoder,
            max_accuracy_meters,
            sensor_timeout,
        }
    }

    /// Read and validate the current device coordinate.
    ///
    /// A sensor that does not answer within the configured timeout yields
    /// `Timeout`. A fix with accuracy worse than the configured threshold
    /// is refused with `LowAccuracy`; the caller decides whether to retry
    /// or fall back to manual search.
    pub async fn resolve_current(&self) -> Result<Coordinate, LocationError> {
        let fix = tokio::time::timeout(self.sensor_timeout, self.sensor.read())
            .await
            .map_err(|_| LocationError::Timeout)??;

        let coordinate = Coordinate::new(
            fix.latitude,
            fix.longitude,
            fix.accuracy_meters,
            CoordinateSource::Device,
        )
        .map_err(|e| {
            tracing::warn!("Sensor produced invalid coordinate: {}", e);
            LocationError::Unavailable
        })?;

        if let Some(accuracy) = coordinate.accuracy_meters() {
            if accuracy > self.max_accuracy_meters {
                return Err(LocationError::LowAccuracy {
                    accuracy_meters: accuracy,
                    max_meters: self.max_accuracy_meters,
                });
            }
        }

        tracing::info!(
            "Resolved device location ({}, {})",
            coordinate.latitude(),
            coordinate.longitude()
        );
        Ok(coordinate)
    }

    /// Resolve the current device location to a named place.
    pub async fn resolve_current_place(&self) -> Result<ResolvedPlace, LocationError> {
        let coordinate = self.resolve_current().await?;
        self.geocoder
            .reverse(&coordinate)
            .await
            .map_err(wrap_fetch_error)
    }

    /// Resolve a manual search query to a named place, wrapping geocoding
    /// failures uniformly as location errors.
    pub async fn resolve_by_query(&self, query: &PlaceQuery) -> Result<ResolvedPlace, LocationError> {
        self.geocoder.fetch(query).await.map_err(wrap_fetch_error)
    }
}

fn wrap_fetch_error(error: FetchError) -> LocationError {
    match error {
        FetchError::Timeout => LocationError::Timeout,
        other => {
            tracing::debug!("Geocoding failed during location resolution: {}", other);
            LocationError::Unavailable
        }
    }
}
