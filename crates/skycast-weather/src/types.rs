use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// How a coordinate was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSource {
    /// Device location sensor
    Device,
    /// Manual search / user input
    Manual,
}

/// Coordinate outside the valid latitude/longitude ranges.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("Coordinate out of range: ({latitude}, {longitude})")]
pub struct CoordinateOutOfRange {
    pub latitude: f64,
    pub longitude: f64,
}

/// Validated geographic coordinate.
///
/// Construction goes through [`Coordinate::new`], so out-of-range values
/// never reach the geocoding or weather clients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
    accuracy_meters: Option<f64>,
    source: CoordinateSource,
}

impl Coordinate {
    /// Validating constructor. Latitude must be within [-90, 90],
    /// longitude within [-180, 180]; a present accuracy must be >= 0.
    pub fn new(
        latitude: f64,
        longitude: f64,
        accuracy_meters: Option<f64>,
        source: CoordinateSource,
    ) -> Result<Self, CoordinateOutOfRange> {
        let lat_ok = (-90.0..=90.0).contains(&latitude);
        let lon_ok = (-180.0..=180.0).contains(&longitude);
        let acc_ok = accuracy_meters.is_none_or(|a| a >= 0.0 && a.is_finite());
        if !lat_ok || !lon_ok || !acc_ok || !latitude.is_finite() || !longitude.is_finite() {
            return Err(CoordinateOutOfRange {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
            accuracy_meters,
            source,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn accuracy_meters(&self) -> Option<f64> {
        self.accuracy_meters
    }

    pub fn source(&self) -> CoordinateSource {
        self.source
    }
}

/// Free-text place search, optionally biased around a prior coordinate.
/// Immutable once submitted to the geocoding client.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceQuery {
    text: String,
    bias: Option<Coordinate>,
}

impl PlaceQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bias: None,
        }
    }

    pub fn biased(text: impl Into<String>, bias: Coordinate) -> Self {
        Self {
            text: text.into(),
            bias: Some(bias),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bias(&self) -> Option<&Coordinate> {
        self.bias.as_ref()
    }
}

/// A named place with a validated coordinate. Never mutated after
/// creation; a new query produces a new `ResolvedPlace`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPlace {
    pub display_name: String,
    pub coordinate: Coordinate,
    pub provider_id: String,
}

/// Weather condition categories mapped from WMO codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Thunderstorm,
}

impl WeatherCondition {
    /// Convert WMO weather code to WeatherCondition
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 => Self::Clear,
            1..=2 => Self::PartlyCloudy,
            3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51 | 53 | 55 => Self::Drizzle,
            56 | 57 | 66 | 67 => Self::Sleet, // Freezing drizzle / freezing rain
            61 | 63 | 80 => Self::Rain,
            65 | 81 | 82 => Self::HeavyRain,
            71 | 73 | 75 | 77 | 85 | 86 => Self::Snow,
            95 | 96 | 99 => Self::Thunderstorm,
            _ => Self::Clear, // Unknown codes default to clear
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::Snow => "Snow",
            Self::Sleet => "Sleet",
            Self::Thunderstorm => "Thunderstorm",
        }
    }
}

/// Current weather conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub condition: WeatherCondition,
}

/// Hourly forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyEntry {
    pub time: NaiveTime,
    pub temperature: f64,
    pub condition: WeatherCondition,
    pub precipitation_chance: u8,
}

/// Daily forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyEntry {
    pub date: NaiveDate,
    pub high: f64,
    pub low: f64,
    pub condition: WeatherCondition,
    pub precipitation_chance: u8,
    pub sunrise: NaiveTime,
    pub sunset: NaiveTime,
}

/// Immutable forecast snapshot for one place at one fetch time.
/// A refresh replaces the whole bundle, never patches fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastBundle {
    pub current: CurrentConditions,
    pub hourly: Vec<HourlyEntry>,
    pub daily: Vec<DailyEntry>,
    pub fetched_at: DateTime<Utc>,
    pub provider_id: String,
}

impl ForecastBundle {
    /// Age of the bundle relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.fetched_at
    }
}
