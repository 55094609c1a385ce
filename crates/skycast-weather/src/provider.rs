//! Forecast fetching from an Open-Meteo-compatible API.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use skycast_core::{FetchError, TemperatureUnit};
use std::time::Duration;

use crate::http::{check_status, fetch_error_from};
use crate::types::{
    Coordinate, CurrentConditions, DailyEntry, ForecastBundle, HourlyEntry, WeatherCondition,
};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const PROVIDER_ID: &str = "open-meteo";

/// Forecast-fetch capability injected into the orchestrator.
/// Pure request/response boundary: no caching, no retry.
#[async_trait]
pub trait WeatherFetch: Send + Sync {
    async fn fetch(
        &self,
        coordinate: &Coordinate,
        unit: TemperatureUnit,
    ) -> Result<ForecastBundle, FetchError>;
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentBlock,
    hourly: HourlyBlock,
    daily: DailyBlock,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    temperature_2m: f64,
    apparent_temperature: f64,
    relative_humidity_2m: f64,
    wind_speed_10m: f64,
    weather_code: i32,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<String>,
    temperature_2m: Vec<f64>,
    weather_code: Vec<i32>,
    #[serde(default)]
    precipitation_probability: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    time: Vec<String>,
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
    weather_code: Vec<i32>,
    #[serde(default)]
    precipitation_probability_max: Vec<f64>,
    sunrise: Vec<String>,
    sunset: Vec<String>,
}

/// Open-Meteo-backed weather client.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
}

impl WeatherClient {
    /// `base_url` points at an Open-Meteo-compatible server; tests inject
    /// a mock server URI here.
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(user_agent)
            .build()
            .map_err(fetch_error_from)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn forecast_url(&self, coordinate: &Coordinate, unit: TemperatureUnit) -> String {
        let mut url = format!(
            "{}/v1/forecast?latitude={}&longitude={}\
             &current=temperature_2m,apparent_temperature,relative_humidity_2m,wind_speed_10m,weather_code\
             &hourly=temperature_2m,weather_code,precipitation_probability\
             &daily=temperature_2m_max,temperature_2m_min,weather_code,precipitation_probability_max,sunrise,sunset\
             &timezone=UTC",
            self.base_url,
            coordinate.latitude(),
            coordinate.longitude()
        );
        match unit {
            TemperatureUnit::Auto => {}
            TemperatureUnit::Celsius => url.push_str("&temperature_unit=celsius"),
            TemperatureUnit::Fahrenheit => url.push_str("&temperature_unit=fahrenheit"),
        }
        url
    }
}

#[async_trait]
impl WeatherFetch for WeatherClient {
    async fn fetch(
        &self,
        coordinate: &Coordinate,
        unit: TemperatureUnit,
    ) -> Result<ForecastBundle, FetchError> {
        let url = self.forecast_url(coordinate, unit);
        let response = self.client.get(&url).send().await.map_err(fetch_error_from)?;
        let response = check_status(response)?;

        let body: ForecastResponse = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        let bundle = bundle_from_response(body)?;
        tracing::info!(
            "Fetched forecast for ({}, {}): {} hourly, {} daily",
            coordinate.latitude(),
            coordinate.longitude(),
            bundle.hourly.len(),
            bundle.daily.len()
        );
        Ok(bundle)
    }
}

fn bundle_from_response(body: ForecastResponse) -> Result<ForecastBundle, FetchError> {
    let current = CurrentConditions {
        temperature: body.current.temperature_2m,
        feels_like: body.current.apparent_temperature,
        humidity: clamp_percent(body.current.relative_humidity_2m),
        wind_speed: body.current.wind_speed_10m,
        condition: WeatherCondition::from_wmo_code(body.current.weather_code),
    };

    if body.hourly.time.len() != body.hourly.temperature_2m.len()
        || body.hourly.time.len() != body.hourly.weather_code.len()
    {
        return Err(FetchError::InvalidResponse(
            "hourly series length mismatch".into(),
        ));
    }

    let mut hourly = Vec::with_capacity(body.hourly.time.len());
    for (i, raw_time) in body.hourly.time.iter().enumerate() {
        hourly.push(HourlyEntry {
            time: parse_time(raw_time)?,
            temperature: body.hourly.temperature_2m[i],
            condition: WeatherCondition::from_wmo_code(body.hourly.weather_code[i]),
            precipitation_chance: series_percent(&body.hourly.precipitation_probability, i),
        });
    }

    let d = &body.daily;
    if d.time.len() != d.temperature_2m_max.len()
        || d.time.len() != d.temperature_2m_min.len()
        || d.time.len() != d.weather_code.len()
        || d.time.len() != d.sunrise.len()
        || d.time.len() != d.sunset.len()
    {
        return Err(FetchError::InvalidResponse(
            "daily series length mismatch".into(),
        ));
    }

    let mut daily = Vec::with_capacity(d.time.len());
    for (i, raw_date) in d.time.iter().enumerate() {
        daily.push(DailyEntry {
            date: parse_date(raw_date)?,
            high: d.temperature_2m_max[i],
            low: d.temperature_2m_min[i],
            condition: WeatherCondition::from_wmo_code(d.weather_code[i]),
            precipitation_chance: series_percent(&d.precipitation_probability_max, i),
            sunrise: parse_time(&d.sunrise[i])?,
            sunset: parse_time(&d.sunset[i])?,
        });
    }

    Ok(ForecastBundle {
        current,
        hourly,
        daily,
        fetched_at: Utc::now(),
        provider_id: PROVIDER_ID.to_string(),
    })
}

/// Open-Meteo timestamps come as "2026-08-30T14:00" (no zone suffix).
fn parse_time(raw: &str) -> Result<NaiveTime, FetchError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .map(|dt| dt.time())
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| FetchError::InvalidResponse(format!("bad timestamp '{}'", raw)))
}

fn parse_date(raw: &str) -> Result<NaiveDate, FetchError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| FetchError::InvalidResponse(format!("bad date '{}'", raw)))
}

fn clamp_percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

/// Probability series are optional in the provider response.
fn series_percent(series: &[f64], index: usize) -> u8 {
    series.get(index).copied().map(clamp_percent).unwrap_or(0)
}
