//! Geocoding: free-text place search and reverse lookup.
//! Uses a Nominatim-compatible API (OpenStreetMap) - free, no API key required.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use skycast_core::FetchError;
use std::time::Duration;
use url::form_urlencoded;

use crate::http::{check_status, fetch_error_from};
use crate::types::{Coordinate, CoordinateSource, PlaceQuery, ResolvedPlace};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const PROVIDER_ID: &str = "nominatim";
const MAX_CANDIDATES: u32 = 5;

/// Forward/reverse geocoding capability injected into the resolver and
/// orchestrator. Pure request/response boundary: no caching, no retry.
#[async_trait]
pub trait GeocodeFetch: Send + Sync {
    /// Resolve a free-text query to the best-ranked place candidate.
    async fn fetch(&self, query: &PlaceQuery) -> Result<ResolvedPlace, FetchError>;

    /// Resolve a coordinate to a named place.
    async fn reverse(&self, coordinate: &Coordinate) -> Result<ResolvedPlace, FetchError>;
}

#[derive(Debug, Deserialize)]
struct SearchCandidate {
    // Nominatim returns coordinates as strings
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    address: Option<ReverseAddress>,
}

#[derive(Debug, Deserialize)]
struct ReverseAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    state: Option<String>,
    county: Option<String>,
    country: Option<String>,
}

/// Nominatim-backed geocoding client.
#[derive(Debug, Clone)]
pub struct GeocodingClient {
    client: Client,
    base_url: String,
}

impl GeocodingClient {
    /// `base_url` points at a Nominatim-compatible server; tests inject a
    /// mock server URI here.
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

    fn search_url(&self, query: &PlaceQuery) -> String {
        let mut params = form_urlencoded::Serializer::new(String::new());
        params
            .append_pair("q", query.text())
            .append_pair("format", "json")
            .append_pair("limit", &MAX_CANDIDATES.to_string());
        // Bias ranking around the prior coordinate without constraining results
        if let Some(bias) = query.bias() {
            params
                .append_pair(
                    "viewbox",
                    &format!(
                        "{:.4},{:.4},{:.4},{:.4}",
                        bias.longitude() - 1.0,
                        bias.latitude() + 1.0,
                        bias.longitude() + 1.0,
                        bias.latitude() - 1.0,
                    ),
                )
                .append_pair("bounded", "0");
        }
        format!("{}/search?{}", self.base_url, params.finish())
    }

    fn place_from_candidate(candidate: SearchCandidate) -> Result<ResolvedPlace, FetchError> {
        let latitude: f64 = candidate
            .lat
            .parse()
            .map_err(|_| FetchError::InvalidResponse("non-numeric latitude".into()))?;
        let longitude: f64 = candidate
            .lon
            .parse()
            .map_err(|_| FetchError::InvalidResponse("non-numeric longitude".into()))?;

        let coordinate = Coordinate::new(latitude, longitude, None, CoordinateSource::Manual)
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        Ok(ResolvedPlace {
            display_name: candidate.display_name,
            coordinate,
            provider_id: PROVIDER_ID.to_string(),
        })
    }
}

#[async_trait]
impl GeocodeFetch for GeocodingClient {
    async fn fetch(&self, query: &PlaceQuery) -> Result<ResolvedPlace, FetchError> {
        let url = self.search_url(query);
        let response = self.client.get(&url).send().await.map_err(fetch_error_from)?;
        let response = check_status(response)?;

        let candidates: Vec<SearchCandidate> = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        // An empty candidate list is a provider-level failure, not a crash
        let best = candidates
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::InvalidResponse("no place candidates".into()))?;

        let place = Self::place_from_candidate(best)?;
        tracing::info!("Geocoded '{}' to {}", query.text(), place.display_name);
        Ok(place)
    }

    async fn reverse(&self, coordinate: &Coordinate) -> Result<ResolvedPlace, FetchError> {
        let url = format!(
            "{}/reverse?lat={}&lon={}&format=json&addressdetails=1&zoom=10",
            self.base_url,
            coordinate.latitude(),
            coordinate.longitude()
        );

        let response = self.client.get(&url).send().await.map_err(fetch_error_from)?;
        let response = check_status(response)?;

        let body: ReverseResponse = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        let display_name = body
            .address
            .and_then(place_name)
            .or(body.display_name)
            .ok_or_else(|| FetchError::InvalidResponse("no place name in response".into()))?;

        tracing::info!("Reverse geocoded to: {}", display_name);
        Ok(ResolvedPlace {
            display_name,
            coordinate: *coordinate,
            provider_id: PROVIDER_ID.to_string(),
        })
    }
}

/// Prefer city > town > village > municipality for the primary place name,
/// suffixed with state/country for disambiguation when different.
fn place_name(addr: ReverseAddress) -> Option<String> {
    let state = addr.state.clone();
    let country = addr.country.clone();

    let place = addr
        .city
        .or(addr.town)
        .or(addr.village)
        .or(addr.municipality)
        .or(addr.county)
        .or(addr.state)
        .or(addr.country)?;

    let suffix = state
        .filter(|s| !s.is_empty() && s != &place)
        .or_else(|| country.filter(|c| !c.is_empty() && c != &place));

    Some(match suffix {
        Some(s) => format!("{}, {}", place, s),
        None => place,
    })
}
