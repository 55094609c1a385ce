//! End-to-end scenarios: manual search through geocoding, forecast
//! orchestration with retries, and the navigation handoff to Details.
//! Providers are mocked at the fetch-capability seams.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use skycast_app::{DataOrchestrator, NavigationController, RequestState, Screen};
use skycast_core::{
    ChannelEmitter, FetchError, NullEmitter, RetrySettings, Scalar, TelemetryEvent,
    TemperatureUnit,
};
use skycast_weather::{
    Coordinate, CoordinateSource, CurrentConditions, ForecastBundle, GeocodeFetch,
    LocationResolver, PlaceQuery, ResolvedPlace, UnsupportedSensor, WeatherCondition,
    WeatherFetch,
};

fn seattle() -> ResolvedPlace {
    ResolvedPlace {
        display_name: "Seattle".to_string(),
        coordinate: Coordinate::new(47.6, -122.3, None, CoordinateSource::Manual).unwrap(),
        provider_id: "nominatim".to_string(),
    }
}

fn sample_bundle() -> ForecastBundle {
    ForecastBundle {
        current: CurrentConditions {
            temperature: 18.0,
            feels_like: 17.0,
            humidity: 60,
            wind_speed: 3.0,
            condition: WeatherCondition::PartlyCloudy,
        },
        hourly: Vec::new(),
        daily: Vec::new(),
        fetched_at: chrono::Utc::now(),
        provider_id: "open-meteo".to_string(),
    }
}

struct StubGeocoder {
    place: ResolvedPlace,
}

#[async_trait]
impl GeocodeFetch for StubGeocoder {
    async fn fetch(&self, query: &PlaceQuery) -> Result<ResolvedPlace, FetchError> {
        if query.text().eq_ignore_ascii_case(&self.place.display_name) {
            Ok(self.place.clone())
        } else {
            Err(FetchError::InvalidResponse("no place candidates".into()))
        }
    }

    async fn reverse(&self, _coordinate: &Coordinate) -> Result<ResolvedPlace, FetchError> {
        Ok(self.place.clone())
    }
}

struct SequencedWeather {
    responses: Mutex<VecDeque<Result<ForecastBundle, FetchError>>>,
}

impl SequencedWeather {
    fn new(responses: Vec<Result<ForecastBundle, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
        })
    }
}

#[async_trait]
impl WeatherFetch for SequencedWeather {
    async fn fetch(
        &self,
        _coordinate: &Coordinate,
        _unit: TemperatureUnit,
    ) -> Result<ForecastBundle, FetchError> {
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Network("unscripted call".into())))
    }
}

fn fast_retry() -> RetrySettings {
    RetrySettings {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 10,
    }
}

#[tokio::test]
async fn search_seattle_reaches_details_with_forecast() {
    let resolver = LocationResolver::new(
        Arc::new(UnsupportedSensor),
        Arc::new(StubGeocoder { place: seattle() }),
        500.0,
        Duration::from_secs(5),
    );
    let weather = SequencedWeather::new(vec![Ok(sample_bundle())]);
    let orchestrator = DataOrchestrator::new(
        weather,
        TemperatureUnit::Auto,
        fast_retry(),
        Duration::from_secs(1800),
        Arc::new(NullEmitter),
    );
    let mut navigation = NavigationController::new(Arc::new(NullEmitter));

    // Manual search resolves the place
    let place = resolver
        .resolve_by_query(&PlaceQuery::new("Seattle"))
        .await
        .unwrap();
    assert_eq!(place.display_name, "Seattle");
    assert!((place.coordinate.latitude() - 47.6).abs() < 1e-9);

    // Selection drives the weather fetch and unlocks Details
    orchestrator.select_place(place);
    navigation.set_place_selected(true);
    orchestrator.wait_settled().await;

    match orchestrator.state() {
        RequestState::Success { bundle } => {
            assert_eq!(bundle.current.condition, WeatherCondition::PartlyCloudy)
        }
        other => panic!("expected Success, got {:?}", other),
    }

    navigation.go_to(Screen::Details).unwrap();
    navigation.commit_transition();
    assert_eq!(navigation.current(), Screen::Details);
}

#[tokio::test]
async fn two_network_failures_then_success_emits_two_retries() {
    let (emitter, mut rx) = ChannelEmitter::channel();
    let weather = SequencedWeather::new(vec![
        Err(FetchError::Network("connection reset".into())),
        Err(FetchError::Network("connection reset".into())),
        Ok(sample_bundle()),
    ]);
    let orchestrator = DataOrchestrator::new(
        weather,
        TemperatureUnit::Auto,
        fast_retry(),
        Duration::from_secs(1800),
        Arc::new(emitter),
    );

    orchestrator.select_place(seattle());
    orchestrator.wait_settled().await;

    assert!(matches!(orchestrator.state(), RequestState::Success { .. }));

    let mut events: Vec<TelemetryEvent> = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    let retries = events.iter().filter(|e| e.name == "fetch_retried").count();
    assert_eq!(retries, 2, "exactly one retry event per failed attempt");

    let succeeded = events
        .iter()
        .find(|e| e.name == "fetch_succeeded")
        .expect("success event must be emitted");
    assert_eq!(succeeded.attribute("retry_count"), Some(&Scalar::Int(2)));
}

#[tokio::test]
async fn failed_search_never_touches_the_orchestrator() {
    let resolver = LocationResolver::new(
        Arc::new(UnsupportedSensor),
        Arc::new(StubGeocoder { place: seattle() }),
        500.0,
        Duration::from_secs(5),
    );
    let weather = SequencedWeather::new(vec![]);
    let orchestrator = DataOrchestrator::new(
        Arc::clone(&weather) as Arc<dyn WeatherFetch>,
        TemperatureUnit::Auto,
        fast_retry(),
        Duration::from_secs(1800),
        Arc::new(NullEmitter),
    );
    let mut navigation = NavigationController::new(Arc::new(NullEmitter));

    let err = resolver
        .resolve_by_query(&PlaceQuery::new("Nowhereville"))
        .await
        .unwrap_err();
    assert_eq!(err, skycast_core::LocationError::Unavailable);

    // No selection happened: Details stays locked, slot stays idle
    assert!(navigation.go_to(Screen::Details).is_err());
    assert!(matches!(orchestrator.state(), RequestState::Idle));
    assert!(orchestrator.current_place().is_none());
}
