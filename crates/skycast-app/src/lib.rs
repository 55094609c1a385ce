//! Skycast application core: orchestration, navigation, gestures, theme.
//!
//! Components are explicitly constructed and wired at process start; each
//! piece of state has exactly one owner and cross-component communication
//! goes through method calls and telemetry records.

pub mod gesture;
pub mod navigation;
pub mod orchestrator;
pub mod theme;

pub use gesture::{GestureEvent, GestureKind, GestureRecognizer, PointerSample};
pub use navigation::{NavTrigger, NavigationController, Screen, Transition, TransitionPhase};
pub use orchestrator::{DataOrchestrator, RequestState, RetryConfig, StaleReason, WeatherViewModel};
pub use theme::{FilePreferenceStore, PreferenceStore, ThemePreference, ThemeStateManager};

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use skycast_core::{Config, Emitter, LocationError};
use skycast_weather::{
    GeocodingClient, LocationResolver, LocationSensor, PlaceQuery, ResolvedPlace,
    UnsupportedSensor, WeatherClient,
};

/// The assembled application core: one owner per piece of state, wired
/// once at startup. The rendering layer drives it through these fields.
pub struct App {
    pub orchestrator: DataOrchestrator,
    pub navigation: NavigationController,
    pub gestures: GestureRecognizer,
    pub theme: ThemeStateManager,
    pub resolver: LocationResolver,
}

impl App {
    /// Wire the core against the real providers, with the platform sensor
    /// injected by the shell (defaults to unsupported).
    pub fn from_config(config: &Config, telemetry: Emitter) -> Result<Self> {
        Self::with_sensor(config, telemetry, Arc::new(UnsupportedSensor))
    }

    pub fn with_sensor(
        config: &Config,
        telemetry: Emitter,
        sensor: Arc<dyn LocationSensor>,
    ) -> Result<Self> {
        let geocoder = Arc::new(GeocodingClient::new(
            &config.providers.geocoding_url,
            &config.providers.user_agent,
        )?);
        let weather = Arc::new(WeatherClient::new(
            &config.providers.weather_url,
            &config.providers.user_agent,
        )?);

        let resolver = LocationResolver::new(
            sensor,
            geocoder,
            config.location.max_accuracy_meters,
            Duration::from_secs(config.location.sensor_timeout_secs),
        );

        let orchestrator = DataOrchestrator::new(
            weather,
            config.weather.temperature_unit,
            config.weather.retry,
            Duration::from_secs(u64::from(config.weather.max_age_minutes) * 60),
            Arc::clone(&telemetry),
        );

        let navigation = NavigationController::new(Arc::clone(&telemetry));
        let gestures = GestureRecognizer::new(config.gestures, Arc::clone(&telemetry));

        let store = FilePreferenceStore::new(&config.config_dir);
        let theme = ThemeStateManager::load(Box::new(store), telemetry);

        Ok(Self {
            orchestrator,
            navigation,
            gestures,
            theme,
            resolver,
        })
    }

    /// Resolve a manual search and make it the selected place.
    pub async fn search_and_select(&mut self, text: &str) -> Result<ResolvedPlace, LocationError> {
        let place = self.resolver.resolve_by_query(&PlaceQuery::new(text)).await?;
        self.select(place.clone());
        Ok(place)
    }

    /// Resolve the device location and make it the selected place.
    pub async fn locate_and_select(&mut self) -> Result<ResolvedPlace, LocationError> {
        let place = self.resolver.resolve_current_place().await?;
        self.select(place.clone());
        Ok(place)
    }

    fn select(&mut self, place: ResolvedPlace) {
        self.orchestrator.select_place(place);
        self.navigation.set_place_selected(true);
    }

    /// Translate a classified gesture into navigation and data intents.
    /// Taps are dispatched by the rendering layer (hit testing lives
    /// there), so they are ignored here.
    pub fn handle_gesture(&mut self, event: GestureEvent) {
        match event.kind {
            GestureKind::SwipeLeft => {
                if let Some(next) = screen_after(self.navigation.current()) {
                    if let Err(e) = self.navigation.go_to_with(next, NavTrigger::Gesture) {
                        tracing::debug!("Swipe to {} refused: {}", next.name(), e);
                    }
                }
            }
            GestureKind::SwipeRight => {
                // go_back never fails; from Home it is a no-op
                let _ = self.navigation.go_back();
            }
            GestureKind::PullToRefresh => {
                self.orchestrator.refresh();
            }
            GestureKind::Tap => {}
        }
    }
}

/// Swipe-forward screen order: Home -> Details -> Search -> Settings.
fn screen_after(screen: Screen) -> Option<Screen> {
    match screen {
        Screen::Home => Some(Screen::Details),
        Screen::Details => Some(Screen::Search),
        Screen::Search => Some(Screen::Settings),
        Screen::Settings => None,
    }
}
