//! Data orchestration: keeps exactly one fresh `ForecastBundle` for the
//! currently selected place.
//!
//! The orchestrator owns the request-state slot and the last-good bundle.
//! Retry, backoff, staleness, and cancellation policy all live here so the
//! clients below stay pure request/response boundaries. Cancellation is
//! cooperative: every spawned fetch carries the slot generation it was
//! started for and discards its result if the slot has moved on.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use skycast_core::{Emitter, FetchError, RetrySettings, TelemetryEvent, TemperatureUnit};
use skycast_weather::{ForecastBundle, ResolvedPlace, WeatherFetch};
use tokio::task::JoinHandle;

/// Why a displayed bundle is flagged stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// Bundle is older than the configured freshness window
    MaxAge,
    /// A refresh for the same place is pending; bundle is last-good data
    Refreshing,
}

/// Request state for the single place slot. The orchestrator is the sole
/// mutator; everything handed out is a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestState {
    Idle,
    InFlight {
        started_at: DateTime<Utc>,
    },
    Success {
        bundle: ForecastBundle,
    },
    Failed {
        kind: FetchError,
        retry_count: u32,
    },
    Stale {
        bundle: ForecastBundle,
        reason: StaleReason,
    },
}

impl RequestState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RequestState::InFlight { .. })
    }
}

/// Exponential backoff schedule for fetch retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Fetch attempts per request, first try included
    pub max_attempts: u32,
    /// Initial delay between attempts (doubles each retry)
    pub base_delay: Duration,
    /// Cap on the backoff delay
    pub max_delay: Duration,
}

impl From<RetrySettings> for RetryConfig {
    fn from(s: RetrySettings) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            base_delay: Duration::from_millis(s.base_delay_ms),
            max_delay: Duration::from_millis(s.max_delay_ms),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based): base * 2^attempt,
    /// capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = (self.base_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay.as_millis() as u64))
    }
}

/// Snapshot of the slot for the rendering layer.
#[derive(Debug, Clone)]
pub struct WeatherViewModel {
    pub place: Option<ResolvedPlace>,
    pub state: RequestState,
    /// Last successfully fetched bundle for the current place. Kept so a
    /// failure never blanks the screen: only a failure with no prior
    /// success leaves this empty.
    pub last_good: Option<ForecastBundle>,
}

struct Slot {
    place: Option<ResolvedPlace>,
    state: RequestState,
    last_good: Option<ForecastBundle>,
    /// Bumped whenever a new fetch supersedes the slot; results from older
    /// generations are discarded.
    generation: u64,
    /// A fetch task for the current generation is still running.
    fetch_active: bool,
    tasks: Vec<JoinHandle<()>>,
}

struct Inner {
    slot: Mutex<Slot>,
    weather: Arc<dyn WeatherFetch>,
    unit: TemperatureUnit,
    retry: RetryConfig,
    max_age: chrono::Duration,
    telemetry: Emitter,
}

/// Sequences location/geocoding/weather data for the selected place.
#[derive(Clone)]
pub struct DataOrchestrator {
    inner: Arc<Inner>,
}

impl DataOrchestrator {
    pub fn new(
        weather: Arc<dyn WeatherFetch>,
        unit: TemperatureUnit,
        retry: impl Into<RetryConfig>,
        max_age: Duration,
        telemetry: Emitter,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot {
                    place: None,
                    state: RequestState::Idle,
                    last_good: None,
                    generation: 0,
                    fetch_active: false,
                    tasks: Vec::new(),
                }),
                weather,
                unit,
                retry: retry.into(),
                max_age: chrono::Duration::from_std(max_age)
                    .unwrap_or_else(|_| chrono::Duration::minutes(30)),
                telemetry,
            }),
        }
    }

    /// Select a new place and start fetching its forecast. Any fetch in
    /// flight for the previous selection is superseded; its late result
    /// will be discarded, never applied.
    pub fn select_place(&self, place: ResolvedPlace) {
        let generation = {
            let mut slot = self.inner.slot.lock();
            slot.generation += 1;
            slot.place = Some(place.clone());
            slot.last_good = None;
            slot.state = RequestState::InFlight {
                started_at: Utc::now(),
            };
            slot.fetch_active = true;
            slot.generation
        };

        self.inner.telemetry.emit(
            TelemetryEvent::new("place_selected").with("place", place.display_name.clone()),
        );
        tracing::info!("Selected place: {}", place.display_name);

        self.spawn_fetch(place, generation);
    }

    /// Re-fetch for the current place. No-op while a fetch is already in
    /// flight or when no place is selected. Returns whether a fetch was
    /// started.
    pub fn refresh(&self) -> bool {
        let (place, generation) = {
            let mut slot = self.inner.slot.lock();
            if slot.fetch_active {
                tracing::debug!("Refresh ignored: fetch already in flight");
                return false;
            }
            let Some(place) = slot.place.clone() else {
                tracing::debug!("Refresh ignored: no place selected");
                return false;
            };

            slot.generation += 1;
            slot.fetch_active = true;
            // Keep showing last-good data, flagged as updating
            slot.state = match slot.last_good.clone() {
                Some(bundle) => RequestState::Stale {
                    bundle,
                    reason: StaleReason::Refreshing,
                },
                None => RequestState::InFlight {
                    started_at: Utc::now(),
                },
            };
            (place, slot.generation)
        };

        self.spawn_fetch(place, generation);
        true
    }

    /// Current request state. Reading may demote an aged `Success` to
    /// `Stale` and trigger one passive background refresh per detection.
    pub fn state(&self) -> RequestState {
        self.refresh_if_stale();
        self.inner.slot.lock().state.clone()
    }

    /// Demote an aged `Success` to `Stale { MaxAge }` and start one
    /// background refresh per detection.
    fn refresh_if_stale(&self) {
        let refresh_input = {
            let mut slot = self.inner.slot.lock();
            let aged = match &slot.state {
                RequestState::Success { bundle } => {
                    bundle.age(Utc::now()) > self.inner.max_age
                }
                _ => false,
            };
            if aged && !slot.fetch_active {
                if let (RequestState::Success { bundle }, Some(place)) =
                    (slot.state.clone(), slot.place.clone())
                {
                    slot.state = RequestState::Stale {
                        bundle,
                        reason: StaleReason::MaxAge,
                    };
                    slot.generation += 1;
                    slot.fetch_active = true;
                    Some((place, slot.generation))
                } else {
                    None
                }
            } else {
                None
            }
        };

        if let Some((place, generation)) = refresh_input {
            tracing::info!("Bundle for {} is stale, refreshing", place.display_name);
            self.spawn_fetch(place, generation);
        }
    }

    /// Snapshot for rendering: place, request state, last-good bundle.
    /// Built under a single lock so the fields always belong to the same
    /// moment, even with fetches landing concurrently.
    pub fn view(&self) -> WeatherViewModel {
        self.refresh_if_stale();
        let slot = self.inner.slot.lock();
        WeatherViewModel {
            place: slot.place.clone(),
            state: slot.state.clone(),
            last_good: slot.last_good.clone(),
        }
    }

    pub fn current_place(&self) -> Option<ResolvedPlace> {
        self.inner.slot.lock().place.clone()
    }

    /// Await completion of all spawned fetch tasks, superseded ones
    /// included. Used by tests and graceful shutdown.
    pub async fn wait_settled(&self) {
        loop {
            let tasks: Vec<JoinHandle<()>> = {
                let mut slot = self.inner.slot.lock();
                std::mem::take(&mut slot.tasks)
            };
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                let _ = task.await;
            }
        }
    }

    fn spawn_fetch(&self, place: ResolvedPlace, generation: u64) {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            fetch_with_retry(inner, place, generation).await;
        });
        let mut slot = self.inner.slot.lock();
        // Superseded tasks exit promptly on their generation check, so
        // finished handles have nothing left to report; drop them here to
        // keep the set bounded over a long session.
        slot.tasks.retain(|task| !task.is_finished());
        slot.tasks.push(handle);
    }

    #[cfg(test)]
    fn task_count(&self) -> usize {
        self.inner.slot.lock().tasks.len()
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.slot.lock().generation == generation
    }

    fn apply_success(&self, generation: u64, bundle: ForecastBundle) -> bool {
        let mut slot = self.slot.lock();
        if slot.generation != generation {
            return false;
        }
        slot.last_good = Some(bundle.clone());
        slot.state = RequestState::Success { bundle };
        slot.fetch_active = false;
        true
    }

    fn apply_failure(&self, generation: u64, kind: FetchError, retry_count: u32) -> bool {
        let mut slot = self.slot.lock();
        if slot.generation != generation {
            return false;
        }
        slot.state = RequestState::Failed { kind, retry_count };
        slot.fetch_active = false;
        true
    }
}

/// Fetch loop for one slot generation: up to `max_attempts` tries with
/// exponential backoff, rate-limit waits honoring the server-advised
/// delay. Checks the generation before every effect so a superseded fetch
/// never overwrites newer state and never applies a `Failed` transition.
async fn fetch_with_retry(inner: Arc<Inner>, place: ResolvedPlace, generation: u64) {
    let max_attempts = inner.retry.max_attempts;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        inner.telemetry.emit(
            TelemetryEvent::new("fetch_started")
                .with("place", place.display_name.clone())
                .with("attempt", attempt),
        );

        let result = inner.weather.fetch(&place.coordinate, inner.unit).await;

        if !inner.is_current(generation) {
            tracing::debug!("Discarding superseded fetch for {}", place.display_name);
            return;
        }

        match result {
            Ok(bundle) => {
                if inner.apply_success(generation, bundle) {
                    inner.telemetry.emit(
                        TelemetryEvent::new("fetch_succeeded")
                            .with("place", place.display_name.clone())
                            .with("retry_count", attempt - 1),
                    );
                    tracing::info!(
                        "Forecast for {} ready after {} attempt(s)",
                        place.display_name,
                        attempt
                    );
                }
                return;
            }
            Err(error) => {
                if attempt >= max_attempts {
                    tracing::warn!(
                        "Forecast for {} failed after {} attempts: {}",
                        place.display_name,
                        attempt,
                        error
                    );
                    if inner.apply_failure(generation, error.clone(), attempt - 1) {
                        inner.telemetry.emit(
                            TelemetryEvent::new("fetch_failed")
                                .with("place", place.display_name.clone())
                                .with("kind", error.kind_name())
                                .with("retry_count", attempt - 1),
                        );
                    }
                    return;
                }

                // Server-advised wait takes precedence over the schedule
                let delay = match &error {
                    FetchError::RateLimited {
                        retry_after: Some(wait),
                    } => *wait,
                    _ => inner.retry.delay_for_attempt(attempt - 1),
                };

                inner.telemetry.emit(
                    TelemetryEvent::new("fetch_retried")
                        .with("place", place.display_name.clone())
                        .with("kind", error.kind_name())
                        .with("attempt", attempt)
                        .with("delay_ms", delay.as_millis() as i64),
                );
                tracing::debug!(
                    "Fetch attempt {} for {} failed ({}), retrying in {:?}",
                    attempt,
                    place.display_name,
                    error,
                    delay
                );
                tokio::time::sleep(delay).await;

                if !inner.is_current(generation) {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use skycast_core::{ChannelEmitter, NullEmitter};
    use skycast_weather::{
        Coordinate, CoordinateSource, CurrentConditions, WeatherCondition,
    };
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn place(name: &str, lat: f64, lon: f64) -> ResolvedPlace {
        ResolvedPlace {
            display_name: name.to_string(),
            coordinate: Coordinate::new(lat, lon, None, CoordinateSource::Manual).unwrap(),
            provider_id: "nominatim".to_string(),
        }
    }

    fn bundle_at(fetched_at: DateTime<Utc>, temperature: f64) -> ForecastBundle {
        ForecastBundle {
            current: CurrentConditions {
                temperature,
                feels_like: temperature,
                humidity: 50,
                wind_speed: 2.0,
                condition: WeatherCondition::Clear,
            },
            hourly: Vec::new(),
            daily: Vec::new(),
            fetched_at,
            provider_id: "open-meteo".to_string(),
        }
    }

    fn bundle(temperature: f64) -> ForecastBundle {
        bundle_at(Utc::now(), temperature)
    }

    struct ScriptEntry {
        gate: Option<Arc<Notify>>,
        result: Result<ForecastBundle, FetchError>,
    }

    /// Mock fetcher: pops scripted responses per place (keyed by
    /// latitude, since concurrent tasks interleave), optionally waiting
    /// on a gate first.
    struct ScriptedFetch {
        scripts: Mutex<Vec<(f64, VecDeque<ScriptEntry>)>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetch {
        fn empty() -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn new(latitude: f64, entries: Vec<ScriptEntry>) -> Arc<Self> {
            let fetch = Self::empty();
            fetch.script_for(latitude, entries);
            fetch
        }

        fn script_for(&self, latitude: f64, entries: Vec<ScriptEntry>) {
            self.scripts.lock().push((latitude, entries.into()));
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn ok(bundle: ForecastBundle) -> ScriptEntry {
        ScriptEntry {
            gate: None,
            result: Ok(bundle),
        }
    }

    fn err(error: FetchError) -> ScriptEntry {
        ScriptEntry {
            gate: None,
            result: Err(error),
        }
    }

    fn gated(gate: Arc<Notify>, result: Result<ForecastBundle, FetchError>) -> ScriptEntry {
        ScriptEntry {
            gate: Some(gate),
            result,
        }
    }

    #[async_trait]
    impl WeatherFetch for ScriptedFetch {
        async fn fetch(
            &self,
            coordinate: &Coordinate,
            _unit: TemperatureUnit,
        ) -> Result<ForecastBundle, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let entry = {
                let mut scripts = self.scripts.lock();
                scripts
                    .iter_mut()
                    .find(|(lat, _)| (lat - coordinate.latitude()).abs() < 1e-6)
                    .and_then(|(_, entries)| entries.pop_front())
            };
            match entry {
                Some(entry) => {
                    if let Some(gate) = entry.gate {
                        gate.notified().await;
                    }
                    entry.result
                }
                None => Err(FetchError::Network("script exhausted".into())),
            }
        }
    }

    fn fast_retry() -> RetrySettings {
        RetrySettings {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 10,
        }
    }

    fn orchestrator(fetch: Arc<ScriptedFetch>, retry: RetrySettings) -> DataOrchestrator {
        DataOrchestrator::new(
            fetch,
            TemperatureUnit::Auto,
            retry,
            Duration::from_secs(1800),
            Arc::new(NullEmitter),
        )
    }

    #[test]
    fn backoff_delays_strictly_increase_until_cap() {
        let retry = RetryConfig::from(RetrySettings {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        });
        assert_eq!(retry.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(retry.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(retry.delay_for_attempt(3), Duration::from_millis(800));
        // Capped beyond the max
        assert_eq!(retry.delay_for_attempt(10), Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn select_place_fetches_and_succeeds() {
        let fetch = ScriptedFetch::new(47.6, vec![ok(bundle(18.0))]);
        let orch = orchestrator(Arc::clone(&fetch), fast_retry());

        orch.select_place(place("Seattle", 47.6, -122.3));
        assert!(orch.state().is_in_flight() || matches!(orch.state(), RequestState::Success { .. }));

        orch.wait_settled().await;
        match orch.state() {
            RequestState::Success { bundle } => assert_eq!(bundle.current.temperature, 18.0),
            other => panic!("expected Success, got {:?}", other),
        }
        assert_eq!(fetch.calls(), 1);

        let view = orch.view();
        assert_eq!(view.place.unwrap().display_name, "Seattle");
        assert!(view.last_good.is_some());
    }

    #[tokio::test]
    async fn refresh_is_noop_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let fetch = ScriptedFetch::new(59.9, vec![gated(Arc::clone(&gate), Ok(bundle(15.0)))]);
        let orch = orchestrator(Arc::clone(&fetch), fast_retry());

        orch.select_place(place("Oslo", 59.9, 10.7));
        assert!(!orch.refresh(), "refresh during in-flight fetch must be a no-op");

        gate.notify_one();
        orch.wait_settled().await;
        assert_eq!(fetch.calls(), 1, "no duplicate fetch may be issued");
    }

    #[tokio::test]
    async fn refresh_with_no_place_is_noop() {
        let fetch = ScriptedFetch::empty();
        let orch = orchestrator(Arc::clone(&fetch), fast_retry());
        assert!(!orch.refresh());
        assert_eq!(fetch.calls(), 0);
    }

    #[tokio::test]
    async fn late_result_for_superseded_place_is_discarded() {
        let gate = Arc::new(Notify::new());
        // Place A's fetch blocks until released; place B's returns at once.
        let fetch = ScriptedFetch::empty();
        fetch.script_for(60.0, vec![gated(Arc::clone(&gate), Ok(bundle(-5.0)))]);
        fetch.script_for(25.0, vec![ok(bundle(30.0))]);
        let orch = orchestrator(Arc::clone(&fetch), fast_retry());

        orch.select_place(place("A", 60.0, 10.0));
        orch.select_place(place("B", 25.0, 55.0));

        // Release A's (now superseded) fetch and drain everything
        gate.notify_one();
        orch.wait_settled().await;

        match orch.state() {
            RequestState::Success { bundle } => {
                assert_eq!(bundle.current.temperature, 30.0, "A's late result must not win")
            }
            other => panic!("expected Success for B, got {:?}", other),
        }
        assert_eq!(orch.current_place().unwrap().display_name, "B");
    }

    #[tokio::test]
    async fn late_failure_for_superseded_place_never_surfaces() {
        let gate_a = Arc::new(Notify::new());
        let gate_b = Arc::new(Notify::new());
        let fetch = ScriptedFetch::empty();
        fetch.script_for(
            60.0,
            vec![gated(
                Arc::clone(&gate_a),
                Err(FetchError::Network("reset".into())),
            )],
        );
        fetch.script_for(25.0, vec![gated(Arc::clone(&gate_b), Ok(bundle(30.0)))]);
        let orch = orchestrator(Arc::clone(&fetch), fast_retry());

        orch.select_place(place("A", 60.0, 10.0));
        orch.select_place(place("B", 25.0, 55.0));

        // A's superseded fetch fails while B's is still pending; the
        // failure must be swallowed, not retried or recorded
        gate_a.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(
            orch.state().is_in_flight(),
            "superseded failure must leave B's request untouched"
        );

        gate_b.notify_one();
        orch.wait_settled().await;
        match orch.state() {
            RequestState::Success { bundle } => assert_eq!(bundle.current.temperature, 30.0),
            other => panic!("expected Success for B, got {:?}", other),
        }
        // A's single attempt, B's single attempt; no retry of A's failure
        assert_eq!(fetch.calls(), 2);
    }

    #[tokio::test]
    async fn completed_fetch_handles_are_pruned_on_next_spawn() {
        let fetch = ScriptedFetch::new(47.6, vec![ok(bundle(18.0)), ok(bundle(19.0))]);
        let orch = orchestrator(Arc::clone(&fetch), fast_retry());

        orch.select_place(place("Seattle", 47.6, -122.3));
        while !matches!(orch.state(), RequestState::Success { .. }) {
            tokio::task::yield_now().await;
        }
        // Let the task body return after it applied the result
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(orch.task_count(), 1);

        assert!(orch.refresh());
        assert_eq!(
            orch.task_count(),
            1,
            "finished handle must be dropped when the next fetch spawns"
        );

        orch.wait_settled().await;
        assert!(matches!(orch.state(), RequestState::Success { .. }));
    }

    #[tokio::test]
    async fn view_demotes_aged_bundle_in_one_snapshot() {
        let old = Utc::now() - chrono::Duration::hours(2);
        let fetch = ScriptedFetch::new(60.2, vec![ok(bundle_at(old, 9.0)), ok(bundle(10.0))]);
        let orch = orchestrator(Arc::clone(&fetch), fast_retry());

        orch.select_place(place("Helsinki", 60.2, 24.9));
        orch.wait_settled().await;

        // One call yields a coherent snapshot: demoted state, same place,
        // last-good bundle all from the same lock acquisition
        let view = orch.view();
        match view.state {
            RequestState::Stale { bundle, reason } => {
                assert_eq!(reason, StaleReason::MaxAge);
                assert_eq!(bundle.current.temperature, 9.0);
            }
            other => panic!("expected Stale{{MaxAge}}, got {:?}", other),
        }
        assert_eq!(view.place.unwrap().display_name, "Helsinki");
        assert_eq!(view.last_good.unwrap().current.temperature, 9.0);

        orch.wait_settled().await;
        assert_eq!(fetch.calls(), 2);
    }

    #[tokio::test]
    async fn retries_exhaust_into_failed_with_no_auto_retry() {
        let fetch = ScriptedFetch::new(64.1, vec![
            err(FetchError::Network("reset".into())),
            err(FetchError::Network("reset".into())),
            err(FetchError::Network("reset".into())),
            ok(bundle(20.0)),
        ]);
        let orch = orchestrator(Arc::clone(&fetch), fast_retry());

        orch.select_place(place("Reykjavik", 64.1, -21.9));
        orch.wait_settled().await;

        match orch.state() {
            RequestState::Failed { kind, retry_count } => {
                assert_eq!(kind.kind_name(), "network");
                assert_eq!(retry_count, 2);
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(fetch.calls(), 3);

        // Reading state again must not trigger another fetch
        let _ = orch.state();
        let _ = orch.view();
        orch.wait_settled().await;
        assert_eq!(fetch.calls(), 3, "no automatic retry after exhaustion");

        // Explicit refresh starts a new round
        assert!(orch.refresh());
        orch.wait_settled().await;
        assert!(matches!(orch.state(), RequestState::Success { .. }));
        assert_eq!(fetch.calls(), 4);
    }

    #[tokio::test]
    async fn failure_after_success_keeps_last_good_bundle() {
        let fetch = ScriptedFetch::new(60.4, vec![
            ok(bundle(12.0)),
            err(FetchError::Timeout),
            err(FetchError::Timeout),
            err(FetchError::Timeout),
        ]);
        let orch = orchestrator(Arc::clone(&fetch), fast_retry());

        orch.select_place(place("Bergen", 60.4, 5.3));
        orch.wait_settled().await;
        assert!(matches!(orch.state(), RequestState::Success { .. }));

        assert!(orch.refresh());
        orch.wait_settled().await;

        let view = orch.view();
        assert!(matches!(view.state, RequestState::Failed { .. }));
        let last_good = view.last_good.expect("last-good bundle must survive failures");
        assert_eq!(last_good.current.temperature, 12.0);
    }

    #[tokio::test]
    async fn refresh_shows_stale_over_last_good_while_pending() {
        let gate = Arc::new(Notify::new());
        let fetch = ScriptedFetch::new(60.4, vec![
            ok(bundle(12.0)),
            gated(Arc::clone(&gate), Ok(bundle(13.0))),
        ]);
        let orch = orchestrator(Arc::clone(&fetch), fast_retry());

        orch.select_place(place("Bergen", 60.4, 5.3));
        orch.wait_settled().await;

        assert!(orch.refresh());
        match orch.state() {
            RequestState::Stale { bundle, reason } => {
                assert_eq!(reason, StaleReason::Refreshing);
                assert_eq!(bundle.current.temperature, 12.0);
            }
            other => panic!("expected Stale while refreshing, got {:?}", other),
        }

        gate.notify_one();
        orch.wait_settled().await;
        match orch.state() {
            RequestState::Success { bundle } => assert_eq!(bundle.current.temperature, 13.0),
            other => panic!("expected Success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn aged_success_demotes_to_stale_and_refreshes_once() {
        let old = Utc::now() - chrono::Duration::hours(2);
        let fetch = ScriptedFetch::new(60.2, vec![ok(bundle_at(old, 9.0)), ok(bundle(10.0))]);
        let orch = orchestrator(Arc::clone(&fetch), fast_retry());

        orch.select_place(place("Helsinki", 60.2, 24.9));
        orch.wait_settled().await;

        // First read detects the aged bundle
        match orch.state() {
            RequestState::Stale { bundle, reason } => {
                assert_eq!(reason, StaleReason::MaxAge);
                assert_eq!(bundle.current.temperature, 9.0);
            }
            other => panic!("expected Stale{{MaxAge}}, got {:?}", other),
        }

        orch.wait_settled().await;
        assert_eq!(fetch.calls(), 2, "exactly one background refresh per detection");
        assert!(matches!(orch.state(), RequestState::Success { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_honors_server_advised_wait() {
        let fetch = ScriptedFetch::new(38.7, vec![
            err(FetchError::RateLimited {
                retry_after: Some(Duration::from_secs(30)),
            }),
            ok(bundle(21.0)),
        ]);
        let orch = orchestrator(
            Arc::clone(&fetch),
            RetrySettings {
                max_attempts: 3,
                base_delay_ms: 100,
                max_delay_ms: 5000,
            },
        );

        let started = tokio::time::Instant::now();
        orch.select_place(place("Lisbon", 38.7, -9.1));
        orch.wait_settled().await;

        assert!(matches!(orch.state(), RequestState::Success { .. }));
        // The retry waited the advised 30 s, not the 100 ms schedule
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn telemetry_reports_selection_and_retries() {
        let (emitter, mut rx) = ChannelEmitter::channel();
        let fetch = ScriptedFetch::new(41.1, vec![err(FetchError::Timeout), ok(bundle(16.0))]);
        let orch = DataOrchestrator::new(
            fetch,
            TemperatureUnit::Auto,
            fast_retry(),
            Duration::from_secs(1800),
            Arc::new(emitter),
        );

        orch.select_place(place("Porto", 41.1, -8.6));
        orch.wait_settled().await;

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name);
        }
        assert!(names.contains(&"place_selected"));
        assert_eq!(names.iter().filter(|n| **n == "fetch_retried").count(), 1);
        assert!(names.contains(&"fetch_succeeded"));
    }
}
