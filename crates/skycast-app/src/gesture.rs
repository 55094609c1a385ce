//! Gesture recognition from raw pointer samples.
//!
//! Converts a press/move/release sample stream into discrete gesture
//! events. Classification happens once, on release, so a gesture is never
//! re-classified mid-stream; a release before any threshold is met emits
//! nothing.

use std::time::{Duration, Instant};

use skycast_core::{Emitter, GestureConfig, TelemetryEvent};

/// A classified, discrete user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    SwipeLeft,
    SwipeRight,
    PullToRefresh,
    Tap,
}

impl GestureKind {
    pub fn name(&self) -> &'static str {
        match self {
            GestureKind::SwipeLeft => "swipe_left",
            GestureKind::SwipeRight => "swipe_right",
            GestureKind::PullToRefresh => "pull_to_refresh",
            GestureKind::Tap => "tap",
        }
    }
}

/// Emitted gesture event. Ephemeral: produced and consumed within one
/// recognition cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureEvent {
    pub kind: GestureKind,
    /// Velocity along the classifying axis, in px/s
    pub velocity: f64,
    /// Travel along the classifying axis, in px
    pub distance: f64,
    pub started_at: Instant,
    pub ended_at: Instant,
}

/// One raw pointer sample. The caller supplies timestamps so recognition
/// stays deterministic and testable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub x: f64,
    pub y: f64,
    pub at: Instant,
}

#[derive(Debug, Clone, Copy)]
struct Press {
    start: PointerSample,
    last: PointerSample,
    /// Largest distance from the start seen during the press; a tap must
    /// stay within slop for its whole duration, not just at release.
    max_travel: f64,
}

/// Classifies pointer streams into gesture intents.
pub struct GestureRecognizer {
    config: GestureConfig,
    press: Option<Press>,
    telemetry: Emitter,
}

impl GestureRecognizer {
    pub fn new(config: GestureConfig, telemetry: Emitter) -> Self {
        Self {
            config,
            press: None,
            telemetry,
        }
    }

    /// Pointer down. A press already in progress is discarded: a fresh
    /// down means the previous stream ended without a release.
    pub fn begin(&mut self, sample: PointerSample) {
        if self.press.is_some() {
            tracing::debug!("Pointer down during active press; restarting recognition");
        }
        self.press = Some(Press {
            start: sample,
            last: sample,
            max_travel: 0.0,
        });
    }

    /// Pointer move. Samples before `begin` are ignored.
    pub fn motion(&mut self, sample: PointerSample) {
        if let Some(press) = self.press.as_mut() {
            let dx = sample.x - press.start.x;
            let dy = sample.y - press.start.y;
            press.max_travel = press.max_travel.max((dx * dx + dy * dy).sqrt());
            press.last = sample;
        }
    }

    /// Pointer up: classify the whole press, emitting at most one event.
    pub fn end(&mut self, sample: PointerSample) -> Option<GestureEvent> {
        let mut press = self.press.take()?;
        let dx = sample.x - press.start.x;
        let dy = sample.y - press.start.y;
        press.max_travel = press.max_travel.max((dx * dx + dy * dy).sqrt());

        let duration = sample.at.saturating_duration_since(press.start.at);
        // Guard divide-by-zero on degenerate same-instant releases
        let secs = duration.as_secs_f64().max(1e-3);

        let event = self.classify(&press, sample, dx, dy, duration, secs)?;

        self.telemetry.emit(
            TelemetryEvent::new("gesture_classified")
                .with("kind", event.kind.name())
                .with("distance", event.distance)
                .with("velocity", event.velocity),
        );
        tracing::trace!("Classified gesture: {}", event.kind.name());
        Some(event)
    }

    /// Abort recognition (pointer capture lost, gesture taken over by the
    /// host). Nothing is emitted.
    pub fn cancel(&mut self) {
        self.press = None;
    }

    fn classify(
        &self,
        press: &Press,
        release: PointerSample,
        dx: f64,
        dy: f64,
        duration: Duration,
        secs: f64,
    ) -> Option<GestureEvent> {
        let c = &self.config;
        let h_velocity = dx.abs() / secs;
        let v_velocity = dy.abs() / secs;

        if dx.abs() >= c.swipe_min_distance && h_velocity >= c.swipe_min_velocity && dx.abs() > dy.abs() {
            let kind = if dx < 0.0 {
                GestureKind::SwipeLeft
            } else {
                GestureKind::SwipeRight
            };
            return Some(GestureEvent {
                kind,
                velocity: h_velocity,
                distance: dx.abs(),
                started_at: press.start.at,
                ended_at: release.at,
            });
        }

        if press.start.y <= c.pull_region_height && dy >= c.pull_threshold && dy.abs() > dx.abs() {
            return Some(GestureEvent {
                kind: GestureKind::PullToRefresh,
                velocity: v_velocity,
                distance: dy,
                started_at: press.start.at,
                ended_at: release.at,
            });
        }

        if press.max_travel <= c.tap_slop && duration <= Duration::from_millis(c.tap_timeout_ms) {
            return Some(GestureEvent {
                kind: GestureKind::Tap,
                velocity: press.max_travel / secs,
                distance: press.max_travel,
                started_at: press.start.at,
                ended_at: release.at,
            });
        }

        None
    }
}
