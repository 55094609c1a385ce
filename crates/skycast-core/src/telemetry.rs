//! Fire-and-forget telemetry event records.
//!
//! Components emit abstract `TelemetryEvent` records describing what
//! happened (place selected, fetch retried, gesture classified, ...).
//! The emitter must never block the caller and a failing emitter must
//! never affect orchestration state, so every provided implementation
//! swallows delivery errors.

use std::sync::Arc;

use tokio::sync::mpsc;

/// A single scalar attribute value on a telemetry event.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<u32> for Scalar {
    fn from(v: u32) -> Self {
        Scalar::Int(i64::from(v))
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

/// An abstract event record handed to the telemetry collaborator.
#[derive(Debug, Clone)]
pub struct TelemetryEvent {
    pub name: &'static str,
    pub attributes: Vec<(&'static str, Scalar)>,
}

impl TelemetryEvent {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            attributes: Vec::new(),
        }
    }

    /// Builder-style attribute attachment.
    pub fn with(mut self, key: &'static str, value: impl Into<Scalar>) -> Self {
        self.attributes.push((key, value.into()));
        self
    }

    /// Look up an attribute by key (mainly useful in tests).
    pub fn attribute(&self, key: &str) -> Option<&Scalar> {
        self.attributes
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }
}

/// Receives event records. Implementations must be non-blocking.
pub trait TelemetryEmitter: Send + Sync {
    fn emit(&self, event: TelemetryEvent);
}

/// Shared emitter handle passed to every component.
pub type Emitter = Arc<dyn TelemetryEmitter>;

/// Discards all events.
#[derive(Debug, Default)]
pub struct NullEmitter;

impl TelemetryEmitter for NullEmitter {
    fn emit(&self, _event: TelemetryEvent) {}
}

/// Forwards events to `tracing` at debug level.
#[derive(Debug, Default)]
pub struct LogEmitter;

impl TelemetryEmitter for LogEmitter {
    fn emit(&self, event: TelemetryEvent) {
        tracing::debug!(name = event.name, attributes = ?event.attributes, "telemetry");
    }
}

/// Sends events over an unbounded channel. Delivery failures (receiver
/// dropped) are ignored so orchestration never observes them.
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<TelemetryEvent>,
}

impl ChannelEmitter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TelemetryEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TelemetryEmitter for ChannelEmitter {
    fn emit(&self, event: TelemetryEvent) {
        let _ = self.tx.send(event);
    }
}
