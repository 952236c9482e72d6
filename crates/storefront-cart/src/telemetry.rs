//! # Telemetry
//!
//! Best-effort analytics side channel.
//!
//! The engine records one event per finished action. Sinks may fail; the
//! engine logs the failure and moves on, so nothing here can affect cart
//! state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::TelemetryError;

// =============================================================================
// Event
// =============================================================================

/// Flat property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::Number(f64::from(value))
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl<T: Into<PropertyValue>> From<Option<T>> for PropertyValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PropertyValue::Null, Into::into)
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::String(s) => f.write_str(s),
            PropertyValue::Number(n) => write!(f, "{}", n),
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Null => f.write_str("null"),
        }
    }
}

/// A named event with flat properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub name: String,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl TelemetryEvent {
    pub fn new(name: impl Into<String>) -> Self {
        TelemetryEvent {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Adds a property (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Reads a property.
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}

// =============================================================================
// Sink Trait
// =============================================================================

/// Telemetry sink (implemented by whatever analytics transport is wired).
pub trait Telemetry: Send + Sync {
    /// Records an event.
    fn track(&self, event: TelemetryEvent) -> Result<(), TelemetryError>;
}

/// Sink that drops everything. The engine default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpTelemetry;

impl Telemetry for NoOpTelemetry {
    fn track(&self, _event: TelemetryEvent) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Sink that writes events to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn track(&self, event: TelemetryEvent) -> Result<(), TelemetryError> {
        let properties = serde_json::to_string(&event.properties)
            .map_err(|e| TelemetryError(e.to_string()))?;
        info!(target: "storefront::telemetry", event = %event.name, %properties, "Telemetry event");
        Ok(())
    }
}

/// Sink that keeps events in memory for assertions.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingTelemetry {
    events: std::sync::Mutex<Vec<TelemetryEvent>>,
    failing: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `track` call fail (events are still recorded).
    pub fn fail_all(&self) {
        self.failing
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// All recorded events, oldest first.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Recorded events with the given name.
    pub fn named(&self, name: &str) -> Vec<TelemetryEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }
}

#[cfg(test)]
impl Telemetry for RecordingTelemetry {
    fn track(&self, event: TelemetryEvent) -> Result<(), TelemetryError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);

        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(TelemetryError("sink unavailable".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let event = TelemetryEvent::new("add_to_cart")
            .with("variantId", "variant-1")
            .with("quantity", 2u32)
            .with("resultingCartId", None::<String>);

        assert_eq!(event.property("variantId"), Some(&PropertyValue::from("variant-1")));
        assert_eq!(event.property("quantity"), Some(&PropertyValue::Number(2.0)));
        assert_eq!(event.property("resultingCartId"), Some(&PropertyValue::Null));
    }

    #[test]
    fn test_properties_serialize_flat() {
        let event = TelemetryEvent::new("x").with("ok", true).with("n", 3u32);
        let json = serde_json::to_string(&event.properties).unwrap();
        assert_eq!(json, r#"{"n":3.0,"ok":true}"#);
    }

    #[test]
    fn test_recording_sink_can_fail() {
        let sink = RecordingTelemetry::new();
        assert!(sink.track(TelemetryEvent::new("a")).is_ok());

        sink.fail_all();
        assert!(sink.track(TelemetryEvent::new("b")).is_err());
        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.named("b").len(), 1);
    }

    #[test]
    fn test_tracing_sink_never_fails_on_plain_events() {
        assert!(TracingTelemetry.track(TelemetryEvent::new("a").with("k", "v")).is_ok());
        assert!(NoOpTelemetry.track(TelemetryEvent::new("a")).is_ok());
    }
}
