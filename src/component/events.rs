//! Component events
//!
//! Components declare the events they may emit (name, description, payload
//! type) and activate them at runtime. Activation checks the payload type
//! against the registration and hands the event to the sink injected by the
//! owning engine; with no sink attached the event is silently dropped.

use crate::error::{RadioError, Result};
use crate::types::value::{Value, ValueKind};
use crate::types::TypeId;
use std::sync::Arc;

/// A runtime event flowing from a component up to subscribed controllers
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub component_name: String,
    pub type_id: TypeId,
    pub data: Vec<Value>,
}

/// Where activated events go. Implemented by the engine-manager plumbing.
pub trait EventSink: Send + Sync {
    fn activate_event(&self, event: Event);
}

/// Declaration of one event
#[derive(Debug, Clone)]
pub struct EventSpec {
    pub name: String,
    pub description: String,
    pub type_id: TypeId,
}

/// The registered events of one component
#[derive(Default, Clone)]
pub struct EventRegistry {
    events: Vec<EventSpec>,
    sink: Option<Arc<dyn EventSink>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        EventRegistry::default()
    }

    pub fn register(&mut self, name: &str, description: &str, type_id: TypeId) {
        self.events.push(EventSpec {
            name: name.to_ascii_lowercase(),
            description: description.to_string(),
            type_id,
        });
    }

    /// Inject the sink events are delivered to
    pub fn set_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sink = Some(sink);
    }

    pub fn has(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.events.iter().any(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Activate a registered event with a payload.
    ///
    /// Fails with `EventNotFound` for an unregistered name and
    /// `InvalidDataType` when the payload does not match the registered
    /// type. Without a sink the event is dropped silently.
    pub fn activate(&self, component_name: &str, name: &str, data: Vec<Value>) -> Result<()> {
        let name = name.to_ascii_lowercase();
        let spec = self
            .events
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| RadioError::EventNotFound(name.clone()))?;
        let expected = ValueKind::for_type_id(spec.type_id);
        if data.iter().any(|v| v.kind() != expected) {
            return Err(RadioError::InvalidDataType(format!(
                "event {} expects {} payloads",
                name, expected
            )));
        }
        if let Some(sink) = &self.sink {
            sink.activate_event(Event {
                name,
                component_name: component_name.to_ascii_lowercase(),
                type_id: spec.type_id,
                data,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("events", &self.events)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture {
        events: Mutex<Vec<Event>>,
    }

    impl EventSink for Capture {
        fn activate_event(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_activation_reaches_sink() {
        let mut reg = EventRegistry::new();
        reg.register("SnrUpdate", "per-frame snr", TypeId::Float32);
        let sink = Arc::new(Capture::default());
        reg.set_sink(sink.clone());

        reg.activate("demod1", "SNRUPDATE", vec![Value::Float32(12.5)])
            .unwrap();
        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "snrupdate");
        assert_eq!(events[0].component_name, "demod1");
    }

    #[test]
    fn test_unregistered_event_fails() {
        let reg = EventRegistry::new();
        assert!(matches!(
            reg.activate("c", "nope", vec![]),
            Err(RadioError::EventNotFound(_))
        ));
    }

    #[test]
    fn test_payload_type_checked() {
        let mut reg = EventRegistry::new();
        reg.register("count", "", TypeId::Uint32);
        assert!(matches!(
            reg.activate("c", "count", vec![Value::Float64(1.0)]),
            Err(RadioError::InvalidDataType(_))
        ));
    }

    #[test]
    fn test_no_sink_is_silent() {
        let mut reg = EventRegistry::new();
        reg.register("count", "", TypeId::Uint32);
        reg.activate("c", "count", vec![Value::Uint32(1)]).unwrap();
    }
}
