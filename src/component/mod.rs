//! Components
//!
//! A component is a plug-in unit with named typed ports, registered
//! parameters and events, and either a `process` step (data-flow
//! components) or message handlers (stack components). The shared state of
//! every component lives in a [`ComponentCore`] embedded in the concrete
//! implementation; the traits in `phy` and `stack` expose it through
//! `base()`/`base_mut()`.

pub mod events;
pub mod mock;
pub mod params;
pub mod phy;
pub mod ports;
pub mod stack;

use crate::buffer::rendezvous::NamedRendezvous;
use crate::error::Result;
use crate::radio::reconfig::Command;
use crate::types::value::Value;
use crate::types::TypeId;
use events::{EventRegistry, EventSink};
use params::{ParamRegistry, ParamSpec};
use ports::ComponentPorts;
use std::sync::Arc;

/// Identity of a component instance
#[derive(Debug, Clone, Default)]
pub struct ComponentInfo {
    pub name: String,
    pub class: String,
    pub description: String,
    pub author: String,
    pub version: String,
}

/// State shared by all component kinds: identity, ports, parameters,
/// events and the command rendezvous
#[derive(Debug)]
pub struct ComponentCore {
    pub info: ComponentInfo,
    pub ports: ComponentPorts,
    pub params: ParamRegistry,
    pub events: EventRegistry,
    prison: Arc<NamedRendezvous>,
}

impl ComponentCore {
    pub fn new(name: &str, class: &str, description: &str, author: &str, version: &str) -> Self {
        ComponentCore {
            info: ComponentInfo {
                name: name.to_ascii_lowercase(),
                class: class.to_ascii_lowercase(),
                description: description.to_string(),
                author: author.to_string(),
                version: version.to_string(),
            },
            ports: ComponentPorts::default(),
            params: ParamRegistry::new(),
            events: EventRegistry::new(),
            prison: Arc::new(NamedRendezvous::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Register a parameter; convenience forward to the registry
    pub fn register_parameter(&mut self, spec: ParamSpec) -> Result<()> {
        self.params.register(spec)
    }

    /// Register an event; convenience forward to the registry
    pub fn register_event(&mut self, name: &str, description: &str, type_id: TypeId) {
        self.events.register(name, description, type_id);
    }

    /// Activate a registered event under this component's name
    pub fn activate_event(&self, name: &str, data: Vec<Value>) -> Result<()> {
        self.events.activate(&self.info.name, name, data)
    }

    pub fn set_event_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.events.set_sink(sink);
    }

    /// The rendezvous commands are delivered to. Shared so the engine can
    /// release waiters without going through the component implementation.
    pub fn prison(&self) -> Arc<NamedRendezvous> {
        Arc::clone(&self.prison)
    }

    /// Park the calling thread until a command with this name arrives
    pub fn wait_for_command(&self, name: &str) -> Result<Command> {
        self.prison.trap(name)
    }

    /// Release any thread parked on the command's name
    pub fn post_command(&self, command: &Command) {
        self.prison.release(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_canonicalizes_identity() {
        let core = ComponentCore::new("Src1", "MockSource", "test source", "nobody", "0.1");
        assert_eq!(core.name(), "src1");
        assert_eq!(core.info.class, "mocksource");
    }

    #[test]
    fn test_command_round_trip_through_prison() {
        let core = ComponentCore::new("c", "x", "", "", "1");
        let prison = core.prison();
        // No waiter: release is a no-op
        core.post_command(&Command::new("go", "c", "e"));
        assert!(prison.is_empty());
    }
}
