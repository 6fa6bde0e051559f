//! Controllers
//!
//! A controller has a global view of the running radio: it subscribes to
//! component events, receives them on its own event thread, and may call
//! back down to reconfigure the radio, post commands, or query parameter
//! values. An optional work thread runs controller-defined work steps.

pub mod manager;

use crate::buffer::rendezvous::NamedRendezvous;
use crate::component::events::Event;
use crate::component::params::ParamRegistry;
use crate::error::Result;
use crate::radio::reconfig::{Command, ReconfigSet};
use crossbeam::channel::Sender;
use std::sync::Arc;

/// The services the runtime offers to controllers. Implemented by the
/// engine-manager plumbing.
pub trait RadioCallback: Send + Sync {
    fn reconfigure_radio(&self, set: ReconfigSet);
    fn post_command(&self, command: Command);
    fn parameter_value(&self, param_name: &str, component_name: &str) -> String;
    fn subscribe(&self, event_name: &str, component_name: &str, queue: Sender<Event>);
    fn activate_event(&self, event: Event);
    fn engine_of_component(&self, component_name: &str) -> Option<(String, usize, usize)>;
    fn engine_count(&self) -> usize;
    fn component_count(&self) -> usize;
    fn engine_name(&self, index: usize) -> Option<String>;
    fn component_name(&self, index: usize) -> Option<String>;
    fn parameter_count(&self, component_name: &str) -> Option<usize>;
    fn parameter_by_index(&self, component_name: &str, index: usize) -> Option<(String, String)>;
}

/// What a controller sees of the runtime, bound to its own event queue
#[derive(Clone)]
pub struct ControllerServices {
    link: Arc<dyn RadioCallback>,
    queue: Sender<Event>,
}

impl ControllerServices {
    pub fn new(link: Arc<dyn RadioCallback>, queue: Sender<Event>) -> Self {
        ControllerServices { link, queue }
    }

    /// Subscribe this controller to an event on a component
    pub fn subscribe_to_event(&self, event_name: &str, component_name: &str) {
        self.link.subscribe(
            &event_name.to_ascii_lowercase(),
            &component_name.to_ascii_lowercase(),
            self.queue.clone(),
        );
    }

    /// Request a batch of parametric reconfigurations
    pub fn reconfigure_radio(&self, set: ReconfigSet) {
        self.link.reconfigure_radio(set);
    }

    /// Route a named command to a component
    pub fn post_command(&self, command: Command) {
        self.link.post_command(command);
    }

    /// Current string value of a component parameter
    pub fn parameter_value(&self, param_name: &str, component_name: &str) -> String {
        self.link.parameter_value(param_name, component_name)
    }

    /// Raise an event as if this controller were a component
    pub fn activate_event(&self, event: Event) {
        self.link.activate_event(event);
    }

    pub fn engine_of_component(&self, component_name: &str) -> Option<(String, usize, usize)> {
        self.link.engine_of_component(component_name)
    }

    pub fn engine_count(&self) -> usize {
        self.link.engine_count()
    }

    pub fn component_count(&self) -> usize {
        self.link.component_count()
    }

    pub fn engine_name(&self, index: usize) -> Option<String> {
        self.link.engine_name(index)
    }

    pub fn component_name(&self, index: usize) -> Option<String> {
        self.link.component_name(index)
    }

    pub fn parameter_count(&self, component_name: &str) -> Option<usize> {
        self.link.parameter_count(component_name)
    }

    pub fn parameter_by_index(&self, component_name: &str, index: usize) -> Option<(String, String)> {
        self.link.parameter_by_index(component_name, index)
    }
}

/// Identity and shared state of a controller instance
#[derive(Debug)]
pub struct ControllerCore {
    pub name: String,
    pub description: String,
    pub author: String,
    pub version: String,
    pub params: ParamRegistry,
    prison: Arc<NamedRendezvous>,
}

impl ControllerCore {
    pub fn new(name: &str, description: &str, author: &str, version: &str) -> Self {
        ControllerCore {
            name: name.to_ascii_lowercase(),
            description: description.to_string(),
            author: author.to_string(),
            version: version.to_string(),
            params: ParamRegistry::new(),
            prison: Arc::new(NamedRendezvous::new()),
        }
    }

    pub fn prison(&self) -> Arc<NamedRendezvous> {
        Arc::clone(&self.prison)
    }

    /// Park until a command with this name is posted to the controller
    pub fn wait_for_command(&self, name: &str) -> Result<Command> {
        self.prison.trap(name)
    }
}

/// A controller plug-in.
///
/// The event thread calls `subscribe_to_events` and `initialize` once,
/// then delivers events through `process_event` while the radio runs, and
/// calls `destroy` on unload. When `has_work` is true, a separate work
/// thread calls `work_step` repeatedly until unload.
pub trait Controller: Send {
    fn base(&self) -> &ControllerCore;
    fn base_mut(&mut self) -> &mut ControllerCore;

    /// Register event subscriptions; called first on the event thread
    fn subscribe_to_events(&mut self, services: &ControllerServices) -> Result<()>;

    /// One-time setup on the event thread
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Handle one event
    fn process_event(&mut self, event: Event, services: &ControllerServices) -> Result<()>;

    /// Whether this controller wants a work thread
    fn has_work(&self) -> bool {
        false
    }

    /// One unit of background work; called in a loop on the work thread
    fn work_step(&mut self, _services: &ControllerServices) -> Result<()> {
        Ok(())
    }

    /// Teardown, called when the controller unloads
    fn destroy(&mut self) {}
}

impl dyn Controller {
    pub fn name(&self) -> String {
        self.base().name.clone()
    }
}
