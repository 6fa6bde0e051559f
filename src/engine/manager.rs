//! Engine manager
//!
//! Composes engines into a running radio: instantiates them from the
//! engine graph, loads them in topological order while threading the
//! inter-engine buffers along the graph edges, and afterwards routes
//! reconfigurations, commands, events and queries between the engines, the
//! controllers and the radio representation.
//!
//! The engines themselves are owned by the manager; the thread-shared
//! [`ManagerLink`] only carries their routing endpoints (reconfiguration
//! mailboxes, command rendezvous, stack shells), so controller threads can
//! reach a running engine without touching its components.

use crate::buffer::any::AnyBuffer;
use crate::buffer::rendezvous::NamedRendezvous;
use crate::component::events::{Event, EventSink};
use crate::component::stack::StackShell;
use crate::controller::manager::{ControllerManager, EventRouter};
use crate::controller::RadioCallback;
use crate::engine::Engine;
use crate::error::{RadioError, Result};
use crate::plugin::repository::RepositorySet;
use crate::radio::reconfig::{Command, ReconfigSet};
use crate::radio::representation::RadioRepresentation;
use crossbeam::channel::Sender;
use log::{debug, error, info};
use petgraph::algo::toposort;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

enum EngineRoute {
    Phy {
        reconfig: Sender<ReconfigSet>,
        prisons: HashMap<String, Arc<NamedRendezvous>>,
    },
    Stack {
        shells: Vec<Arc<StackShell>>,
    },
}

/// The runtime-reachable endpoints of one loaded engine
struct EngineEntry {
    name: String,
    route: EngineRoute,
}

impl EngineEntry {
    fn of(engine: &Engine) -> EngineEntry {
        match engine {
            Engine::Phy(e) => EngineEntry {
                name: e.name().to_string(),
                route: EngineRoute::Phy {
                    reconfig: e.reconfig_sender(),
                    prisons: e.prisons(),
                },
            },
            Engine::Stack(e) => EngineEntry {
                name: e.name().to_string(),
                route: EngineRoute::Stack { shells: e.shells() },
            },
        }
    }

    fn add_reconfiguration(&self, set: ReconfigSet) {
        match &self.route {
            EngineRoute::Phy { reconfig, .. } => {
                let _ = reconfig.send(set);
            }
            EngineRoute::Stack { shells } => {
                for reconfig in set.params {
                    match shells.iter().find(|s| s.name() == reconfig.component_name) {
                        Some(shell) => shell.add_reconfiguration(reconfig),
                        None => error!(
                            "parametric reconfiguration failed: could not find component {}",
                            reconfig.component_name
                        ),
                    }
                }
            }
        }
    }

    fn post_command(&self, command: &Command) {
        match &self.route {
            EngineRoute::Phy { prisons, .. } => match prisons.get(&command.component_name) {
                Some(prison) => prison.release(command),
                None => error!(
                    "posting command failed: could not find component {}",
                    command.component_name
                ),
            },
            EngineRoute::Stack { shells } => {
                match shells.iter().find(|s| s.name() == command.component_name) {
                    Some(shell) => shell.post_command(command),
                    None => error!(
                        "posting command {} failed: could not find component {}",
                        command.name, command.component_name
                    ),
                }
            }
        }
    }
}

/// Shared plumbing between the engines, the controllers and the radio
/// representation. Everything a controller or component may call at
/// runtime goes through here.
pub struct ManagerLink {
    radio: Mutex<Option<Arc<RadioRepresentation>>>,
    entries: RwLock<Vec<EngineEntry>>,
    router: Arc<EventRouter>,
}

impl ManagerLink {
    fn new(router: Arc<EventRouter>) -> Self {
        ManagerLink {
            radio: Mutex::new(None),
            entries: RwLock::new(Vec::new()),
            router,
        }
    }

    fn radio(&self) -> Option<Arc<RadioRepresentation>> {
        self.radio.lock().unwrap().clone()
    }
}

impl EventSink for ManagerLink {
    /// Events coming up from engines are forwarded to the subscribed
    /// controllers
    fn activate_event(&self, event: Event) {
        self.router.dispatch(event);
    }
}

impl RadioCallback for ManagerLink {
    fn reconfigure_radio(&self, set: ReconfigSet) {
        let entries = self.entries.read().unwrap();
        for entry in entries.iter() {
            let slice = set.for_engine(&entry.name);
            if !slice.is_empty() {
                entry.add_reconfiguration(slice);
            }
        }
        if let Some(radio) = self.radio() {
            radio.reconfigure(&set);
        }
    }

    fn post_command(&self, command: Command) {
        let entries = self.entries.read().unwrap();
        match entries.iter().find(|e| e.name == command.engine_name) {
            Some(entry) => entry.post_command(&command),
            None => debug!(
                "command {} not routed: no engine named {}",
                command.name, command.engine_name
            ),
        }
    }

    fn parameter_value(&self, param_name: &str, component_name: &str) -> String {
        self.radio()
            .map(|r| r.parameter_value(param_name, component_name))
            .unwrap_or_default()
    }

    fn subscribe(&self, event_name: &str, component_name: &str, queue: Sender<Event>) {
        self.router.subscribe(event_name, component_name, queue);
    }

    fn activate_event(&self, event: Event) {
        self.router.dispatch(event);
    }

    fn engine_of_component(&self, component_name: &str) -> Option<(String, usize, usize)> {
        self.radio().and_then(|r| r.engine_of_component(component_name))
    }

    fn engine_count(&self) -> usize {
        self.radio().map(|r| r.engine_count()).unwrap_or(0)
    }

    fn component_count(&self) -> usize {
        self.radio().map(|r| r.component_count()).unwrap_or(0)
    }

    fn engine_name(&self, index: usize) -> Option<String> {
        self.radio().and_then(|r| r.engine_name(index))
    }

    fn component_name(&self, index: usize) -> Option<String> {
        self.radio().and_then(|r| r.component_name(index))
    }

    fn parameter_count(&self, component_name: &str) -> Option<usize> {
        self.radio().and_then(|r| r.parameter_count(component_name))
    }

    fn parameter_by_index(&self, component_name: &str, index: usize) -> Option<(String, String)> {
        self.radio()
            .and_then(|r| r.parameter_by_index(component_name, index))
    }
}

/// Owns the radio: its representation, its engines and its controllers
pub struct EngineManager {
    repositories: RepositorySet,
    engines: Vec<Engine>,
    link: Arc<ManagerLink>,
    controllers: ControllerManager,
}

impl EngineManager {
    pub fn new(repositories: RepositorySet) -> Self {
        let router = Arc::new(EventRouter::default());
        let link = Arc::new(ManagerLink::new(Arc::clone(&router)));
        let callback: Arc<dyn RadioCallback> = Arc::clone(&link) as Arc<dyn RadioCallback>;
        EngineManager {
            repositories,
            engines: Vec::new(),
            link,
            controllers: ControllerManager::new(callback, router),
        }
    }

    pub fn repositories_mut(&mut self) -> &mut RepositorySet {
        &mut self.repositories
    }

    /// The current radio representation, if one is loaded
    pub fn current_radio(&self) -> Option<Arc<RadioRepresentation>> {
        self.link.radio()
    }

    /// Load a radio: controllers first, then every engine in topological
    /// order with inter-engine buffers threaded along the way. On failure
    /// everything loaded so far is unloaded again.
    pub fn load_radio(&mut self, representation: RadioRepresentation) -> Result<()> {
        if !representation.is_built() {
            representation.build_graphs()?;
        }
        let result = self.try_load(representation);
        if result.is_err() {
            self.unload_radio();
        }
        result
    }

    fn try_load(&mut self, representation: RadioRepresentation) -> Result<()> {
        let representation = Arc::new(representation);
        *self.link.radio.lock().unwrap() = Some(Arc::clone(&representation));

        for desc in representation.controllers() {
            self.controllers
                .load_controller(&desc, &self.repositories.controller)?;
        }

        let graph = representation.engine_graph();
        let order = toposort(&graph, None).map_err(|_| {
            RadioError::GraphStructure("engine graph contains a cycle".to_string())
        })?;

        let mut index_of = HashMap::new();
        for &v in &order {
            index_of.insert(v, self.engines.len());
            self.engines.push(Engine::create(&graph[v])?);
        }

        // Buffers attached to engine-graph edges as they are produced
        let mut edge_buffers: HashMap<petgraph::graph::EdgeIndex, AnyBuffer> = HashMap::new();

        for &v in &order {
            let idx = index_of[&v];
            let mut inputs = Vec::new();
            for edge in graph.edges_directed(v, Direction::Incoming) {
                let buf = edge_buffers.get(&edge.id()).cloned().ok_or_else(|| {
                    RadioError::GraphStructure(format!(
                        "no buffer produced for external link {}",
                        edge.weight()
                    ))
                })?;
                inputs.push(buf);
            }

            let events: Arc<dyn EventSink> = Arc::clone(&self.link) as Arc<dyn EventSink>;
            let outputs = self.engines[idx].load(&graph[v], inputs, &self.repositories, events)?;

            for edge in graph.edges_directed(v, Direction::Outgoing) {
                let matched = outputs
                    .iter()
                    .find(|b| b.link().same_source(edge.weight()))
                    .ok_or_else(|| {
                        RadioError::GraphStructure(format!(
                            "engine {} produced no buffer for external link {}",
                            graph[v].name,
                            edge.weight()
                        ))
                    })?;
                matched.set_link(edge.weight().clone());
                edge_buffers.insert(edge.id(), matched.clone());
            }
        }

        *self.link.entries.write().unwrap() =
            self.engines.iter().map(EngineEntry::of).collect();
        info!("radio loaded: {}", representation.summary());
        Ok(())
    }

    /// Start the controllers, then every engine
    pub fn start_radio(&mut self) -> Result<()> {
        self.controllers.start_controllers();
        for engine in &mut self.engines {
            engine.start()?;
        }
        Ok(())
    }

    /// Stop the controllers, then every engine
    pub fn stop_radio(&mut self) -> Result<()> {
        self.controllers.stop_controllers();
        for engine in &mut self.engines {
            engine.stop()?;
        }
        Ok(())
    }

    /// Unload everything: controllers before engines, engines before the
    /// representation
    pub fn unload_radio(&mut self) {
        self.controllers.unload_controllers();
        self.link.entries.write().unwrap().clear();
        for engine in &mut self.engines {
            engine.unload();
        }
        self.engines.clear();
        *self.link.radio.lock().unwrap() = None;
    }

    /// Split a reconfiguration set by engine, deliver each slice, and
    /// apply the set to the representation
    pub fn reconfigure_radio(&self, set: ReconfigSet) {
        self.link.reconfigure_radio(set);
    }

    /// Route a command to the engine it names. A command with no engine
    /// name targets a controller instead.
    pub fn post_command(&self, command: Command) {
        if command.engine_name.is_empty() {
            if !self.controllers.post_command(&command) {
                debug!(
                    "command {} not routed: no controller named {}",
                    command.name, command.component_name
                );
            }
        } else {
            self.link.post_command(command);
        }
    }

    pub fn parameter_value(&self, param_name: &str, component_name: &str) -> String {
        self.link.parameter_value(param_name, component_name)
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

    /// Emit an event into the controller fan-out, as if a component had
    /// activated it
    pub fn activate_event(&self, event: Event) {
        EventSink::activate_event(self.link.as_ref(), event);
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.controller_count()
    }
}

impl Drop for EngineManager {
    fn drop(&mut self) {
        // A caller that skips the stop/unload sequence must not leave
        // engine threads behind
        if !self.engines.is_empty() {
            if let Err(e) = self.stop_radio() {
                error!("error stopping radio during teardown: {}", e);
            }
            self.unload_radio();
        }
    }
}
