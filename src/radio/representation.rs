//! The in-memory radio representation
//!
//! Holds everything needed to run a radio: controller, engine, component
//! and link descriptions, the component-level graph, the engine-level
//! graph, and each engine's internal graph. Construction is append-only;
//! `build_graphs` then wires and classifies everything. After that, every
//! read and mutation goes through the representation's single mutex.

use crate::error::{RadioError, Result};
use crate::radio::descriptors::{
    ComponentDescription, ControllerDescription, EngineDescription, LinkDescription, canonical,
};
use crate::radio::reconfig::{ParametricReconfig, ReconfigSet};
use log::warn;
use petgraph::graph::{DiGraph, NodeIndex};
use std::sync::Mutex;

/// Component-level graph of the whole radio
pub type RadioGraph = DiGraph<ComponentDescription, LinkDescription>;

/// Engine-level graph: one vertex per engine, one edge per external link
pub type EngineLevelGraph = DiGraph<EngineDescription, LinkDescription>;

#[derive(Default)]
struct RepInner {
    controllers: Vec<ControllerDescription>,
    engines: Vec<EngineDescription>,
    links: Vec<LinkDescription>,
    external_links: Vec<LinkDescription>,
    radio_graph: RadioGraph,
    engine_graph: EngineLevelGraph,
    is_built: bool,
}

/// All information needed to run a radio, guarded by one mutex
#[derive(Default)]
pub struct RadioRepresentation {
    inner: Mutex<RepInner>,
}

fn find_component(graph: &RadioGraph, name: &str) -> Option<NodeIndex> {
    graph.node_indices().find(|&i| graph[i].name == name)
}

fn find_engine(graph: &EngineLevelGraph, name: &str) -> Option<NodeIndex> {
    graph.node_indices().find(|&i| graph[i].name == name)
}

impl RadioRepresentation {
    pub fn new() -> Self {
        RadioRepresentation::default()
    }

    pub fn add_controller_description(&self, controller: ControllerDescription) {
        self.inner.lock().unwrap().controllers.push(controller);
    }

    pub fn add_engine_description(&self, engine: EngineDescription) {
        self.inner.lock().unwrap().engines.push(engine);
    }

    pub fn add_link_description(&self, link: LinkDescription) {
        self.inner.lock().unwrap().links.push(link);
    }

    /// Build the component graph, classify links as internal or external,
    /// build each engine's internal graph and the engine-level graph.
    ///
    /// Fails with `GraphStructure` when a link references a component that
    /// no engine contains.
    pub fn build_graphs(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let inner = &mut *inner;

        // Component vertices, in engine order
        for engine in &inner.engines {
            for comp in &engine.components {
                inner.radio_graph.add_node(comp.clone());
            }
        }

        // Link edges
        for link in &inner.links {
            let src = find_component(&inner.radio_graph, &link.source_component).ok_or_else(|| {
                RadioError::GraphStructure(format!(
                    "could not find component {} referenced by link",
                    link.source_component
                ))
            })?;
            let snk = find_component(&inner.radio_graph, &link.sink_component).ok_or_else(|| {
                RadioError::GraphStructure(format!(
                    "could not find component {} referenced by link",
                    link.sink_component
                ))
            })?;
            inner.radio_graph.add_edge(src, snk, link.clone());
        }

        // Stamp engine names and classify each edge once
        let edge_indices: Vec<_> = inner.radio_graph.edge_indices().collect();
        for edge in edge_indices {
            let (src, snk) = inner.radio_graph.edge_endpoints(edge).unwrap();
            let source_engine = inner.radio_graph[src].engine_name.clone();
            let sink_engine = inner.radio_graph[snk].engine_name.clone();
            let link = &mut inner.radio_graph[edge];
            link.source_engine = source_engine.clone();
            link.sink_engine = sink_engine.clone();
            let link = link.clone();

            if link.is_external() {
                inner.external_links.push(link);
            } else {
                for engine in &mut inner.engines {
                    if engine.name == source_engine {
                        engine.links.push(link.clone());
                    }
                }
            }
        }

        // Each engine's internal graph comes from its components and its
        // internal links only
        for engine in &mut inner.engines {
            build_engine_graph(engine)?;
        }

        // External links are appended to both endpoint engines afterwards,
        // for discoverability
        for link in &inner.external_links {
            for engine in &mut inner.engines {
                if engine.name == link.source_engine || engine.name == link.sink_engine {
                    engine.links.push(link.clone());
                }
            }
        }

        // Engine-level graph; duplicate external links between the same
        // engine pair stay distinct edges
        for engine in &inner.engines {
            inner.engine_graph.add_node(engine.clone());
        }
        for link in &inner.external_links {
            let src = find_engine(&inner.engine_graph, &link.source_engine).ok_or_else(|| {
                RadioError::GraphStructure(format!("could not find engine {}", link.source_engine))
            })?;
            let snk = find_engine(&inner.engine_graph, &link.sink_engine).ok_or_else(|| {
                RadioError::GraphStructure(format!("could not find engine {}", link.sink_engine))
            })?;
            inner.engine_graph.add_edge(src, snk, link.clone());
        }

        inner.is_built = true;
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.inner.lock().unwrap().is_built
    }

    /// Apply a set of parametric reconfigurations. Entries whose target
    /// cannot be found are logged and skipped; the rest still apply.
    pub fn reconfigure(&self, set: &ReconfigSet) {
        let mut inner = self.inner.lock().unwrap();
        for reconfig in &set.params {
            if let Err(e) = apply_reconfig(&mut inner, reconfig) {
                warn!("reconfiguration of representation skipped: {}", e);
            }
        }
    }

    /// Current string value of a parameter, or empty when the component or
    /// parameter is absent
    pub fn parameter_value(&self, param_name: &str, component_name: &str) -> String {
        let param_name = canonical(param_name);
        let component_name = canonical(component_name);
        let inner = self.inner.lock().unwrap();
        let Some(idx) = find_component(&inner.radio_graph, &component_name) else {
            return String::new();
        };
        inner.radio_graph[idx]
            .parameters
            .iter()
            .find(|p| p.name == param_name)
            .map(|p| p.value.clone())
            .unwrap_or_default()
    }

    /// Engine owning a component, with the engine index and the component
    /// index within that engine
    pub fn engine_of_component(&self, component_name: &str) -> Option<(String, usize, usize)> {
        let component_name = canonical(component_name);
        let inner = self.inner.lock().unwrap();
        for (ei, engine) in inner.engines.iter().enumerate() {
            for (ci, comp) in engine.components.iter().enumerate() {
                if comp.name == component_name {
                    return Some((engine.name.clone(), ei, ci));
                }
            }
        }
        None
    }

    pub fn engine_count(&self) -> usize {
        self.inner.lock().unwrap().engines.len()
    }

    pub fn component_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .engines
            .iter()
            .map(|e| e.components.len())
            .sum()
    }

    pub fn engine_name(&self, index: usize) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .engines
            .get(index)
            .map(|e| e.name.clone())
    }

    /// Component name by global index, counting through engines in order
    pub fn component_name(&self, index: usize) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .engines
            .iter()
            .flat_map(|e| e.components.iter())
            .nth(index)
            .map(|c| c.name.clone())
    }

    pub fn parameter_count(&self, component_name: &str) -> Option<usize> {
        let component_name = canonical(component_name);
        let inner = self.inner.lock().unwrap();
        inner
            .engines
            .iter()
            .flat_map(|e| e.components.iter())
            .find(|c| c.name == component_name)
            .map(|c| c.parameters.len())
    }

    /// Parameter (name, value) by index on a component
    pub fn parameter_by_index(&self, component_name: &str, index: usize) -> Option<(String, String)> {
        let component_name = canonical(component_name);
        let inner = self.inner.lock().unwrap();
        inner
            .engines
            .iter()
            .flat_map(|e| e.components.iter())
            .find(|c| c.name == component_name)
            .and_then(|c| c.parameters.get(index))
            .map(|p| (p.name.clone(), p.value.clone()))
    }

    pub fn controllers(&self) -> Vec<ControllerDescription> {
        self.inner.lock().unwrap().controllers.clone()
    }

    pub fn engines(&self) -> Vec<EngineDescription> {
        self.inner.lock().unwrap().engines.clone()
    }

    pub fn links(&self) -> Vec<LinkDescription> {
        self.inner.lock().unwrap().links.clone()
    }

    pub fn external_links(&self) -> Vec<LinkDescription> {
        self.inner.lock().unwrap().external_links.clone()
    }

    pub fn engine_graph(&self) -> EngineLevelGraph {
        self.inner.lock().unwrap().engine_graph.clone()
    }

    pub fn radio_graph(&self) -> RadioGraph {
        self.inner.lock().unwrap().radio_graph.clone()
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let inner = self.inner.lock().unwrap();
        format!(
            "{} engine(s), {} component(s), {} link(s) ({} external)",
            inner.engines.len(),
            inner.engines.iter().map(|e| e.components.len()).sum::<usize>(),
            inner.links.len(),
            inner.external_links.len()
        )
    }
}

fn build_engine_graph(engine: &mut EngineDescription) -> Result<()> {
    let mut graph = DiGraph::new();
    for comp in &engine.components {
        graph.add_node(comp.clone());
    }
    for link in &engine.links {
        let src = graph
            .node_indices()
            .find(|&i| graph[i].name == link.source_component)
            .ok_or_else(|| {
                RadioError::GraphStructure(format!(
                    "could not find component {} referenced by link",
                    link.source_component
                ))
            })?;
        let snk = graph
            .node_indices()
            .find(|&i| graph[i].name == link.sink_component)
            .ok_or_else(|| {
                RadioError::GraphStructure(format!(
                    "could not find component {} referenced by link",
                    link.sink_component
                ))
            })?;
        graph.add_edge(src, snk, link.clone());
    }
    engine.graph = graph;
    Ok(())
}

fn apply_reconfig(inner: &mut RepInner, reconfig: &ParametricReconfig) -> Result<()> {
    // Component graph first
    let idx = find_component(&inner.radio_graph, &reconfig.component_name).ok_or_else(|| {
        RadioError::ResourceNotFound(format!(
            "could not find component {} when reconfiguring representation",
            reconfig.component_name
        ))
    })?;
    for param in &mut inner.radio_graph[idx].parameters {
        if param.name == reconfig.parameter_name {
            param.value = reconfig.parameter_value.clone();
        }
    }
    let updated = inner.radio_graph[idx].clone();

    // Engine description list
    let mut updated_engine = None;
    for engine in &mut inner.engines {
        if engine.name == reconfig.engine_name {
            for comp in &mut engine.components {
                if comp.name == reconfig.component_name {
                    comp.parameters = updated.parameters.clone();
                }
            }
            updated_engine = Some(engine.clone());
        }
    }

    // Engine-level graph
    let engine = updated_engine.ok_or_else(|| {
        RadioError::ResourceNotFound(format!(
            "could not find engine {} when reconfiguring representation",
            reconfig.engine_name
        ))
    })?;
    if let Some(v) = find_engine(&inner.engine_graph, &reconfig.engine_name) {
        inner.engine_graph[v] = engine;
    }
    Ok(())
}

/// Count the edges of every engine's internal graph
pub fn internal_edge_total(engines: &[EngineDescription]) -> usize {
    engines.iter().map(|e| e.graph.edge_count()).sum()
}
