//! Data-flow engine
//!
//! Hosts a sub-graph of phy components on one scheduler thread. Building
//! the engine walks the internal graph in topological order, propagating
//! concrete element types, letting generic components specialise, and
//! creating one growing buffer per internal edge; output ports with no
//! internal consumer become external outputs handed back to the engine
//! manager. The scheduler processes root components unconditionally and
//! every other component while any of its internal inputs has data, so
//! data produced upstream is fully consumed before control returns to the
//! roots. Reconfigurations arrive through a mailbox drained between
//! passes.

use crate::buffer::any::{AnyBuffer, AnyGrowingBuffer};
use crate::buffer::rendezvous::NamedRendezvous;
use crate::component::events::EventSink;
use crate::component::phy::{PhyIo, ReadConnection, WriteConnection};
use crate::error::{RadioError, Result};
use crate::plugin::library::PhyHandle;
use crate::plugin::repository::Repository;
use crate::radio::descriptors::{EngineDescription, LinkDescription};
use crate::radio::reconfig::{Command, ParametricReconfig, ReconfigSet};
use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, error, info};
use petgraph::algo::toposort;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

struct ComponentEntry {
    name: String,
    handle: PhyHandle,
    io: PhyIo,
    internal_inputs: Vec<AnyGrowingBuffer>,
    is_root: bool,
}

/// Everything the scheduler thread owns while the engine runs
struct PhyCore {
    engine_name: String,
    entries: Vec<ComponentEntry>,
}

/// The topological data-flow engine
pub struct PhyEngine {
    name: String,
    core: Option<PhyCore>,
    thread: Option<JoinHandle<PhyCore>>,
    running: Arc<AtomicBool>,
    reconfig_tx: Sender<ReconfigSet>,
    reconfig_rx: Receiver<ReconfigSet>,
    external_inputs: Vec<AnyBuffer>,
    external_outputs: Vec<AnyBuffer>,
    prisons: HashMap<String, Arc<NamedRendezvous>>,
}

impl PhyEngine {
    pub fn new(name: &str) -> Self {
        let (reconfig_tx, reconfig_rx) = channel::unbounded();
        PhyEngine {
            name: name.to_ascii_lowercase(),
            core: None,
            thread: None,
            running: Arc::new(AtomicBool::new(false)),
            reconfig_tx,
            reconfig_rx,
            external_inputs: Vec::new(),
            external_outputs: Vec::new(),
            prisons: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Load components, propagate types, create buffers. Returns the
    /// external output buffers for downstream engines.
    pub fn load(
        &mut self,
        desc: &EngineDescription,
        inputs: Vec<AnyBuffer>,
        repository: &Repository,
        events: Arc<dyn EventSink>,
    ) -> Result<Vec<AnyBuffer>> {
        let graph = &desc.graph;
        let order = toposort(graph, None).map_err(|_| {
            RadioError::GraphStructure(format!("engine {} contains a cycle", self.name))
        })?;

        // Non-root components must have exactly one internal input
        for &v in &order {
            let in_edges = graph.edges_directed(v, Direction::Incoming).count();
            if in_edges > 1 {
                return Err(RadioError::GraphStructure(format!(
                    "component {} in engine {} has {} internal inputs",
                    graph[v].name, self.name, in_edges
                )));
            }
        }

        self.external_inputs = inputs;

        // Create every component up front, in topological order
        let mut entries: Vec<ComponentEntry> = Vec::with_capacity(order.len());
        let mut vertex_of = HashMap::new();
        for (i, &v) in order.iter().enumerate() {
            let comp_desc = &graph[v];
            let mut handle = repository.create_phy(&comp_desc.class, &comp_desc.name)?;
            for param in &comp_desc.parameters {
                handle.get_mut().base_mut().params.set_str(&param.name, &param.value)?;
            }
            vertex_of.insert(v, i);
            entries.push(ComponentEntry {
                name: comp_desc.name.clone(),
                handle,
                io: PhyIo::default(),
                internal_inputs: Vec::new(),
                is_root: graph.edges_directed(v, Direction::Incoming).count() == 0,
            });
        }

        // Buffers created for internal edges, keyed by edge index
        let mut edge_buffers: HashMap<petgraph::graph::EdgeIndex, AnyGrowingBuffer> =
            HashMap::new();
        let mut external_outputs = Vec::new();

        for &v in &order {
            let idx = vertex_of[&v];
            let comp_name = entries[idx].name.clone();

            // Collect this component's inputs: external buffers whose link
            // names it as sink, plus the buffers of internal in-edges
            let mut inputs: Vec<(String, ReadConnection)> = Vec::new();
            let mut internal_inputs = Vec::new();
            let mut input_types: BTreeMap<String, crate::types::TypeId> = BTreeMap::new();

            for buf in &self.external_inputs {
                let link = buf.link();
                if link.sink_component == comp_name {
                    input_types.insert(link.sink_port.clone(), buf.type_id());
                    inputs.push((link.sink_port.clone(), ReadConnection::External(buf.clone())));
                }
            }
            for edge in graph.edges_directed(v, Direction::Incoming) {
                let buf = edge_buffers
                    .get(&edge.id())
                    .cloned()
                    .ok_or_else(|| {
                        RadioError::GraphStructure(format!(
                            "internal buffer missing for link {}",
                            edge.weight()
                        ))
                    })?;
                input_types.insert(edge.weight().sink_port.clone(), buf.type_id());
                internal_inputs.push(buf.clone());
                inputs.push((
                    edge.weight().sink_port.clone(),
                    ReadConnection::Internal(buf),
                ));
            }

            // Connected types must be acceptable to the registered ports
            for (port_name, tid) in &input_types {
                if let Some(port) = entries[idx].handle.get().base().ports.input(port_name) {
                    if !port.supports(*tid) {
                        return Err(RadioError::InvalidDataType(format!(
                            "port {} of component {} does not accept {}",
                            port_name, comp_name, tid
                        )));
                    }
                }
            }

            // Ask the component for its output types and let it
            // specialise for the concrete type vector
            let mut output_types = entries[idx]
                .handle
                .get()
                .calculate_output_types(&input_types)?;
            let in_vec: Vec<_> = input_types.values().copied().collect();
            let out_vec: Vec<_> = output_types.values().copied().collect();
            if let Some(new) = entries[idx].handle.get().specialize(&in_vec, &out_vec)? {
                debug!("component {} specialised for {:?}", comp_name, in_vec);
                entries[idx].handle.replace(new);
                // A fresh instance needs the described parameters again
                let comp_desc = &graph[v];
                for param in &comp_desc.parameters {
                    entries[idx]
                        .handle
                        .get_mut()
                        .base_mut()
                        .params
                        .set_str(&param.name, &param.value)?;
                }
            }

            // One growing buffer per internal out-edge
            let mut outputs: Vec<(String, WriteConnection)> = Vec::new();
            for edge in graph.edges_directed(v, Direction::Outgoing) {
                let port = edge.weight().source_port.clone();
                let tid = output_types.remove(&port).ok_or_else(|| {
                    RadioError::ResourceNotFound(format!(
                        "output port {} could not be found on component {}",
                        port, comp_name
                    ))
                })?;
                let buf = AnyGrowingBuffer::create(tid)?;
                buf.set_link(edge.weight().clone());
                edge_buffers.insert(edge.id(), buf.clone());
                outputs.push((port, WriteConnection::Internal(buf)));
            }

            // Anything left becomes an external output
            for (port, tid) in output_types {
                let buf = AnyBuffer::create(tid)?;
                let link = desc
                    .links
                    .iter()
                    .find(|l| {
                        l.is_external() && l.source_component == comp_name && l.source_port == port
                    })
                    .cloned()
                    .unwrap_or_else(|| LinkDescription {
                        source_engine: self.name.clone(),
                        source_component: comp_name.clone(),
                        source_port: port.clone(),
                        ..Default::default()
                    });
                buf.set_link(link);
                external_outputs.push(buf.clone());
                outputs.push((port, WriteConnection::External(buf)));
            }

            // Bind and initialize
            let entry = &mut entries[idx];
            entry.io = PhyIo::new(inputs, outputs);
            entry.internal_inputs = internal_inputs;
            entry.handle.get_mut().base_mut().set_event_sink(Arc::clone(&events));
            entry.handle.get_mut().initialize()?;
        }

        self.prisons = entries
            .iter()
            .map(|e| (e.name.clone(), e.handle.get().base().prison()))
            .collect();
        self.external_outputs = external_outputs.clone();
        self.core = Some(PhyCore {
            engine_name: self.name.clone(),
            entries,
        });
        info!("engine {} loaded {} component(s)", self.name, self.prisons.len());
        Ok(external_outputs)
    }

    /// Start the scheduler thread
    pub fn start(&mut self) -> Result<()> {
        let mut core = self.core.take().ok_or_else(|| {
            RadioError::ResourceNotFound(format!("engine {} is not loaded", self.name))
        })?;
        for buf in self.external_inputs.iter().chain(&self.external_outputs) {
            buf.reset();
        }
        for entry in &mut core.entries {
            entry.handle.get_mut().start()?;
        }
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let reconfig_rx = self.reconfig_rx.clone();
        self.thread = Some(std::thread::spawn(move || {
            run_scheduler(core, running, reconfig_rx)
        }));
        Ok(())
    }

    /// Interrupt every wait, join the scheduler, run the stop hooks
    pub fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        for buf in self.external_inputs.iter().chain(&self.external_outputs) {
            buf.interrupt();
        }
        for prison in self.prisons.values() {
            prison.interrupt_all();
        }
        if let Some(thread) = self.thread.take() {
            if let Ok(mut core) = thread.join() {
                for entry in &mut core.entries {
                    entry.handle.get_mut().stop()?;
                }
                self.core = Some(core);
            }
        }
        Ok(())
    }

    /// Drop components and buffers
    pub fn unload(&mut self) {
        self.core = None;
        self.prisons.clear();
        self.external_inputs.clear();
        self.external_outputs.clear();
    }

    /// Queue a reconfiguration set; applied between scheduler passes
    pub fn add_reconfiguration(&self, set: ReconfigSet) {
        let _ = self.reconfig_tx.send(set);
    }

    /// A cloneable sender into the reconfiguration mailbox
    pub fn reconfig_sender(&self) -> Sender<ReconfigSet> {
        self.reconfig_tx.clone()
    }

    /// The command rendezvous of every loaded component, by name
    pub fn prisons(&self) -> HashMap<String, Arc<NamedRendezvous>> {
        self.prisons.clone()
    }

    /// Release any thread parked on the command's name in the target
    /// component
    pub fn post_command(&self, command: &Command) {
        match self.prisons.get(&command.component_name) {
            Some(prison) => prison.release(command),
            None => error!(
                "posting command failed: could not find component {}",
                command.component_name
            ),
        }
    }
}

fn run_scheduler(
    mut core: PhyCore,
    running: Arc<AtomicBool>,
    reconfig_rx: Receiver<ReconfigSet>,
) -> PhyCore {
    info!("engine {} scheduler running", core.engine_name);
    'outer: while running.load(Ordering::SeqCst) {
        // Apply queued reconfigurations between passes
        for set in reconfig_rx.try_iter() {
            for reconfig in &set.params {
                reconfigure_parameter(&mut core.entries, reconfig);
            }
        }

        for i in 0..core.entries.len() {
            let entry = &mut core.entries[i];
            let mut step = || -> Result<()> {
                if entry.is_root {
                    entry.handle.get_mut().process(&entry.io)
                } else {
                    while entry.internal_inputs.iter().any(AnyGrowingBuffer::has_data) {
                        entry.handle.get_mut().process(&entry.io)?;
                    }
                    Ok(())
                }
            };
            match step() {
                Ok(()) => {}
                Err(e) if e.is_interrupted() => {
                    info!("thread in engine {} interrupted", core.engine_name);
                    break 'outer;
                }
                Err(e) => {
                    error!(
                        "error in engine {}: {} - engine thread exiting",
                        core.engine_name, e
                    );
                    break 'outer;
                }
            }
        }
    }
    core
}

fn reconfigure_parameter(entries: &mut [ComponentEntry], reconfig: &ParametricReconfig) {
    let Some(entry) = entries.iter_mut().find(|e| e.name == reconfig.component_name) else {
        error!(
            "parametric reconfiguration failed: could not find component {}",
            reconfig.component_name
        );
        return;
    };
    match entry
        .handle
        .get_mut()
        .base_mut()
        .params
        .set_str(&reconfig.parameter_name, &reconfig.parameter_value)
    {
        Ok(()) => {
            entry
                .handle
                .get_mut()
                .parameter_changed(&reconfig.parameter_name);
            debug!(
                "reconfigured parameter {} : {}",
                reconfig.parameter_name, reconfig.parameter_value
            );
        }
        Err(e) => error!("parametric reconfiguration failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::mock::{self, Probe};
    use crate::radio::descriptors::{ComponentDescription, ParameterDescription};
    use crate::radio::representation::RadioRepresentation;
    use std::time::{Duration, Instant};

    struct NullSink;

    impl EventSink for NullSink {
        fn activate_event(&self, _event: crate::component::events::Event) {}
    }

    fn mock_repo(probe: &Arc<Probe>) -> Repository {
        let mut repo = Repository::new();
        repo.register_builtin_phy("mocksource", |name| {
            Box::new(mock::CounterSource::new(name))
        });
        let probe = Arc::clone(probe);
        repo.register_builtin_phy("mocksink", move |name| {
            Box::new(mock::CounterSink::with_probe(name, Arc::clone(&probe)))
        });
        repo
    }

    fn engine_description(count: u32) -> EngineDescription {
        let rep = RadioRepresentation::new();
        rep.add_engine_description(EngineDescription {
            name: "phyengine1".into(),
            class: "phyengine".into(),
            components: vec![
                ComponentDescription {
                    name: "src1".into(),
                    class: "mocksource".into(),
                    engine_name: "phyengine1".into(),
                    parameters: vec![ParameterDescription {
                        name: "count".into(),
                        value: count.to_string(),
                    }],
                    ports: vec![],
                },
                ComponentDescription {
                    name: "snk1".into(),
                    class: "mocksink".into(),
                    engine_name: "phyengine1".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        });
        rep.add_link_description(LinkDescription {
            source_component: "src1".into(),
            sink_component: "snk1".into(),
            source_port: "output1".into(),
            sink_port: "input1".into(),
            ..Default::default()
        });
        rep.build_graphs().unwrap();
        rep.engines().remove(0)
    }

    fn wait_for(probe: &Probe, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while probe.set_count() < n {
            assert!(Instant::now() < deadline, "timed out waiting for {} sets", n);
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_pipeline_delivers_in_order() {
        let probe = Probe::shared();
        let repo = mock_repo(&probe);
        let desc = engine_description(25);

        let mut engine = PhyEngine::new("phyengine1");
        let outputs = engine
            .load(&desc, vec![], &repo, Arc::new(NullSink))
            .unwrap();
        assert!(outputs.is_empty());

        engine.start().unwrap();
        wait_for(&probe, 25);
        engine.stop().unwrap();

        assert_eq!(probe.set_count(), 25);
        let values = probe.values.lock().unwrap();
        assert_eq!(*values, (0..25).collect::<Vec<i64>>());
    }

    #[test]
    fn test_reconfiguration_applies_between_passes() {
        let probe = Probe::shared();
        let repo = mock_repo(&probe);
        let desc = engine_description(5);

        let mut engine = PhyEngine::new("phyengine1");
        engine.load(&desc, vec![], &repo, Arc::new(NullSink)).unwrap();
        engine.start().unwrap();
        wait_for(&probe, 5);

        // Raising the count lets the source emit more
        engine.add_reconfiguration(ReconfigSet {
            params: vec![ParametricReconfig {
                engine_name: "phyengine1".into(),
                component_name: "src1".into(),
                parameter_name: "count".into(),
                parameter_value: "8".into(),
            }],
        });
        wait_for(&probe, 8);
        engine.stop().unwrap();
        assert_eq!(probe.set_count(), 8);
    }

    #[test]
    fn test_stop_is_prompt_even_when_blocked() {
        let probe = Probe::shared();
        let repo = mock_repo(&probe);
        // A sink-only engine blocks on its external input immediately
        let rep = RadioRepresentation::new();
        rep.add_engine_description(EngineDescription {
            name: "phyengine2".into(),
            class: "phyengine".into(),
            components: vec![ComponentDescription {
                name: "snk1".into(),
                class: "mocksink".into(),
                engine_name: "phyengine2".into(),
                ..Default::default()
            }],
            ..Default::default()
        });
        rep.build_graphs().unwrap();
        let desc = rep.engines().remove(0);

        let input = AnyBuffer::create(crate::types::TypeId::Int32).unwrap();
        input.set_link(LinkDescription {
            source_engine: "phyengine1".into(),
            sink_engine: "phyengine2".into(),
            source_component: "src1".into(),
            sink_component: "snk1".into(),
            source_port: "output1".into(),
            sink_port: "input1".into(),
        });

        let mut engine = PhyEngine::new("phyengine2");
        engine
            .load(&desc, vec![input], &repo, Arc::new(NullSink))
            .unwrap();
        engine.start().unwrap();
        std::thread::sleep(Duration::from_millis(30));

        let begin = Instant::now();
        engine.stop().unwrap();
        assert!(begin.elapsed() < Duration::from_secs(2));
        assert_eq!(probe.set_count(), 0);
    }
}
