//! Stack components
//!
//! A stack component sits in a bidirectional message stack: neighbours
//! above hand it messages travelling down, neighbours below hand it
//! messages travelling up. Each registered input port gets its own inbox
//! and its own thread; an extra thread per component drains its
//! reconfiguration mailbox. The [`StackShell`] owns that plumbing around
//! the user implementation.

use crate::buffer::dataset::{Direction, StackDataSet};
use crate::buffer::rendezvous::NamedRendezvous;
use crate::buffer::stack::StackBuffer;
use crate::component::events::EventSink;
use crate::component::ComponentCore;
use crate::error::{RadioError, Result};
use crate::plugin::library::StackHandle;
use crate::radio::reconfig::{Command, ParametricReconfig};
use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use log::{debug, error, info};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

/// Marker substring: input ports whose name contains it face upward, so
/// messages arriving there come from above
pub const TOP_PORT_MARKER: &str = "top";

/// One neighbour entry: the local port, the peer port, the peer inbox
#[derive(Clone)]
pub struct StackNeighbour {
    pub local_port: String,
    pub peer_port: String,
    pub buffer: Arc<StackBuffer>,
}

/// The neighbour tables of one stack component
#[derive(Clone, Default)]
pub struct StackIo {
    above: BTreeMap<String, StackNeighbour>,
    below: BTreeMap<String, StackNeighbour>,
}

impl StackIo {
    pub fn add_above(&mut self, local_port: &str, peer_port: &str, buffer: Arc<StackBuffer>) {
        let local = local_port.to_ascii_lowercase();
        self.above.insert(
            local.clone(),
            StackNeighbour {
                local_port: local,
                peer_port: peer_port.to_ascii_lowercase(),
                buffer,
            },
        );
    }

    pub fn add_below(&mut self, local_port: &str, peer_port: &str, buffer: Arc<StackBuffer>) {
        let local = local_port.to_ascii_lowercase();
        self.below.insert(
            local.clone(),
            StackNeighbour {
                local_port: local,
                peer_port: peer_port.to_ascii_lowercase(),
                buffer,
            },
        );
    }

    fn send(neighbour: &StackNeighbour, mut set: StackDataSet, direction: Direction) -> Result<()> {
        set.direction = direction;
        set.source_port = neighbour.local_port.clone();
        set.dest_port = neighbour.peer_port.clone();
        neighbour.buffer.push(set)
    }

    /// Send a message up through the first upward port
    pub fn send_up(&self, set: StackDataSet) -> Result<()> {
        match self.above.values().next() {
            Some(n) => Self::send(n, set, Direction::FromBelow),
            None => {
                debug!("send_up dropped a message: no buffers above");
                Ok(())
            }
        }
    }

    /// Send a message down through the first downward port
    pub fn send_down(&self, set: StackDataSet) -> Result<()> {
        match self.below.values().next() {
            Some(n) => Self::send(n, set, Direction::FromAbove),
            None => {
                debug!("send_down dropped a message: no buffers below");
                Ok(())
            }
        }
    }

    /// Send a message up through a named port
    pub fn send_up_on(&self, port: &str, set: StackDataSet) -> Result<()> {
        match self.above.get(&port.to_ascii_lowercase()) {
            Some(n) => Self::send(n, set, Direction::FromBelow),
            None => {
                debug!("send_up dropped a message: no buffer above called {}", port);
                Ok(())
            }
        }
    }

    /// Send a message down through a named port
    pub fn send_down_on(&self, port: &str, set: StackDataSet) -> Result<()> {
        match self.below.get(&port.to_ascii_lowercase()) {
            Some(n) => Self::send(n, set, Direction::FromAbove),
            None => {
                debug!("send_down dropped a message: no buffer below called {}", port);
                Ok(())
            }
        }
    }

    pub fn has_above(&self) -> bool {
        !self.above.is_empty()
    }

    pub fn has_below(&self) -> bool {
        !self.below.is_empty()
    }
}

/// A message-driven component
pub trait StackComponent: Send {
    fn base(&self) -> &ComponentCore;
    fn base_mut(&mut self) -> &mut ComponentCore;

    /// Called once before the component's threads start
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Handle a message that arrived on an upward-facing port
    fn handle_from_above(&mut self, set: StackDataSet, io: &StackIo) -> Result<()>;

    /// Handle a message that arrived on a downward-facing port
    fn handle_from_below(&mut self, set: StackDataSet, io: &StackIo) -> Result<()>;

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called by the reconfiguration thread after a parameter change
    fn parameter_changed(&mut self, _name: &str) {}
}

/// Runtime harness around one stack component: per-port inboxes and
/// threads, the reconfiguration mailbox and thread, neighbour tables and
/// the command prison.
pub struct StackShell {
    name: String,
    imp: Mutex<StackHandle>,
    io: RwLock<StackIo>,
    inboxes: HashMap<String, Arc<StackBuffer>>,
    prison: Arc<NamedRendezvous>,
    reconfig_tx: Sender<ParametricReconfig>,
    reconfig_rx: Receiver<ParametricReconfig>,
    shutdown_tx: Sender<()>,
    shutdown_rx: Receiver<()>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl StackShell {
    pub fn new(imp: StackHandle) -> Self {
        let name = imp.get().base().name().to_string();
        let prison = imp.get().base().prison();
        let mut inboxes = HashMap::new();
        for port in imp.get().base().ports.inputs() {
            inboxes.insert(port.name.clone(), Arc::new(StackBuffer::new()));
        }
        let (reconfig_tx, reconfig_rx) = channel::unbounded();
        let (shutdown_tx, shutdown_rx) = channel::unbounded();
        StackShell {
            name,
            imp: Mutex::new(imp),
            io: RwLock::new(StackIo::default()),
            inboxes,
            prison,
            reconfig_tx,
            reconfig_rx,
            shutdown_tx,
            shutdown_rx,
            threads: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The inbox for one of this component's input ports
    pub fn inbox(&self, port: &str) -> Result<Arc<StackBuffer>> {
        self.inboxes
            .get(&port.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| {
                RadioError::ResourceNotFound(format!(
                    "stack component {} has no input port {}",
                    self.name, port
                ))
            })
    }

    /// Register a neighbour above this component
    pub fn add_buffer_above(&self, local_port: &str, peer_port: &str, buffer: Arc<StackBuffer>) {
        self.io
            .write()
            .unwrap()
            .add_above(local_port, peer_port, buffer);
    }

    /// Register a neighbour below this component
    pub fn add_buffer_below(&self, local_port: &str, peer_port: &str, buffer: Arc<StackBuffer>) {
        self.io
            .write()
            .unwrap()
            .add_below(local_port, peer_port, buffer);
    }

    /// Queue a parametric reconfiguration for the reconfiguration thread
    pub fn add_reconfiguration(&self, reconfig: ParametricReconfig) {
        let _ = self.reconfig_tx.send(reconfig);
    }

    /// Release any thread parked on the command's name
    pub fn post_command(&self, command: &Command) {
        self.prison.release(command);
    }

    pub fn set_event_sink(&self, sink: Arc<dyn EventSink>) {
        self.imp.lock().unwrap().get_mut().base_mut().set_event_sink(sink);
    }

    /// Apply a described parameter value to the implementation
    pub fn set_parameter_str(&self, name: &str, value: &str) -> Result<()> {
        self.imp
            .lock()
            .unwrap()
            .get_mut()
            .base_mut()
            .params
            .set_str(name, value)
    }

    /// Current value of a parameter, as a string
    pub fn parameter_str(&self, name: &str) -> Result<String> {
        self.imp.lock().unwrap().get().base().params.get_str(name)
    }

    /// Start the per-port threads and the reconfiguration thread
    pub fn start(self: &Arc<Self>) -> Result<()> {
        for inbox in self.inboxes.values() {
            inbox.reset();
        }
        {
            let mut imp = self.imp.lock().unwrap();
            let imp = imp.get_mut();
            imp.initialize()?;
            imp.start()?;
        }

        let mut threads = self.threads.lock().unwrap();
        for (port, inbox) in &self.inboxes {
            let shell = Arc::clone(self);
            let port = port.clone();
            let inbox = Arc::clone(inbox);
            let from_above = port.contains(TOP_PORT_MARKER);
            threads.push(std::thread::spawn(move || {
                shell.port_loop(&port, from_above, &inbox);
            }));
        }

        let shell = Arc::clone(self);
        threads.push(std::thread::spawn(move || shell.reconfig_loop()));
        Ok(())
    }

    /// Interrupt every blocked thread and join them
    pub fn stop(&self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        for inbox in self.inboxes.values() {
            inbox.interrupt();
        }
        self.prison.interrupt_all();

        let handles: Vec<_> = self.threads.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
        self.imp.lock().unwrap().get_mut().stop()
    }

    fn port_loop(&self, port: &str, from_above: bool, inbox: &StackBuffer) {
        loop {
            let set = match inbox.pop() {
                Ok(set) => set,
                Err(RadioError::Interrupted) => {
                    info!("thread for port {} in stack component {} interrupted", port, self.name);
                    return;
                }
                Err(e) => {
                    error!("error in stack component {}: {}", self.name, e);
                    return;
                }
            };
            let io = self.io.read().unwrap();
            let mut imp = self.imp.lock().unwrap();
            let imp = imp.get_mut();
            let result = if from_above {
                imp.handle_from_above(set, &io)
            } else {
                imp.handle_from_below(set, &io)
            };
            match result {
                Ok(()) => {}
                Err(RadioError::Interrupted) => {
                    info!("thread for port {} in stack component {} interrupted", port, self.name);
                    return;
                }
                Err(e) => {
                    error!(
                        "error in stack component {}: {} - exiting thread for {}",
                        self.name, e, port
                    );
                    return;
                }
            }
        }
    }

    fn reconfig_loop(&self) {
        loop {
            select! {
                recv(self.reconfig_rx) -> msg => {
                    let Ok(reconfig) = msg else { return };
                    let mut imp = self.imp.lock().unwrap();
                    let imp = imp.get_mut();
                    match imp
                        .base_mut()
                        .params
                        .set_str(&reconfig.parameter_name, &reconfig.parameter_value)
                    {
                        Ok(()) => {
                            imp.parameter_changed(&reconfig.parameter_name);
                            info!(
                                "reconfigured parameter {} : {}",
                                reconfig.parameter_name, reconfig.parameter_value
                            );
                        }
                        Err(e) => {
                            error!(
                                "parametric reconfiguration of {} failed: {}",
                                self.name, e
                            );
                        }
                    }
                }
                recv(self.shutdown_rx) -> _ => {
                    info!(
                        "reconfiguration thread for stack component {} interrupted",
                        self.name
                    );
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo {
        core: ComponentCore,
    }

    impl Echo {
        fn new(name: &str) -> Self {
            let mut core = ComponentCore::new(name, "echo", "echoes frames back down", "", "1");
            core.ports.register_input("topport1", vec![crate::types::TypeId::Uint8]);
            core.ports.register_input("bottomport1", vec![crate::types::TypeId::Uint8]);
            Echo { core }
        }
    }

    impl StackComponent for Echo {
        fn base(&self) -> &ComponentCore {
            &self.core
        }

        fn base_mut(&mut self) -> &mut ComponentCore {
            &mut self.core
        }

        fn handle_from_above(&mut self, set: StackDataSet, io: &StackIo) -> Result<()> {
            io.send_down(set)
        }

        fn handle_from_below(&mut self, set: StackDataSet, io: &StackIo) -> Result<()> {
            io.send_up(set)
        }
    }

    #[test]
    fn test_port_threads_dispatch_by_direction() {
        let shell = Arc::new(StackShell::new(StackHandle::Builtin(Box::new(Echo::new("mac")))));
        let sink_up = Arc::new(StackBuffer::new());
        let sink_down = Arc::new(StackBuffer::new());
        shell.add_buffer_above("topport1", "bottomport1", Arc::clone(&sink_up));
        shell.add_buffer_below("bottomport1", "topport1", Arc::clone(&sink_down));
        shell.start().unwrap();

        // A frame landing on the bottom port goes back up; one landing on
        // the top port goes back down.
        shell
            .inbox("bottomport1")
            .unwrap()
            .push(StackDataSet::from_bytes(&[1]))
            .unwrap();
        shell
            .inbox("topport1")
            .unwrap()
            .push(StackDataSet::from_bytes(&[2]))
            .unwrap();

        let up = sink_up.pop().unwrap();
        assert_eq!(up.data[0], 1);
        assert_eq!(up.direction, Direction::FromBelow);
        let down = sink_down.pop().unwrap();
        assert_eq!(down.data[0], 2);
        assert_eq!(down.direction, Direction::FromAbove);

        shell.stop().unwrap();
    }

    #[test]
    fn test_stop_terminates_threads() {
        let shell = Arc::new(StackShell::new(StackHandle::Builtin(Box::new(Echo::new("mac")))));
        shell.start().unwrap();
        shell.stop().unwrap();
        assert!(shell.threads.lock().unwrap().is_empty());
    }
}
