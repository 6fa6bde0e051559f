//! Controller manager
//!
//! Loads controller plug-ins, runs their event and work threads, and fans
//! activated events out to subscribers. Each controller's event loop first
//! registers its subscriptions and initializes, then parks until the radio
//! starts, then drains its event queue.

use crate::component::events::Event;
use crate::controller::{ControllerServices, RadioCallback};
use crate::error::{RadioError, Result};
use crate::plugin::library::ControllerHandle;
use crate::plugin::repository::Repository;
use crate::radio::descriptors::ControllerDescription;
use crate::radio::reconfig::Command;
use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use log::{error, info};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

/// Separator in the subscription key between event and component name
const KEY_SEPARATOR: char = '·';

/// Routes activated events to the queues of subscribed controllers
#[derive(Default)]
pub struct EventRouter {
    subscribers: Mutex<HashMap<String, Vec<Sender<Event>>>>,
}

impl EventRouter {
    fn key(event_name: &str, component_name: &str) -> String {
        format!("{}{}{}", event_name, KEY_SEPARATOR, component_name)
    }

    /// Append a subscriber queue under the (event, component) key.
    /// Writes only happen while controllers load.
    pub fn subscribe(&self, event_name: &str, component_name: &str, queue: Sender<Event>) {
        self.subscribers
            .lock()
            .unwrap()
            .entry(Self::key(event_name, component_name))
            .or_default()
            .push(queue);
    }

    /// Push an event into every subscriber's queue (non-blocking)
    pub fn dispatch(&self, event: Event) {
        let subscribers = self.subscribers.lock().unwrap();
        if let Some(queues) = subscribers.get(&Self::key(&event.name, &event.component_name)) {
            for queue in queues {
                let _ = queue.send(event.clone());
            }
        }
    }

    pub fn clear(&self) {
        self.subscribers.lock().unwrap().clear();
    }

    pub fn subscription_count(&self) -> usize {
        self.subscribers.lock().unwrap().values().map(Vec::len).sum()
    }
}

enum Ctl {
    /// Radio stopped: go back to parking until the next start
    Pause,
    /// Controller unloading: exit the event loop
    Shutdown,
}

#[derive(Default)]
struct Gate {
    state: Mutex<GateState>,
    cond: Condvar,
}

#[derive(Default)]
struct GateState {
    started: bool,
    interrupted: bool,
}

impl Gate {
    fn wait_started(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.interrupted {
                return Err(RadioError::Interrupted);
            }
            if state.started {
                return Ok(());
            }
            state = self.cond.wait(state).unwrap();
        }
    }

    fn set_started(&self, started: bool) {
        self.state.lock().unwrap().started = started;
        self.cond.notify_all();
    }

    fn interrupt(&self) {
        self.state.lock().unwrap().interrupted = true;
        self.cond.notify_all();
    }
}

/// Runtime harness around one controller: its threads, queue and gate
pub struct ControllerShell {
    name: String,
    imp: Mutex<ControllerHandle>,
    services: ControllerServices,
    queue_rx: Receiver<Event>,
    ctl_tx: Sender<Ctl>,
    ctl_rx: Receiver<Ctl>,
    gate: Gate,
    prison: Arc<crate::buffer::rendezvous::NamedRendezvous>,
    has_work: bool,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl ControllerShell {
    fn new(handle: ControllerHandle, link: Arc<dyn RadioCallback>) -> (Arc<Self>, Sender<Event>) {
        let (queue_tx, queue_rx) = channel::unbounded();
        let (ctl_tx, ctl_rx) = channel::unbounded();
        let name = handle.get().base().name.clone();
        let prison = handle.get().base().prison();
        let has_work = handle.get().has_work();
        let shell = Arc::new(ControllerShell {
            name,
            imp: Mutex::new(handle),
            services: ControllerServices::new(link, queue_tx.clone()),
            queue_rx,
            ctl_tx,
            ctl_rx,
            gate: Gate::default(),
            prison,
            has_work,
            threads: Mutex::new(Vec::new()),
        });
        (shell, queue_tx)
    }

    /// Spin up the event thread (and the work thread when requested).
    /// Returns once the controller has subscribed and initialized, so no
    /// event raised after loading can be missed.
    fn load(self: &Arc<Self>) -> Result<()> {
        let (ready_tx, ready_rx) = channel::bounded(1);
        let mut threads = self.threads.lock().unwrap();
        let shell = Arc::clone(self);
        threads.push(std::thread::spawn(move || shell.event_loop(ready_tx)));
        if self.has_work {
            let shell = Arc::clone(self);
            threads.push(std::thread::spawn(move || shell.work_loop()));
        }
        drop(threads);
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.unload();
                Err(e)
            }
            Err(_) => Err(RadioError::ResourceNotFound(format!(
                "controller {} failed to start its event thread",
                self.name
            ))),
        }
    }

    fn event_loop(&self, ready_tx: Sender<Result<()>>) {
        let setup = {
            let mut imp = self.imp.lock().unwrap();
            let imp = imp.get_mut();
            imp.subscribe_to_events(&self.services)
                .and_then(|_| imp.initialize())
        };
        let failed = setup.is_err();
        let _ = ready_tx.send(setup);
        if failed {
            self.imp.lock().unwrap().get_mut().destroy();
            return;
        }

        loop {
            // Park here until the radio starts (or the controller unloads)
            if self.gate.wait_started().is_err() {
                break;
            }
            select! {
                recv(self.queue_rx) -> msg => {
                    let Ok(event) = msg else { break };
                    let mut imp = self.imp.lock().unwrap();
                    if let Err(e) = imp.get_mut().process_event(event, &self.services) {
                        if e.is_interrupted() {
                            info!("controller thread in {} interrupted", self.name);
                        } else {
                            error!(
                                "error in controller {}: {} - controller thread exiting",
                                self.name, e
                            );
                        }
                        break;
                    }
                }
                recv(self.ctl_rx) -> msg => {
                    match msg {
                        Ok(Ctl::Pause) => continue,
                        Ok(Ctl::Shutdown) | Err(_) => break,
                    }
                }
            }
        }
        self.imp.lock().unwrap().get_mut().destroy();
    }

    fn work_loop(&self) {
        loop {
            // A paused or unloading radio also stops the work loop
            if self.gate.wait_started().is_err() {
                info!("work thread of controller {} interrupted", self.name);
                return;
            }
            let result = self.imp.lock().unwrap().get_mut().work_step(&self.services);
            match result {
                Ok(()) => {}
                Err(e) if e.is_interrupted() => {
                    info!("work thread of controller {} interrupted", self.name);
                    return;
                }
                Err(e) => {
                    error!("error in controller {}: {} - worker thread exiting", self.name, e);
                    return;
                }
            }
        }
    }

    fn start(&self) {
        self.gate.set_started(true);
    }

    fn stop(&self) {
        self.gate.set_started(false);
        let _ = self.ctl_tx.send(Ctl::Pause);
    }

    fn unload(&self) {
        self.gate.interrupt();
        let _ = self.ctl_tx.send(Ctl::Shutdown);
        self.prison.interrupt_all();
        let handles: Vec<_> = self.threads.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }

    /// Release a thread of this controller parked on the command's name
    pub fn post_command(&self, command: &Command) {
        self.prison.release(command);
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Owns every loaded controller
pub struct ControllerManager {
    link: Arc<dyn RadioCallback>,
    router: Arc<EventRouter>,
    shells: Vec<Arc<ControllerShell>>,
}

impl ControllerManager {
    pub fn new(link: Arc<dyn RadioCallback>, router: Arc<EventRouter>) -> Self {
        ControllerManager {
            link,
            router,
            shells: Vec::new(),
        }
    }

    /// Instantiate a controller, apply its described parameter values, and
    /// start its threads (which park until the radio starts)
    pub fn load_controller(
        &mut self,
        desc: &ControllerDescription,
        repository: &Repository,
    ) -> Result<()> {
        let mut handle = repository.create_controller(&desc.class)?;
        for param in &desc.parameters {
            handle
                .get_mut()
                .base_mut()
                .params
                .set_str(&param.name, &param.value)?;
        }
        let (shell, _queue) = ControllerShell::new(handle, Arc::clone(&self.link));
        shell.load()?;
        info!("controller {} loaded", shell.name());
        self.shells.push(shell);
        Ok(())
    }

    pub fn start_controllers(&self) {
        for shell in &self.shells {
            shell.start();
            info!("controller {} started", shell.name());
        }
    }

    pub fn stop_controllers(&self) {
        for shell in &self.shells {
            shell.stop();
            info!("controller {} stopped", shell.name());
        }
    }

    pub fn unload_controllers(&mut self) {
        self.router.clear();
        for shell in &self.shells {
            shell.unload();
            info!("controller {} unloaded", shell.name());
        }
        self.shells.clear();
    }

    /// Route a command to a controller by name
    pub fn post_command(&self, command: &Command) -> bool {
        for shell in &self.shells {
            if shell.name() == command.component_name {
                shell.post_command(command);
                return true;
            }
        }
        false
    }

    pub fn controller_count(&self) -> usize {
        self.shells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeId;

    #[test]
    fn test_router_key_fanout() {
        let router = EventRouter::default();
        let (tx1, rx1) = channel::unbounded();
        let (tx2, rx2) = channel::unbounded();
        router.subscribe("snr", "demod1", tx1);
        router.subscribe("snr", "demod2", tx2);

        router.dispatch(Event {
            name: "snr".into(),
            component_name: "demod1".into(),
            type_id: TypeId::Float32,
            data: vec![],
        });
        assert_eq!(rx1.len(), 1);
        assert!(rx2.is_empty());

        router.clear();
        assert_eq!(router.subscription_count(), 0);
        // Dispatch after clear is a silent no-op
        router.dispatch(Event {
            name: "snr".into(),
            component_name: "demod1".into(),
            type_id: TypeId::Float32,
            data: vec![],
        });
        assert_eq!(rx1.len(), 1);
    }
}
