//! Named rendezvous
//!
//! A table on which threads park keyed by a command name. `trap` enqueues
//! the calling thread under a name and blocks; `release` wakes every waiter
//! parked under the released command's name, handing each its own copy of
//! the command. Stack components and controllers use this to wait for
//! commands issued by controllers.

use crate::error::{RadioError, Result};
use crate::radio::reconfig::Command;
use std::sync::{Arc, Condvar, Mutex};

struct CageState {
    command: Option<Command>,
    interrupted: bool,
}

/// Holds one parked thread until a command (or shutdown) arrives
struct Cage {
    state: Mutex<CageState>,
    cond: Condvar,
}

impl Cage {
    fn new() -> Self {
        Cage {
            state: Mutex::new(CageState {
                command: None,
                interrupted: false,
            }),
            cond: Condvar::new(),
        }
    }

    fn wait(&self) -> Result<Command> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.interrupted {
                return Err(RadioError::Interrupted);
            }
            if let Some(cmd) = state.command.take() {
                return Ok(cmd);
            }
            state = self.cond.wait(state).unwrap();
        }
    }

    fn release(&self, command: Command) {
        let mut state = self.state.lock().unwrap();
        state.command = Some(command);
        drop(state);
        self.cond.notify_one();
    }

    fn interrupt(&self) {
        self.state.lock().unwrap().interrupted = true;
        self.cond.notify_one();
    }
}

/// A table of threads parked by command name
#[derive(Default)]
pub struct NamedRendezvous {
    // Multimap: several threads may park under the same name
    cages: Mutex<Vec<(String, Arc<Cage>)>>,
}

impl std::fmt::Debug for NamedRendezvous {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NamedRendezvous({} parked)", self.len())
    }
}

impl NamedRendezvous {
    pub fn new() -> Self {
        NamedRendezvous::default()
    }

    /// Park the calling thread under `name` until a matching command is
    /// released. Registration and blocking are atomic with respect to
    /// `release`: a release issued after `trap` begins is never missed.
    pub fn trap(&self, name: &str) -> Result<Command> {
        let cage = Arc::new(Cage::new());
        {
            let mut cages = self.cages.lock().unwrap();
            cages.push((name.to_ascii_lowercase(), Arc::clone(&cage)));
        }
        cage.wait()
    }

    /// Wake every thread parked under the command's name, delivering the
    /// command by value to each. Releasing a name nobody waits on is a
    /// no-op.
    pub fn release(&self, command: &Command) {
        let mut waiters = Vec::new();
        {
            let mut cages = self.cages.lock().unwrap();
            let mut i = 0;
            while i < cages.len() {
                if cages[i].0 == command.name {
                    waiters.push(cages.swap_remove(i).1);
                } else {
                    i += 1;
                }
            }
        }
        for cage in waiters {
            cage.release(command.clone());
        }
    }

    /// Number of threads currently parked
    pub fn len(&self) -> usize {
        self.cages.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wake every parked thread with `Interrupted` (shutdown path)
    pub fn interrupt_all(&self) {
        let drained: Vec<_> = self.cages.lock().unwrap().drain(..).collect();
        for (_, cage) in drained {
            cage.interrupt();
        }
    }
}
