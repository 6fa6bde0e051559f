//! Lifecycle facade
//!
//! The launcher-facing entry point: a three-state machine
//! (Unloaded ⇄ Loaded ⇄ Running) over the engine manager. Illegal
//! transitions are rejected with a logged warning and a `false` return;
//! `reconfigure` from Unloaded falls back to loading the description.

use crate::engine::manager::EngineManager;
use crate::error::Result;
use crate::logging;
use crate::plugin::repository::{RepositoryKind, RepositorySet};
use crate::radio::reconfig::{compare_radios, Command, ReconfigSet};
use crate::radio::xml;
use log::{error, info, warn};
use std::path::Path;

/// Radio lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RadioStatus {
    Unloaded,
    Loaded,
    Running,
}

/// The radio system: repositories, the engine manager and the lifecycle
/// state machine
pub struct System {
    status: RadioStatus,
    manager: EngineManager,
}

impl System {
    /// Create a system and install the process-wide logger
    pub fn new() -> Self {
        logging::init();
        System {
            status: RadioStatus::Unloaded,
            manager: EngineManager::new(RepositorySet::new()),
        }
    }

    /// Add a `;`-separated path list to one of the repositories. Paths
    /// that do not exist are rejected.
    pub fn set_repository(&mut self, kind: RepositoryKind, paths: &str) -> Result<()> {
        self.manager
            .repositories_mut()
            .get_mut(kind)
            .add_paths(paths)
    }

    /// Direct access to the repositories, e.g. to register builtin
    /// component factories
    pub fn repositories_mut(&mut self) -> &mut RepositorySet {
        self.manager.repositories_mut()
    }

    /// Set the logging threshold from a level name, case-insensitively;
    /// unknown names warn and fall back to info
    pub fn set_log_level(&mut self, level: &str) {
        logging::set_level_str(level);
    }

    /// Parse a radio description and load it. Only legal from Unloaded.
    pub fn load_radio(&mut self, xml_path: &Path) -> bool {
        match self.status {
            RadioStatus::Unloaded => {
                info!("loading radio: {}", xml_path.display());
                let loaded = xml::parse_file(xml_path)
                    .and_then(|rep| self.manager.load_radio(rep));
                match loaded {
                    Ok(()) => {
                        self.status = RadioStatus::Loaded;
                        true
                    }
                    Err(e) => {
                        error!("error loading radio: {}", e);
                        false
                    }
                }
            }
            _ => {
                warn!("a radio is already loaded");
                false
            }
        }
    }

    /// Start the loaded radio. Only legal from Loaded.
    pub fn start_radio(&mut self) -> bool {
        match self.status {
            RadioStatus::Unloaded => {
                warn!("there is no radio loaded");
                false
            }
            RadioStatus::Loaded => {
                info!("starting radio");
                match self.manager.start_radio() {
                    Ok(()) => {
                        self.status = RadioStatus::Running;
                        true
                    }
                    Err(e) => {
                        error!("error starting radio: {}", e);
                        false
                    }
                }
            }
            RadioStatus::Running => {
                warn!("the radio is already started");
                false
            }
        }
    }

    /// Stop the running radio. Only legal from Running.
    pub fn stop_radio(&mut self) -> bool {
        match self.status {
            RadioStatus::Unloaded => {
                warn!("there is no radio loaded");
                false
            }
            RadioStatus::Loaded => {
                warn!("the radio is not running");
                false
            }
            RadioStatus::Running => {
                info!("stopping radio");
                match self.manager.stop_radio() {
                    Ok(()) => {
                        self.status = RadioStatus::Loaded;
                        true
                    }
                    Err(e) => {
                        error!("error stopping radio: {}", e);
                        false
                    }
                }
            }
        }
    }

    /// Unload the stopped radio. Only legal from Loaded.
    pub fn unload_radio(&mut self) -> bool {
        match self.status {
            RadioStatus::Loaded => {
                info!("unloading radio");
                self.manager.unload_radio();
                self.status = RadioStatus::Unloaded;
                true
            }
            RadioStatus::Unloaded => {
                warn!("there is no radio loaded");
                false
            }
            RadioStatus::Running => {
                warn!("the radio has not been stopped");
                false
            }
        }
    }

    /// Reconfigure the radio towards a new description. From Unloaded
    /// this falls back to a plain load.
    pub fn reconfigure_radio(&mut self, xml_path: &Path) -> bool {
        match self.status {
            RadioStatus::Unloaded => {
                warn!("no radio has been loaded - loading new configuration");
                self.load_radio(xml_path)
            }
            _ => {
                info!("reconfiguring radio: {}", xml_path.display());
                let result = xml::parse_file(xml_path).map(|target| {
                    let Some(current) = self.manager.current_radio() else {
                        return ReconfigSet::default();
                    };
                    compare_radios(&current, &target)
                });
                match result {
                    Ok(set) => {
                        info!("applying {} parametric reconfiguration(s)", set.params.len());
                        self.manager.reconfigure_radio(set);
                        true
                    }
                    Err(e) => {
                        error!("error reconfiguring radio: {}", e);
                        false
                    }
                }
            }
        }
    }

    /// Route a command into the running radio
    pub fn post_command(&self, command: Command) {
        self.manager.post_command(command);
    }

    /// Current string value of a component parameter
    pub fn parameter_value(&self, param_name: &str, component_name: &str) -> String {
        self.manager.parameter_value(param_name, component_name)
    }

    pub fn is_loaded(&self) -> bool {
        self.status == RadioStatus::Loaded
    }

    pub fn is_running(&self) -> bool {
        self.status == RadioStatus::Running
    }

    /// Suspension is not implemented; kept for interface compatibility
    pub fn is_suspended(&self) -> bool {
        false
    }
}

impl Default for System {
    fn default() -> Self {
        System::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_transitions_return_false() {
        let mut system = System::new();
        assert!(!system.start_radio());
        assert!(!system.stop_radio());
        assert!(!system.unload_radio());
        assert!(!system.is_loaded());
        assert!(!system.is_running());
        assert!(!system.is_suspended());
    }

    #[test]
    fn test_load_missing_file_fails_cleanly() {
        let mut system = System::new();
        assert!(!system.load_radio(Path::new("/no/such/radio.xml")));
        assert!(!system.is_loaded());
    }

    #[test]
    fn test_bad_repository_path_rejected() {
        let mut system = System::new();
        assert!(system
            .set_repository(RepositoryKind::Phy, "/no/such/dir")
            .is_err());
    }
}
