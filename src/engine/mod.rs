//! Engines
//!
//! An engine is an execution container hosting components. The two kinds
//! are a closed set: the data-flow [`PhyEngine`](phy::PhyEngine) and the
//! message-loop [`StackEngine`](stack::StackEngine).

pub mod manager;
pub mod phy;
pub mod stack;
pub mod translator;

use crate::buffer::any::AnyBuffer;
use crate::component::events::EventSink;
use crate::error::{RadioError, Result};
use crate::plugin::repository::RepositorySet;
use crate::radio::descriptors::{EngineDescription, EngineKind};
use crate::radio::reconfig::{Command, ReconfigSet};
use std::sync::Arc;

/// One running engine of either kind
pub enum Engine {
    Phy(phy::PhyEngine),
    Stack(stack::StackEngine),
}

impl Engine {
    /// Instantiate an engine from its description
    pub fn create(desc: &EngineDescription) -> Result<Engine> {
        match desc.kind() {
            Some(EngineKind::Phy) => Ok(Engine::Phy(phy::PhyEngine::new(&desc.name))),
            Some(EngineKind::Stack) => Ok(Engine::Stack(stack::StackEngine::new(&desc.name))),
            None => Err(RadioError::ResourceNotFound(format!(
                "engine type \"{}\" does not exist",
                desc.class
            ))),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Engine::Phy(e) => e.name(),
            Engine::Stack(e) => e.name(),
        }
    }

    /// Build the engine from its description and incoming external
    /// buffers; returns its outgoing external buffers
    pub fn load(
        &mut self,
        desc: &EngineDescription,
        inputs: Vec<AnyBuffer>,
        repositories: &RepositorySet,
        events: Arc<dyn EventSink>,
    ) -> Result<Vec<AnyBuffer>> {
        match self {
            Engine::Phy(e) => e.load(desc, inputs, &repositories.phy, events),
            Engine::Stack(e) => e.load(desc, inputs, &repositories.stack, events),
        }
    }

    pub fn start(&mut self) -> Result<()> {
        match self {
            Engine::Phy(e) => e.start(),
            Engine::Stack(e) => e.start(),
        }
    }

    pub fn stop(&mut self) -> Result<()> {
        match self {
            Engine::Phy(e) => e.stop(),
            Engine::Stack(e) => e.stop(),
        }
    }

    pub fn unload(&mut self) {
        match self {
            Engine::Phy(e) => e.unload(),
            Engine::Stack(e) => e.unload(),
        }
    }

    /// Deliver a reconfiguration slice; applied between process steps
    pub fn add_reconfiguration(&self, set: ReconfigSet) {
        match self {
            Engine::Phy(e) => e.add_reconfiguration(set),
            Engine::Stack(e) => e.add_reconfiguration(set),
        }
    }

    /// Route a command to the owning component
    pub fn post_command(&self, command: &Command) {
        match self {
            Engine::Phy(e) => e.post_command(command),
            Engine::Stack(e) => e.post_command(command),
        }
    }
}
