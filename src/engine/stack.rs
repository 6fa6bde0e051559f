//! Stack engine
//!
//! Hosts message-driven components. There is no engine-wide scheduler:
//! each component's shell runs one thread per input port plus a
//! reconfiguration thread, and boundary translators bridge external typed
//! buffers into the byte-message world. Internal links wire each
//! component's send tables directly to its neighbours' inboxes.

use crate::buffer::any::AnyBuffer;
use crate::component::events::EventSink;
use crate::component::stack::StackShell;
use crate::engine::translator::{InTranslator, OutTranslator};
use crate::error::{RadioError, Result};
use crate::plugin::repository::Repository;
use crate::radio::descriptors::{EngineDescription, LinkDescription};
use crate::radio::reconfig::{Command, ReconfigSet};
use crate::types::TypeId;
use log::{error, info};
use std::sync::Arc;

/// The per-port message-loop engine
pub struct StackEngine {
    name: String,
    shells: Vec<Arc<StackShell>>,
    in_translators: Vec<InTranslator>,
    out_translators: Vec<OutTranslator>,
    external_inputs: Vec<AnyBuffer>,
    external_outputs: Vec<AnyBuffer>,
}

impl StackEngine {
    pub fn new(name: &str) -> Self {
        StackEngine {
            name: name.to_ascii_lowercase(),
            shells: Vec::new(),
            in_translators: Vec::new(),
            out_translators: Vec::new(),
            external_inputs: Vec::new(),
            external_outputs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn find_shell(&self, name: &str) -> Option<&Arc<StackShell>> {
        self.shells.iter().find(|s| s.name() == name)
    }

    /// Shared handles to the component shells, for command and
    /// reconfiguration routing
    pub fn shells(&self) -> Vec<Arc<StackShell>> {
        self.shells.clone()
    }

    /// Create components and wire links and translators. Returns the
    /// external output buffers for downstream engines.
    pub fn load(
        &mut self,
        desc: &EngineDescription,
        inputs: Vec<AnyBuffer>,
        repository: &Repository,
        events: Arc<dyn EventSink>,
    ) -> Result<Vec<AnyBuffer>> {
        self.external_inputs = inputs;

        for comp in &desc.components {
            let handle = repository.create_stack(&comp.class, &comp.name)?;
            let shell = Arc::new(StackShell::new(handle));
            for param in &comp.parameters {
                shell.set_parameter_str(&param.name, &param.value)?;
            }
            shell.set_event_sink(Arc::clone(&events));
            self.shells.push(shell);
        }

        for link in &desc.links {
            if link.is_external() {
                self.create_external_link(link)?;
            } else {
                self.create_internal_link(link)?;
            }
        }

        info!(
            "engine {} loaded {} component(s), {} translator(s)",
            self.name,
            self.shells.len(),
            self.in_translators.len() + self.out_translators.len()
        );
        Ok(self.external_outputs.clone())
    }

    /// Internal link: the source sends down into the sink's inbox, the
    /// sink sends up into the source's inbox
    fn create_internal_link(&mut self, link: &LinkDescription) -> Result<()> {
        let above = self.find_shell(&link.source_component).ok_or_else(|| {
            RadioError::ResourceNotFound(format!(
                "could not find stack component {} specified in link",
                link.source_component
            ))
        })?;
        let below = self.find_shell(&link.sink_component).ok_or_else(|| {
            RadioError::ResourceNotFound(format!(
                "could not find stack component {} specified in link",
                link.sink_component
            ))
        })?;
        above.add_buffer_below(&link.source_port, &link.sink_port, below.inbox(&link.sink_port)?);
        below.add_buffer_above(&link.sink_port, &link.source_port, above.inbox(&link.source_port)?);
        Ok(())
    }

    fn create_external_link(&mut self, link: &LinkDescription) -> Result<()> {
        if link.sink_engine == self.name {
            // Incoming: an in-translator feeds the sink component's inbox
            let shell = self.find_shell(&link.sink_component).ok_or_else(|| {
                RadioError::ResourceNotFound(format!(
                    "could not find stack component {} specified in link",
                    link.sink_component
                ))
            })?;
            let buffer = self
                .external_inputs
                .iter()
                .find(|b| b.link() == *link)
                .ok_or_else(|| {
                    RadioError::ResourceNotFound(format!(
                        "no external buffer delivered for link {}",
                        link
                    ))
                })?;
            let translator =
                InTranslator::new(buffer, shell.inbox(&link.sink_port)?, &link.sink_port)?;
            self.in_translators.push(translator);
        } else {
            // Outgoing: the source component sends down into an
            // out-translator that fills a fresh u8 buffer
            let shell = self.find_shell(&link.source_component).ok_or_else(|| {
                RadioError::ResourceNotFound(format!(
                    "could not find stack component {} specified in link",
                    link.source_component
                ))
            })?;
            let buffer = AnyBuffer::create(TypeId::Uint8)?;
            buffer.set_link(link.clone());
            let translator = OutTranslator::new(&buffer)?;
            shell.add_buffer_below(&link.source_port, &link.sink_port, translator.buffer());
            self.external_outputs.push(buffer);
            self.out_translators.push(translator);
        }
        Ok(())
    }

    /// Start translators first, then every component's threads
    pub fn start(&mut self) -> Result<()> {
        for translator in &mut self.in_translators {
            translator.start();
        }
        for translator in &mut self.out_translators {
            translator.start();
        }
        for shell in &self.shells {
            shell.start()?;
        }
        Ok(())
    }

    /// Stop translators and components, joining every thread
    pub fn stop(&mut self) -> Result<()> {
        for translator in &mut self.in_translators {
            translator.stop();
        }
        for translator in &mut self.out_translators {
            translator.stop();
        }
        for shell in &self.shells {
            shell.stop()?;
        }
        Ok(())
    }

    pub fn unload(&mut self) {
        self.in_translators.clear();
        self.out_translators.clear();
        self.shells.clear();
        self.external_inputs.clear();
        self.external_outputs.clear();
    }

    /// Hand each reconfiguration to its component's mailbox
    pub fn add_reconfiguration(&self, set: ReconfigSet) {
        for reconfig in set.params {
            match self.find_shell(&reconfig.component_name) {
                Some(shell) => shell.add_reconfiguration(reconfig),
                None => error!(
                    "parametric reconfiguration failed: could not find component {}",
                    reconfig.component_name
                ),
            }
        }
    }

    /// Release any thread parked on the command's name in the target
    /// component
    pub fn post_command(&self, command: &Command) {
        match self.find_shell(&command.component_name) {
            Some(shell) => shell.post_command(command),
            None => error!(
                "posting command {} failed: could not find component {}",
                command.name, command.component_name
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::mock::{Probe, StackReflector};
    use crate::radio::descriptors::ComponentDescription;
    use std::time::{Duration, Instant};

    struct NullSink;

    impl EventSink for NullSink {
        fn activate_event(&self, _event: crate::component::events::Event) {}
    }

    fn reflect_desc() -> EngineDescription {
        let mut desc = EngineDescription {
            name: "stackengine1".into(),
            class: "stackengine".into(),
            components: vec![ComponentDescription {
                name: "mac".into(),
                class: "mockstackreflect".into(),
                engine_name: "stackengine1".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        desc.links.push(LinkDescription {
            source_engine: "phyengine1".into(),
            sink_engine: "stackengine1".into(),
            source_component: "rx".into(),
            sink_component: "mac".into(),
            source_port: "output1".into(),
            sink_port: "bottomport1".into(),
        });
        desc.links.push(LinkDescription {
            source_engine: "stackengine1".into(),
            sink_engine: "phyengine1".into(),
            source_component: "mac".into(),
            sink_component: "tx".into(),
            source_port: "bottomport1".into(),
            sink_port: "input1".into(),
        });
        desc
    }

    #[test]
    fn test_round_trip_through_translators() {
        let probe = Probe::shared();
        let mut repo = Repository::new();
        {
            let probe = Arc::clone(&probe);
            repo.register_builtin_stack("mockstackreflect", move |name| {
                Box::new(StackReflector::with_probe(name, Arc::clone(&probe)))
            });
        }

        let desc = reflect_desc();
        let input = AnyBuffer::create(TypeId::Uint8).unwrap();
        input.set_link(desc.links[0].clone());

        let mut engine = StackEngine::new("stackengine1");
        let outputs = engine
            .load(&desc, vec![input.clone()], &repo, Arc::new(NullSink))
            .unwrap();
        assert_eq!(outputs.len(), 1);
        engine.start().unwrap();

        // Feed a frame in from the phy side; the reflector bounces it
        // back down through the out-translator
        {
            let typed = input.typed::<u8>().unwrap();
            let mut w = typed.acquire_write(2).unwrap();
            w.data.copy_from_slice(&[42, 43]);
        }
        let out = outputs[0].typed::<u8>().unwrap();
        let read = out.acquire_read().unwrap();
        assert_eq!(read.data.as_slice(), &[42, 43]);
        drop(read);
        assert_eq!(probe.set_count(), 1);

        let begin = Instant::now();
        engine.stop().unwrap();
        assert!(begin.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_non_u8_external_link_refused() {
        let mut repo = Repository::new();
        repo.register_builtin_stack("mockstackreflect", |name| {
            Box::new(StackReflector::new(name))
        });
        let desc = reflect_desc();
        let input = AnyBuffer::create(TypeId::Int16).unwrap();
        input.set_link(desc.links[0].clone());

        let mut engine = StackEngine::new("stackengine1");
        assert!(matches!(
            engine.load(&desc, vec![input], &repo, Arc::new(NullSink)),
            Err(RadioError::InvalidDataType(_))
        ));
    }
}
