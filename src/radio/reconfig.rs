//! Reconfiguration and command messages
//!
//! A `ReconfigSet` is a batch of parametric mutations delivered to engines
//! between process steps. A `Command` is a named message routed to a
//! component (or controller), releasing any thread parked on the name.

use crate::radio::descriptors::canonical;
use crate::radio::representation::RadioRepresentation;
use crate::types::value::Value;

/// One parameter mutation targeting a component in an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParametricReconfig {
    pub engine_name: String,
    pub component_name: String,
    pub parameter_name: String,
    pub parameter_value: String,
}

/// A batch of parametric reconfigurations applied atomically between
/// process steps
#[derive(Debug, Clone, Default)]
pub struct ReconfigSet {
    pub params: Vec<ParametricReconfig>,
}

impl ReconfigSet {
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// The subset of reconfigurations targeting one engine
    pub fn for_engine(&self, engine_name: &str) -> ReconfigSet {
        let engine_name = canonical(engine_name);
        ReconfigSet {
            params: self
                .params
                .iter()
                .filter(|p| p.engine_name == engine_name)
                .cloned()
                .collect(),
        }
    }
}

/// A named command message
#[derive(Debug, Clone, Default)]
pub struct Command {
    pub name: String,
    pub component_name: String,
    pub engine_name: String,
    pub data: Vec<Value>,
}

impl Command {
    pub fn new(name: &str, component_name: &str, engine_name: &str) -> Self {
        Command {
            name: canonical(name),
            component_name: canonical(component_name),
            engine_name: canonical(engine_name),
            data: Vec::new(),
        }
    }
}

/// Compute the parametric reconfiguration set that turns `current` into
/// `target`.
///
/// Engines are matched by name and class, components by name, class and
/// engine, parameters by name. Anything present on only one side is ignored
/// here; structural differences are not this function's business.
pub fn compare_radios(current: &RadioRepresentation, target: &RadioRepresentation) -> ReconfigSet {
    let mut set = ReconfigSet::default();
    let current_engines = current.engines();
    let target_engines = target.engines();

    for eng in &current_engines {
        let Some(other_eng) = target_engines.iter().find(|e| *e == eng) else {
            continue;
        };
        for comp in &eng.components {
            let Some(other_comp) = other_eng.components.iter().find(|c| *c == comp) else {
                continue;
            };
            for param in &comp.parameters {
                let Some(other_param) = other_comp
                    .parameters
                    .iter()
                    .find(|p| p.name == param.name)
                else {
                    continue;
                };
                if param.value != other_param.value {
                    set.params.push(ParametricReconfig {
                        engine_name: comp.engine_name.clone(),
                        component_name: comp.name.clone(),
                        parameter_name: param.name.clone(),
                        parameter_value: other_param.value.clone(),
                    });
                }
            }
        }
    }
    set
}
