//! Component ports

use crate::types::TypeId;

/// A named port with the element types it accepts, in preference order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub name: String,
    pub supported_types: Vec<TypeId>,
}

impl Port {
    pub fn new(name: &str, supported_types: Vec<TypeId>) -> Self {
        Port {
            name: name.to_ascii_lowercase(),
            supported_types,
        }
    }

    pub fn supports(&self, type_id: TypeId) -> bool {
        self.supported_types.contains(&type_id)
    }
}

/// The registered input and output ports of a component
#[derive(Debug, Clone, Default)]
pub struct ComponentPorts {
    inputs: Vec<Port>,
    outputs: Vec<Port>,
}

impl ComponentPorts {
    pub fn register_input(&mut self, name: &str, types: Vec<TypeId>) {
        self.inputs.push(Port::new(name, types));
    }

    pub fn register_output(&mut self, name: &str, types: Vec<TypeId>) {
        self.outputs.push(Port::new(name, types));
    }

    pub fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    pub fn input(&self, name: &str) -> Option<&Port> {
        let name = name.to_ascii_lowercase();
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&Port> {
        let name = name.to_ascii_lowercase();
        self.outputs.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ports_lower_case_names() {
        let mut ports = ComponentPorts::default();
        ports.register_input("Input1", vec![TypeId::Int32, TypeId::Float32]);
        ports.register_output("OUTPUT1", vec![TypeId::Float32]);

        let input = ports.input("input1").unwrap();
        assert!(input.supports(TypeId::Int32));
        assert!(!input.supports(TypeId::Uint64));
        assert!(ports.output("output1").is_some());
        assert!(ports.input("missing").is_none());
    }
}
