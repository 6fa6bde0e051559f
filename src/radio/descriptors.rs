//! Descriptions of the parts of a radio
//!
//! These are the plain-data records produced by XML ingest and carried by
//! the radio representation and its graphs. All names are stored lower-case;
//! ingest and the registration APIs canonicalize at the edges.

use petgraph::graph::DiGraph;

/// Lower-case canonical form used for every name in the system
pub fn canonical(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// A named parameter value, as written in the radio description
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParameterDescription {
    pub name: String,
    pub value: String,
}

/// Direction of a described port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Input,
    Output,
}

/// A named port on a described component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescription {
    pub name: String,
    pub kind: PortKind,
}

/// A component instance within an engine.
///
/// Equality compares the identity fields (name, class, engine) only, which
/// is what matching between two radio descriptions needs.
#[derive(Debug, Clone, Default)]
pub struct ComponentDescription {
    pub name: String,
    pub class: String,
    pub engine_name: String,
    pub parameters: Vec<ParameterDescription>,
    pub ports: Vec<PortDescription>,
}

impl PartialEq for ComponentDescription {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.class == other.class
            && self.engine_name == other.engine_name
    }
}

impl ComponentDescription {
    pub fn parameter_value(&self, name: &str) -> Option<&str> {
        let name = canonical(name);
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

/// A directed link between two ports.
///
/// Engine names are filled in while graphs are built; a link is external
/// iff the two engine names differ. Equality compares the four endpoint
/// fields only.
#[derive(Debug, Clone, Default)]
pub struct LinkDescription {
    pub source_engine: String,
    pub sink_engine: String,
    pub source_component: String,
    pub sink_component: String,
    pub source_port: String,
    pub sink_port: String,
}

impl PartialEq for LinkDescription {
    fn eq(&self, other: &Self) -> bool {
        self.source_component == other.source_component
            && self.sink_component == other.sink_component
            && self.source_port == other.source_port
            && self.sink_port == other.sink_port
    }
}

impl LinkDescription {
    /// A link crosses an engine boundary iff its endpoint engines differ
    pub fn is_external(&self) -> bool {
        self.source_engine != self.sink_engine
    }

    /// Whether another link starts at the same component port
    pub fn same_source(&self, other: &LinkDescription) -> bool {
        self.source_component == other.source_component && self.source_port == other.source_port
    }
}

impl std::fmt::Display for LinkDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.source_component, self.source_port, self.sink_component, self.sink_port
        )
    }
}

/// The two engine kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Phy,
    Stack,
}

impl EngineKind {
    /// Parse the engine class string used in radio descriptions
    pub fn parse(class: &str) -> Option<EngineKind> {
        match class {
            "phyengine" => Some(EngineKind::Phy),
            "stackengine" => Some(EngineKind::Stack),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Phy => "phyengine",
            EngineKind::Stack => "stackengine",
        }
    }
}

/// The internal graph of an engine: its components and internal links
pub type EngineGraph = DiGraph<ComponentDescription, LinkDescription>;

/// An engine with its components, links and internal graph.
///
/// Equality compares name and class only.
#[derive(Debug, Clone, Default)]
pub struct EngineDescription {
    pub name: String,
    pub class: String,
    pub components: Vec<ComponentDescription>,
    /// Internal links, plus any external link touching this engine (added
    /// for discoverability when graphs are built)
    pub links: Vec<LinkDescription>,
    /// Built by `RadioRepresentation::build_graphs`
    pub graph: EngineGraph,
}

impl PartialEq for EngineDescription {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.class == other.class
    }
}

impl EngineDescription {
    pub fn kind(&self) -> Option<EngineKind> {
        EngineKind::parse(&self.class)
    }
}

/// A controller plug-in and its parameter values
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControllerDescription {
    pub class: String,
    pub parameters: Vec<ParameterDescription>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_equality_ignores_engines() {
        let mut a = LinkDescription {
            source_component: "src".into(),
            sink_component: "snk".into(),
            source_port: "output1".into(),
            sink_port: "input1".into(),
            ..Default::default()
        };
        let b = a.clone();
        a.source_engine = "phyengine1".into();
        a.sink_engine = "phyengine2".into();
        assert_eq!(a, b);
        assert!(a.is_external());
        assert!(!b.is_external());
    }

    #[test]
    fn test_component_equality_is_identity_only() {
        let mut a = ComponentDescription {
            name: "src1".into(),
            class: "source".into(),
            engine_name: "phyengine1".into(),
            ..Default::default()
        };
        let mut b = a.clone();
        b.parameters.push(ParameterDescription {
            name: "rate".into(),
            value: "9".into(),
        });
        assert_eq!(a, b);
        a.engine_name = "phyengine2".into();
        assert_ne!(a, b);
    }

    #[test]
    fn test_engine_kind_parse() {
        assert_eq!(EngineKind::parse("phyengine"), Some(EngineKind::Phy));
        assert_eq!(EngineKind::parse("stackengine"), Some(EngineKind::Stack));
        assert_eq!(EngineKind::parse("fpgaengine"), None);
    }

    #[test]
    fn test_canonical_lower_cases_and_trims() {
        assert_eq!(canonical(" SrC1 "), "src1");
    }
}
