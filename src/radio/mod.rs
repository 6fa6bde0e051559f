//! The radio model
//!
//! Descriptions of components, engines, links and controllers; the radio
//! representation holding them with its graphs; XML ingest; and the
//! reconfiguration machinery.

pub mod descriptors;
pub mod reconfig;
pub mod representation;
pub mod xml;

pub use descriptors::{
    ComponentDescription, ControllerDescription, EngineDescription, EngineKind, LinkDescription,
    ParameterDescription, PortDescription, PortKind,
};
pub use reconfig::{compare_radios, Command, ParametricReconfig, ReconfigSet};
pub use representation::RadioRepresentation;
