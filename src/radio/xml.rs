//! Radio description ingest
//!
//! Parses the XML radio grammar into a built [`RadioRepresentation`]:
//!
//! ```text
//! <softwareradio>
//!   <controller class="Name"> <parameter name="K" value="V"/>* </controller>*
//!   <engine name="N" class="phyengine|stackengine">
//!     <component name="N" class="Type">
//!       <parameter name="K" value="V"/>*
//!       <port name="N" class="input|output"/>*
//!     </component>+
//!   </engine>+
//!   <link source="comp.port" sink="comp.port"/>*
//! </softwareradio>
//! ```
//!
//! Attribute names are case-sensitive; values are lower-cased on ingest.
//! Links accept `above`/`below` as fallbacks for `source`/`sink`, checked
//! in that order. Unknown elements fail the parse.

use crate::error::{RadioError, Result};
use crate::radio::descriptors::{
    ComponentDescription, ControllerDescription, EngineDescription, LinkDescription,
    ParameterDescription, PortDescription, PortKind, canonical,
};
use crate::radio::representation::RadioRepresentation;
use log::{debug, info};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

fn xml_err(e: impl std::fmt::Display) -> RadioError {
    RadioError::XmlParsing(e.to_string())
}

fn attr(element: &BytesStart, name: &str) -> Result<Option<String>> {
    for a in element.attributes() {
        let a = a.map_err(xml_err)?;
        if a.key.as_ref() == name.as_bytes() {
            let value = a.unescape_value().map_err(xml_err)?;
            return Ok(Some(canonical(&value)));
        }
    }
    Ok(None)
}

fn required_attr(element: &BytesStart, name: &str) -> Result<String> {
    attr(element, name)?.ok_or_else(|| {
        xml_err(format!(
            "element <{}> is missing attribute '{}'",
            String::from_utf8_lossy(element.name().as_ref()),
            name
        ))
    })
}

fn element_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.name().as_ref()).into_owned()
}

/// Parse a radio description file and build its graphs
pub fn parse_file(path: &Path) -> Result<RadioRepresentation> {
    let xml = std::fs::read_to_string(path)
        .map_err(|e| RadioError::XmlParsing(format!("{}: {}", path.display(), e)))?;
    parse_str(&xml)
}

/// Parse a radio description from a string and build its graphs
pub fn parse_str(xml: &str) -> Result<RadioRepresentation> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let rep = RadioRepresentation::new();
    let mut saw_root = false;

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) if element_name(&e) == "softwareradio" => {
                saw_root = true;
                parse_radio(&mut reader, &rep)?;
            }
            Event::Start(e) | Event::Empty(e) => {
                return Err(xml_err(format!("illegal element: {}", element_name(&e))));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !saw_root {
        return Err(xml_err("missing <softwareradio> root element"));
    }
    rep.build_graphs()?;
    Ok(rep)
}

fn parse_radio(reader: &mut Reader<&[u8]>, rep: &RadioRepresentation) -> Result<()> {
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) => match element_name(&e).as_str() {
                "controller" => rep.add_controller_description(parse_controller(reader, &e)?),
                "engine" => rep.add_engine_description(parse_engine(reader, &e)?),
                "link" => {
                    let link = read_link(&e)?;
                    skip_children(reader, "link")?;
                    rep.add_link_description(link);
                }
                other => return Err(xml_err(format!("illegal element: {}", other))),
            },
            Event::Empty(e) => match element_name(&e).as_str() {
                "controller" => rep.add_controller_description(ControllerDescription {
                    class: required_attr(&e, "class")?,
                    parameters: Vec::new(),
                }),
                "link" => rep.add_link_description(read_link(&e)?),
                other => return Err(xml_err(format!("illegal element: {}", other))),
            },
            Event::End(e) if e.name().as_ref() == b"softwareradio" => return Ok(()),
            Event::Eof => return Err(xml_err("unexpected end of file")),
            _ => {}
        }
    }
}

fn parse_controller(
    reader: &mut Reader<&[u8]>,
    element: &BytesStart,
) -> Result<ControllerDescription> {
    let mut controller = ControllerDescription {
        class: required_attr(element, "class")?,
        parameters: Vec::new(),
    };
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Empty(e) | Event::Start(e) => match element_name(&e).as_str() {
                "parameter" => {
                    controller.parameters.push(read_parameter(&e)?);
                }
                other => return Err(xml_err(format!("illegal element: {}", other))),
            },
            Event::End(e) if e.name().as_ref() == b"controller" => break,
            Event::End(_) => {}
            Event::Eof => return Err(xml_err("unexpected end of file")),
            _ => {}
        }
    }
    info!("parsed controller: {}", controller.class);
    Ok(controller)
}

fn parse_engine(reader: &mut Reader<&[u8]>, element: &BytesStart) -> Result<EngineDescription> {
    let mut engine = EngineDescription {
        name: required_attr(element, "name")?,
        class: required_attr(element, "class")?,
        ..Default::default()
    };
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) if element_name(&e) == "component" => {
                let mut comp = parse_component(reader, &e)?;
                comp.engine_name = engine.name.clone();
                engine.components.push(comp);
            }
            Event::Empty(e) if element_name(&e) == "component" => {
                engine.components.push(ComponentDescription {
                    name: required_attr(&e, "name")?,
                    class: required_attr(&e, "class")?,
                    engine_name: engine.name.clone(),
                    ..Default::default()
                });
            }
            Event::Start(e) | Event::Empty(e) => {
                return Err(xml_err(format!("illegal element: {}", element_name(&e))));
            }
            Event::End(e) if e.name().as_ref() == b"engine" => break,
            Event::Eof => return Err(xml_err("unexpected end of file")),
            _ => {}
        }
    }
    info!("parsed engine: {}", engine.name);
    Ok(engine)
}

fn parse_component(
    reader: &mut Reader<&[u8]>,
    element: &BytesStart,
) -> Result<ComponentDescription> {
    let mut comp = ComponentDescription {
        name: required_attr(element, "name")?,
        class: required_attr(element, "class")?,
        ..Default::default()
    };
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Empty(e) | Event::Start(e) => match element_name(&e).as_str() {
                "parameter" => comp.parameters.push(read_parameter(&e)?),
                "port" => {
                    let kind = match required_attr(&e, "class")?.as_str() {
                        "input" => PortKind::Input,
                        "output" => PortKind::Output,
                        other => {
                            return Err(xml_err(format!("unknown port class: {}", other)));
                        }
                    };
                    comp.ports.push(PortDescription {
                        name: required_attr(&e, "name")?,
                        kind,
                    });
                }
                other => return Err(xml_err(format!("illegal element: {}", other))),
            },
            Event::End(e) if e.name().as_ref() == b"component" => break,
            Event::Eof => return Err(xml_err("unexpected end of file")),
            _ => {}
        }
    }
    debug!("parsed component: {}", comp.name);
    Ok(comp)
}

fn read_parameter(element: &BytesStart) -> Result<ParameterDescription> {
    Ok(ParameterDescription {
        name: required_attr(element, "name")?,
        value: required_attr(element, "value")?,
    })
}

fn read_link(element: &BytesStart) -> Result<LinkDescription> {
    // sink/source first, then the below/above synonyms
    let sink = match attr(element, "sink")? {
        Some(s) => s,
        None => required_attr(element, "below")?,
    };
    let source = match attr(element, "source")? {
        Some(s) => s,
        None => required_attr(element, "above")?,
    };

    let (source_component, source_port) = source
        .split_once('.')
        .ok_or_else(|| xml_err(format!("malformed link endpoint: {}", source)))?;
    let (sink_component, sink_port) = sink
        .split_once('.')
        .ok_or_else(|| xml_err(format!("malformed link endpoint: {}", sink)))?;

    let link = LinkDescription {
        source_component: source_component.to_string(),
        source_port: source_port.to_string(),
        sink_component: sink_component.to_string(),
        sink_port: sink_port.to_string(),
        ..Default::default()
    };
    info!("parsed link: {}", link);
    Ok(link)
}

fn skip_children(reader: &mut Reader<&[u8]>, parent: &str) -> Result<()> {
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) | Event::Empty(e) => {
                return Err(xml_err(format!("illegal element: {}", element_name(&e))));
            }
            Event::End(e) if e.name().as_ref() == parent.as_bytes() => return Ok(()),
            Event::Eof => return Err(xml_err("unexpected end of file")),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RADIO: &str = r#"
        <softwareradio>
          <controller class="Probe">
            <parameter name="Threshold" value="5"/>
          </controller>
          <engine name="PhyEngine1" class="phyengine">
            <component name="Src1" class="MockSource">
              <parameter name="Count" value="10"/>
              <port name="Output1" class="output"/>
            </component>
            <component name="Snk1" class="MockSink">
              <port name="Input1" class="input"/>
            </component>
          </engine>
          <link source="Src1.Output1" sink="Snk1.Input1"/>
        </softwareradio>
    "#;

    #[test]
    fn test_parse_lowercases_values() {
        let rep = parse_str(RADIO).unwrap();
        let engines = rep.engines();
        assert_eq!(engines.len(), 1);
        assert_eq!(engines[0].name, "phyengine1");
        assert_eq!(engines[0].components[0].name, "src1");
        assert_eq!(engines[0].components[0].class, "mocksource");
        assert_eq!(engines[0].components[0].parameters[0].name, "count");
        let controllers = rep.controllers();
        assert_eq!(controllers[0].class, "probe");
        assert_eq!(controllers[0].parameters[0].value, "5");
        assert!(rep.is_built());
    }

    #[test]
    fn test_above_below_synonyms() {
        let xml = r#"
            <softwareradio>
              <engine name="e1" class="stackengine">
                <component name="a" class="x"/>
                <component name="b" class="x"/>
              </engine>
              <link above="a.bottomport1" below="b.topport1"/>
            </softwareradio>
        "#;
        let rep = parse_str(xml).unwrap();
        let links = rep.links();
        assert_eq!(links[0].source_component, "a");
        assert_eq!(links[0].sink_component, "b");
    }

    #[test]
    fn test_sink_wins_over_below() {
        let xml = r#"
            <softwareradio>
              <engine name="e1" class="phyengine">
                <component name="a" class="x"/>
                <component name="b" class="x"/>
                <component name="c" class="x"/>
              </engine>
              <link source="a.o" sink="b.i" below="c.i"/>
            </softwareradio>
        "#;
        let rep = parse_str(xml).unwrap();
        assert_eq!(rep.links()[0].sink_component, "b");
    }

    #[test]
    fn test_illegal_element_rejected() {
        let xml = r#"
            <softwareradio>
              <engine name="e1" class="phyengine">
                <widget name="a"/>
              </engine>
            </softwareradio>
        "#;
        assert!(matches!(
            parse_str(xml),
            Err(RadioError::XmlParsing(_))
        ));
    }

    #[test]
    fn test_malformed_xml_rejected() {
        assert!(parse_str("<softwareradio><engine></softwareradio>").is_err());
        assert!(parse_str("not xml at all").is_err());
    }

    #[test]
    fn test_dangling_link_rejected_at_build() {
        let xml = r#"
            <softwareradio>
              <engine name="e1" class="phyengine">
                <component name="a" class="x"/>
              </engine>
              <link source="a.o" sink="ghost.i"/>
            </softwareradio>
        "#;
        assert!(matches!(
            parse_str(xml),
            Err(RadioError::GraphStructure(_))
        ));
    }
}
