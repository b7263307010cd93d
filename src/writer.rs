use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, Event};
use quick_xml::writer::Writer;

use crate::converter::{OsmNode, OsmWay};
use crate::ConvertError;

const GENERATOR: &str = "geo2osm";

// Emits the whole document in one go: every node, then every way, in
// insertion order. Nodes carry no tags, so they serialize as empty
// elements.
pub fn write_osm(path: &Path, nodes: &[OsmNode], ways: &[OsmWay]) -> Result<(), ConvertError> {
    let file = File::create(path)?;
    let mut writer = Writer::new_with_indent(BufWriter::new(file), b' ', 2);
    write_document(&mut writer, nodes, ways)?;
    writer.into_inner().flush()?;
    Ok(())
}

pub fn write_document<W: Write>(
    writer: &mut Writer<W>,
    nodes: &[OsmNode],
    ways: &[OsmWay],
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer
        .create_element("osm")
        .with_attribute(("version", "0.6"))
        .with_attribute(("generator", GENERATOR))
        .write_inner_content(|writer| -> Result<(), quick_xml::Error> {
            for node in nodes {
                writer
                    .create_element("node")
                    .with_attribute(("visible", "true"))
                    .with_attribute(("id", node.id.to_string().as_str()))
                    .with_attribute(("lat", node.y.to_string().as_str()))
                    .with_attribute(("lon", node.x.to_string().as_str()))
                    .write_empty()?;
            }
            for way in ways {
                writer
                    .create_element("way")
                    .with_attribute(("id", way.id.to_string().as_str()))
                    .with_attribute(("action", "modify"))
                    .with_attribute(("visible", "true"))
                    .write_inner_content(|writer| -> Result<(), quick_xml::Error> {
                        for node_ref in &way.node_refs {
                            writer
                                .create_element("nd")
                                .with_attribute(("ref", node_ref.to_string().as_str()))
                                .write_empty()?;
                        }
                        Ok(())
                    })?;
            }
            Ok(())
        })?;
    Ok(())
}
