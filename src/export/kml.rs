use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};

use crate::error::{Error, Result};
use crate::projection::normalize_crs_id;
use crate::types::FeatureCollection;

pub const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";
const STYLE_ID: &str = "polygonStyle";
const LINE_COLOR: &str = "ff00ffff";
const LINE_WIDTH: &str = "2";
const FILL_COLOR: &str = "00ffffff";

/// Indentation of the coordinate lines and of the closing tag, matching the
/// depth `<coordinates>` sits at.
const COORDINATE_INDENT: &str = "              ";
const CLOSING_INDENT: &str = "            ";

/// Systems whose coordinates can go into KML unchanged. KML is longitude and
/// latitude on WGS84; MAGNA-SIRGAS agrees with it to well under a metre.
pub const KML_SYSTEMS: [&str; 2] = ["EPSG:4326", "EPSG:4686"];

fn xml_error(e: quick_xml::Error) -> Error {
    Error::Encoding(format!("KML write failed: {}", e))
}

/// Writes a single-placemark KML document for the first feature of
/// `collection`, naming the placemark `name`.
///
/// Coordinates are written as-is, one `x,y,0` tuple per line. `target` is the
/// system they are in and must be one of [`KML_SYSTEMS`]; anything else is an
/// encoding error.
pub fn encode_kml(collection: &FeatureCollection, target: &str, name: &str) -> Result<Vec<u8>> {
    let target = normalize_crs_id(target);
    if !KML_SYSTEMS.contains(&target.as_str()) {
        return Err(Error::Encoding(format!(
            "KML takes geographic WGS84 coordinates, not {}",
            target
        )));
    }
    let feature = collection
        .first()
        .ok_or_else(|| Error::Encoding("cannot build KML from an empty collection".to_string()))?;
    let ring = feature.geometry.outer_ring().ok_or_else(|| {
        Error::Encoding(format!(
            "KML placemark needs a polygon, got {}",
            feature.geometry.kind().name()
        ))
    })?;

    let mut coordinates = String::from("\n");
    for c in ring {
        coordinates.push_str(&format!("{}{},{},0\n", COORDINATE_INDENT, c.x, c.y));
    }
    coordinates.push_str(CLOSING_INDENT);

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;

    writer
        .create_element("kml")
        .with_attribute(("xmlns", KML_NAMESPACE))
        .write_inner_content(|w| {
            w.create_element("Document").write_inner_content(|w| {
                w.create_element("Style")
                    .with_attribute(("id", STYLE_ID))
                    .write_inner_content(|w| {
                        w.create_element("LineStyle").write_inner_content(|w| {
                            w.create_element("color").write_text_content(BytesText::new(LINE_COLOR))?;
                            w.create_element("width").write_text_content(BytesText::new(LINE_WIDTH))?;
                            Ok::<(), quick_xml::Error>(())
                        })?;
                        w.create_element("PolyStyle").write_inner_content(|w| {
                            w.create_element("color").write_text_content(BytesText::new(FILL_COLOR))?;
                            Ok::<(), quick_xml::Error>(())
                        })?;
                        Ok::<(), quick_xml::Error>(())
                    })?;

                w.create_element("Placemark").write_inner_content(|w| {
                    w.create_element("styleUrl")
                        .write_text_content(BytesText::new(&format!("#{}", STYLE_ID)))?;
                    w.create_element("name").write_text_content(BytesText::new(name))?;
                    w.create_element("Polygon").write_inner_content(|w| {
                        w.create_element("outerBoundaryIs").write_inner_content(|w| {
                            w.create_element("LinearRing").write_inner_content(|w| {
                                w.create_element("coordinates")
                                    .write_text_content(BytesText::new(&coordinates))?;
                                Ok::<(), quick_xml::Error>(())
                            })?;
                            Ok::<(), quick_xml::Error>(())
                        })?;
                        Ok::<(), quick_xml::Error>(())
                    })?;
                    Ok::<(), quick_xml::Error>(())
                })?;
                Ok::<(), quick_xml::Error>(())
            })?;
            Ok::<(), quick_xml::Error>(())
        })
        .map_err(xml_error)?;

    Ok(writer.into_inner().into_inner())
}
