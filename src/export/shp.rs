//! ESRI shapefile bundles, one per geometry family present.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;

use shapefile::dbase::{self, FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::record::EsriShape;
use shapefile::{Multipoint, Point, PolygonRing, Polyline, ShapeWriter, Writer};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{AttributeValue, Coordinate, Feature, FeatureCollection, Geometry, Polygon, ShapeFamily};

/// dBase limits.
const MAX_FIELD_NAME_LEN: usize = 10;
const MAX_CHARACTER_WIDTH: usize = 254;
const NUMERIC_WIDTH: u8 = 24;
const NUMERIC_DECIMALS: u8 = 8;

/// Collection name used for point and line bundles; polygons take the
/// output name.
pub const POINT_COLLECTION: &str = "points";
pub const LINE_COLLECTION: &str = "lines";

/// The four files of one shapefile layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapefileBundle {
    pub name: String,
    pub family: ShapeFamily,
    pub shp: Vec<u8>,
    pub shx: Vec<u8>,
    pub dbf: Vec<u8>,
    pub prj: String,
}

impl ShapefileBundle {
    /// `(file name, contents)` pairs in the conventional order.
    pub fn files(&self) -> Vec<(String, &[u8])> {
        vec![
            (format!("{}.shp", self.name), self.shp.as_slice()),
            (format!("{}.shx", self.name), self.shx.as_slice()),
            (format!("{}.dbf", self.name), self.dbf.as_slice()),
            (format!("{}.prj", self.name), self.prj.as_bytes()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Character,
    Numeric,
}

#[derive(Debug, Clone, PartialEq)]
struct FieldSpec {
    key: String,
    dbf_name: String,
    kind: FieldKind,
    width: u8,
}

fn dbf_field_name(key: &str) -> String {
    let mut name = String::new();
    for c in key.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' };
        if name.len() + 1 > MAX_FIELD_NAME_LEN {
            break;
        }
        name.push(c);
    }
    name
}

/// Derives the fixed-width attribute table shared by every feature of one
/// collection. Columns are the union of all keys; a feature without a key
/// writes a null there. Each key holds a single value type (nulls fit any
/// type).
fn attribute_schema(name: &str, features: &[&Feature]) -> Result<Vec<FieldSpec>> {
    let keys: BTreeSet<&String> = features.iter().flat_map(|f| f.attributes.keys()).collect();

    let mut kinds: BTreeMap<&String, Option<FieldKind>> = keys.iter().map(|k| (*k, None)).collect();
    let mut widths: BTreeMap<&String, usize> = keys.iter().map(|k| (*k, 1)).collect();

    for (index, feature) in features.iter().enumerate() {
        for (key, value) in &feature.attributes {
            let kind = match value {
                AttributeValue::Text(text) => {
                    if text.len() > MAX_CHARACTER_WIDTH {
                        return Err(Error::Encoding(format!(
                            "collection {}: value of {} in feature {} is longer than {} bytes",
                            name, key, index, MAX_CHARACTER_WIDTH
                        )));
                    }
                    let width = widths.entry(key).or_insert(1);
                    *width = (*width).max(text.len());
                    FieldKind::Character
                }
                AttributeValue::Number(_) => FieldKind::Numeric,
                AttributeValue::Null => continue,
            };
            let slot = kinds.entry(key).or_insert(None);
            match *slot {
                None => *slot = Some(kind),
                Some(existing) if existing != kind => {
                    return Err(Error::Encoding(format!(
                        "collection {}: attribute {} mixes text and numbers (feature {})",
                        name, key, index
                    )));
                }
                Some(_) => {}
            }
        }
    }

    let mut seen = BTreeSet::new();
    let mut fields = Vec::with_capacity(keys.len());
    for key in keys {
        let dbf_name = dbf_field_name(key);
        if dbf_name.is_empty() || !seen.insert(dbf_name.clone()) {
            return Err(Error::Encoding(format!(
                "collection {}: attribute {} maps to a clashing or empty dBase field name {:?}",
                name, key, dbf_name
            )));
        }
        let kind = kinds[key].unwrap_or(FieldKind::Character);
        let width = match kind {
            FieldKind::Character => widths[key] as u8,
            FieldKind::Numeric => NUMERIC_WIDTH,
        };
        fields.push(FieldSpec {
            key: key.clone(),
            dbf_name,
            kind,
            width,
        });
    }
    Ok(fields)
}

fn record_for(feature: &Feature, fields: &[FieldSpec]) -> Record {
    let mut record = Record::default();
    for field in fields {
        let value = feature.attributes.get(&field.key).unwrap_or(&AttributeValue::Null);
        let value = match (field.kind, value) {
            (FieldKind::Character, AttributeValue::Text(text)) => FieldValue::Character(Some(text.clone())),
            (FieldKind::Numeric, AttributeValue::Number(n)) => FieldValue::Numeric(Some(*n)),
            (FieldKind::Character, _) => FieldValue::Character(None),
            (FieldKind::Numeric, _) => FieldValue::Numeric(None),
        };
        record.insert(field.dbf_name.clone(), value);
    }
    record
}

fn point(c: &Coordinate) -> Point {
    Point::new(c.x, c.y)
}

fn points(coords: &[Coordinate]) -> Vec<Point> {
    coords.iter().map(point).collect()
}

/// Smallest closed ring: three distinct positions plus the closing one.
const MIN_RING_LEN: usize = 4;

fn unencodable(name: &str, index: usize, what: &str) -> Error {
    Error::Encoding(format!("collection {}: feature {} {}", name, index, what))
}

fn single_point(name: &str, index: usize, geometry: &Geometry) -> Result<Point> {
    match geometry {
        Geometry::Point(c) => Ok(point(c)),
        other => Err(unencodable(name, index, &format!("is a {:?}, not a point", other.kind()))),
    }
}

fn multipoint(name: &str, index: usize, geometry: &Geometry) -> Result<Multipoint> {
    match geometry {
        Geometry::Point(c) => Ok(Multipoint::new(vec![point(c)])),
        Geometry::MultiPoint(coords) if coords.is_empty() => Err(unencodable(name, index, "has no points")),
        Geometry::MultiPoint(coords) => Ok(Multipoint::new(points(coords))),
        other => Err(unencodable(name, index, &format!("is a {:?}, not a point", other.kind()))),
    }
}

fn polyline(name: &str, index: usize, geometry: &Geometry) -> Result<Polyline> {
    let parts: Vec<&[Coordinate]> = match geometry {
        Geometry::LineString(coords) => vec![coords.as_slice()],
        Geometry::MultiLineString(parts) => parts.iter().map(Vec::as_slice).collect(),
        other => return Err(unencodable(name, index, &format!("is a {:?}, not a line", other.kind()))),
    };
    if parts.is_empty() {
        return Err(unencodable(name, index, "has no line parts"));
    }
    if let Some(part) = parts.iter().position(|p| p.len() < 2) {
        return Err(unencodable(name, index, &format!("line part {} has fewer than 2 points", part)));
    }
    Ok(Polyline::with_parts(parts.into_iter().map(points).collect()))
}

fn polygon_rings(name: &str, index: usize, polygon: &Polygon, rings: &mut Vec<PolygonRing<Point>>) -> Result<()> {
    if polygon.rings.is_empty() {
        return Err(unencodable(name, index, "has a polygon without rings"));
    }
    for (ring_index, ring) in polygon.rings.iter().enumerate() {
        if ring.len() < MIN_RING_LEN {
            return Err(unencodable(
                name,
                index,
                &format!("ring {} has {} points, at least {} needed", ring_index, ring.len(), MIN_RING_LEN),
            ));
        }
        if ring_index == 0 {
            rings.push(PolygonRing::Outer(points(ring)));
        } else {
            rings.push(PolygonRing::Inner(points(ring)));
        }
    }
    Ok(())
}

fn polygon_shape(name: &str, index: usize, geometry: &Geometry) -> Result<shapefile::Polygon> {
    let mut rings = Vec::new();
    match geometry {
        Geometry::Polygon(polygon) => polygon_rings(name, index, polygon, &mut rings)?,
        Geometry::MultiPolygon(polygons) if polygons.is_empty() => {
            return Err(unencodable(name, index, "has no polygons"));
        }
        Geometry::MultiPolygon(polygons) => {
            for polygon in polygons {
                polygon_rings(name, index, polygon, &mut rings)?;
            }
        }
        other => return Err(unencodable(name, index, &format!("is a {:?}, not a polygon", other.kind()))),
    }
    Ok(shapefile::Polygon::with_rings(rings))
}

/// Builds one shape per feature, failing on the first feature the format
/// cannot represent.
fn shapes_of<S>(
    name: &str,
    features: &[&Feature],
    shape: impl Fn(&str, usize, &Geometry) -> Result<S>,
) -> Result<Vec<S>> {
    features
        .iter()
        .enumerate()
        .map(|(index, feature)| shape(name, index, &feature.geometry))
        .collect()
}

fn encoding<E: std::fmt::Display>(name: &str) -> impl Fn(E) -> Error + '_ {
    move |e| Error::Encoding(format!("collection {}: {}", name, e))
}

fn write_layer<S: EsriShape>(
    name: &str,
    shapes: &[S],
    features: &[&Feature],
    fields: &[FieldSpec],
) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>)> {
    let mut shp = Cursor::new(Vec::new());
    let mut shx = Cursor::new(Vec::new());
    let mut dbf = Cursor::new(Vec::new());

    {
        let mut builder = TableWriterBuilder::new();
        for field in fields {
            let field_name = FieldName::try_from(field.dbf_name.as_str())
                .map_err(|e| Error::Encoding(format!("invalid field name {}: {:?}", field.dbf_name, e)))?;
            builder = match field.kind {
                FieldKind::Character => builder.add_character_field(field_name, field.width),
                FieldKind::Numeric => builder.add_numeric_field(field_name, field.width, NUMERIC_DECIMALS),
            };
        }

        let shape_writer = ShapeWriter::with_shx(&mut shp, &mut shx);
        let table_writer = builder.build_with_dest(&mut dbf);
        let mut writer = Writer::new(shape_writer, table_writer);
        for (shape, feature) in shapes.iter().zip(features) {
            writer
                .write_shape_and_record(shape, &record_for(feature, fields))
                .map_err(encoding(name))?;
        }
        // headers are finalised when the writers drop
    }

    Ok((shp.into_inner(), shx.into_inner(), dbf.into_inner()))
}

fn encode_family(
    family: ShapeFamily,
    name: &str,
    features: &[&Feature],
    prj: &str,
) -> Result<ShapefileBundle> {
    let fields = attribute_schema(name, features)?;
    debug!("Encoding {} features into {} with {} fields", features.len(), name, fields.len());

    let (shp, shx, dbf) = match family {
        ShapeFamily::Point if features.iter().all(|f| matches!(f.geometry, Geometry::Point(_))) => {
            write_layer(name, &shapes_of(name, features, single_point)?, features, &fields)?
        }
        ShapeFamily::Point => write_layer(name, &shapes_of(name, features, multipoint)?, features, &fields)?,
        ShapeFamily::Line => write_layer(name, &shapes_of(name, features, polyline)?, features, &fields)?,
        ShapeFamily::Polygon => write_layer(name, &shapes_of(name, features, polygon_shape)?, features, &fields)?,
    };

    Ok(ShapefileBundle {
        name: name.to_string(),
        family,
        shp,
        shx,
        dbf,
        prj: prj.to_string(),
    })
}

/// Splits `collection` by geometry family and encodes one bundle per family
/// present, in point, line, polygon order.
///
/// `prj` is the projection descriptor written verbatim to every `.prj`;
/// `output_name` names the polygon collection.
pub fn encode_shapefiles(collection: &FeatureCollection, prj: &str, output_name: &str) -> Result<Vec<ShapefileBundle>> {
    let mut groups: BTreeMap<ShapeFamily, Vec<&Feature>> = BTreeMap::new();
    for feature in collection.iter() {
        groups.entry(feature.geometry.kind().family()).or_default().push(feature);
    }

    groups
        .into_iter()
        .map(|(family, features)| {
            let name = match family {
                ShapeFamily::Point => POINT_COLLECTION,
                ShapeFamily::Line => LINE_COLLECTION,
                ShapeFamily::Polygon => output_name,
            };
            encode_family(family, name, &features, prj)
        })
        .collect()
}
