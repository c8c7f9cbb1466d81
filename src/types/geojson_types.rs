use geojson::GeoJson;

use crate::error::{Error, Result};

use super::{AttributeValue, Attributes, Coordinate, Feature, FeatureCollection, Geometry, Polygon};

fn position(p: Vec<f64>) -> Result<Coordinate> {
    match p.as_slice() {
        [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coordinate::new(*x, *y)),
        [_, _, ..] => Err(Error::MalformedGeometry("non-finite position".to_string())),
        _ => Err(Error::MalformedGeometry(format!(
            "position needs at least 2 values, got {}",
            p.len()
        ))),
    }
}

fn positions(line: Vec<Vec<f64>>) -> Result<Vec<Coordinate>> {
    line.into_iter().map(position).collect()
}

fn position_lists(lines: Vec<Vec<Vec<f64>>>) -> Result<Vec<Vec<Coordinate>>> {
    lines.into_iter().map(positions).collect()
}

impl TryFrom<geojson::Value> for Geometry {
    type Error = Error;

    fn try_from(value: geojson::Value) -> Result<Self> {
        Ok(match value {
            geojson::Value::Point(p) => Geometry::Point(position(p)?),
            geojson::Value::MultiPoint(points) => Geometry::MultiPoint(positions(points)?),
            geojson::Value::LineString(line) => Geometry::LineString(positions(line)?),
            geojson::Value::MultiLineString(lines) => Geometry::MultiLineString(position_lists(lines)?),
            geojson::Value::Polygon(rings) => Geometry::Polygon(Polygon {
                rings: position_lists(rings)?,
            }),
            geojson::Value::MultiPolygon(polygons) => Geometry::MultiPolygon(
                polygons
                    .into_iter()
                    .map(|rings| position_lists(rings).map(|rings| Polygon { rings }))
                    .collect::<Result<_>>()?,
            ),
            geojson::Value::GeometryCollection(_) => {
                return Err(Error::MalformedGeometry(
                    "GeometryCollection is not a supported geometry kind".to_string(),
                ));
            }
        })
    }
}

impl From<&Geometry> for geojson::Value {
    fn from(geometry: &Geometry) -> Self {
        let pos = |c: &Coordinate| vec![c.x, c.y];
        let line = |l: &Vec<Coordinate>| l.iter().map(pos).collect::<Vec<_>>();
        let rings = |p: &Polygon| p.rings.iter().map(line).collect::<Vec<_>>();

        match geometry {
            Geometry::Point(c) => geojson::Value::Point(pos(c)),
            Geometry::MultiPoint(points) => geojson::Value::MultiPoint(line(points)),
            Geometry::LineString(points) => geojson::Value::LineString(line(points)),
            Geometry::MultiLineString(parts) => geojson::Value::MultiLineString(parts.iter().map(line).collect()),
            Geometry::Polygon(polygon) => geojson::Value::Polygon(rings(polygon)),
            Geometry::MultiPolygon(polygons) => geojson::Value::MultiPolygon(polygons.iter().map(rings).collect()),
        }
    }
}

impl TryFrom<geojson::Feature> for Feature {
    type Error = Error;

    fn try_from(feature: geojson::Feature) -> Result<Self> {
        let geometry = feature
            .geometry
            .ok_or_else(|| Error::MalformedGeometry("feature has no geometry".to_string()))?;
        let attributes: Attributes = feature
            .properties
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, AttributeValue::from(value)))
            .collect();

        Ok(Feature {
            geometry: Geometry::try_from(geometry.value)?,
            attributes,
        })
    }
}

impl TryFrom<geojson::FeatureCollection> for FeatureCollection {
    type Error = Error;

    fn try_from(collection: geojson::FeatureCollection) -> Result<Self> {
        collection.features.into_iter().map(Feature::try_from).collect()
    }
}

impl From<&FeatureCollection> for geojson::FeatureCollection {
    fn from(collection: &FeatureCollection) -> Self {
        let features = collection
            .iter()
            .map(|feature| geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&feature.geometry))),
                id: None,
                properties: Some(
                    feature
                        .attributes
                        .iter()
                        .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                        .collect(),
                ),
                foreign_members: None,
            })
            .collect();

        geojson::FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

/// Parses a GeoJSON document that must be a FeatureCollection.
pub fn parse_feature_collection(data: &str) -> Result<FeatureCollection> {
    let geojson: GeoJson = data
        .parse()
        .map_err(|e: geojson::Error| Error::MalformedGeometry(e.to_string()))?;

    match geojson {
        GeoJson::FeatureCollection(collection) => FeatureCollection::try_from(collection),
        GeoJson::Feature(feature) => Ok(FeatureCollection::new(vec![Feature::try_from(feature)?])),
        GeoJson::Geometry(_) => Err(Error::MalformedGeometry(
            "expected a FeatureCollection, got a bare geometry".to_string(),
        )),
    }
}
