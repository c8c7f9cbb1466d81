//! Projection collaborator backed by `proj4rs`.
//!
//! Definitions use the proj string syntax and are looked up in an explicit
//! registry handed to [`Projector::new`]. Geographic systems take and return
//! degrees, `x` being longitude.

use std::collections::BTreeMap;
use std::fmt;

use proj4rs::proj::Proj;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Coordinate;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("unknown coordinate system {0}")]
    UnknownSystem(String),
    #[error("invalid definition for {id}: {reason}")]
    InvalidDefinition { id: String, reason: String },
    #[error("coordinate ({x}, {y}) is outside the projection's valid range")]
    OutOfRange { x: f64, y: f64 },
    #[error("transform failed: {0}")]
    Transform(String),
}

/// One registered coordinate system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionEntry {
    /// Proj string, e.g. `+proj=longlat +datum=WGS84 +no_defs`.
    pub definition: String,
    /// ESRI WKT written as the shapefile projection descriptor.
    #[serde(default)]
    pub wkt: Option<String>,
}

pub type ProjectionRegistry = BTreeMap<String, ProjectionEntry>;

/// `"9377"` becomes `"EPSG:9377"`; anything else is kept, trimmed.
pub fn normalize_crs_id(id: &str) -> String {
    let id = id.trim();
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        format!("EPSG:{}", id)
    } else {
        id.to_string()
    }
}

/// Registry code without the authority prefix, `"EPSG:9377"` → `"9377"`.
pub fn crs_code(id: &str) -> &str {
    id.rsplit_once(':').map_or(id, |(_, code)| code)
}

/// Point projector between two registered systems.
pub struct Projector {
    from: String,
    to: String,
    source: Proj,
    target: Proj,
}

impl fmt::Debug for Projector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projector")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

fn lookup(registry: &ProjectionRegistry, id: &str) -> Result<Proj, ProjectionError> {
    let entry = registry
        .get(id)
        .ok_or_else(|| ProjectionError::UnknownSystem(id.to_string()))?;
    Proj::from_proj_string(&entry.definition).map_err(|e| ProjectionError::InvalidDefinition {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

impl Projector {
    pub fn new(registry: &ProjectionRegistry, from: &str, to: &str) -> Result<Self, ProjectionError> {
        Ok(Projector {
            source: lookup(registry, from)?,
            target: lookup(registry, to)?,
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    pub fn from_id(&self) -> &str {
        &self.from
    }

    pub fn to_id(&self) -> &str {
        &self.to
    }

    pub fn project(&self, coordinate: Coordinate) -> Result<Coordinate, ProjectionError> {
        let Coordinate { x, y } = coordinate;
        let out_of_range = || ProjectionError::OutOfRange { x, y };

        let mut point = if self.source.is_latlong() {
            if !(-90.0..=90.0).contains(&y) || !(-180.0..=180.0).contains(&x) {
                return Err(out_of_range());
            }
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        proj4rs::transform::transform(&self.source, &self.target, &mut point)
            .map_err(|e| ProjectionError::Transform(e.to_string()))?;

        let (px, py) = if self.target.is_latlong() {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };
        if !(px.is_finite() && py.is_finite()) {
            return Err(out_of_range());
        }
        Ok(Coordinate::new(px, py))
    }
}

pub const WGS84_DEFINITION: &str = "+proj=longlat +datum=WGS84 +no_defs";
pub const MAGNA_SIRGAS_DEFINITION: &str = "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs";
pub const ORIGEN_NACIONAL_DEFINITION: &str = "+proj=tmerc +lat_0=4.0 +lon_0=-73.0 +k=0.9992 +x_0=5000000 +y_0=2000000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs";

const WGS84_WKT: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
const MAGNA_SIRGAS_WKT: &str = r#"GEOGCS["GCS_MAGNA",DATUM["D_MAGNA",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
const ORIGEN_NACIONAL_WKT: &str = r#"PROJCS["MAGNA-SIRGAS_Origen-Nacional",GEOGCS["GCS_MAGNA",DATUM["D_MAGNA",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",5000000.0],PARAMETER["False_Northing",2000000.0],PARAMETER["Central_Meridian",-73.0],PARAMETER["Scale_Factor",0.9992],PARAMETER["Latitude_Of_Origin",4.0],UNIT["Meter",1.0]]"#;

/// Systems registered out of the box: WGS84, MAGNA-SIRGAS geographic and
/// MAGNA-SIRGAS Origen Nacional.
pub fn default_registry() -> ProjectionRegistry {
    let entry = |definition: &str, wkt: &str| ProjectionEntry {
        definition: definition.to_string(),
        wkt: Some(wkt.to_string()),
    };
    BTreeMap::from([
        ("EPSG:4326".to_string(), entry(WGS84_DEFINITION, WGS84_WKT)),
        ("EPSG:4686".to_string(), entry(MAGNA_SIRGAS_DEFINITION, MAGNA_SIRGAS_WKT)),
        ("EPSG:9377".to_string(), entry(ORIGEN_NACIONAL_DEFINITION, ORIGEN_NACIONAL_WKT)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origen_nacional() -> Projector {
        Projector::new(&default_registry(), "EPSG:4326", "EPSG:9377").unwrap()
    }

    #[test]
    fn crs_ids() {
        assert_eq!(normalize_crs_id("9377"), "EPSG:9377");
        assert_eq!(normalize_crs_id(" EPSG:4686 "), "EPSG:4686");
        assert_eq!(crs_code("EPSG:9377"), "9377");
        assert_eq!(crs_code("9377"), "9377");
    }

    #[test]
    fn default_definitions_parse() {
        let registry = default_registry();
        for id in registry.keys() {
            assert!(lookup(&registry, id).is_ok(), "{} did not parse", id);
        }
    }

    #[test]
    fn geographic_target_keeps_degrees() {
        let projector = Projector::new(&default_registry(), "EPSG:4326", "EPSG:4686").unwrap();
        let c = Coordinate::new(-74.081_234_567_891, 4.609_876_543_21);
        let out = projector.project(c).unwrap();
        assert!((out.x - c.x).abs() < 1e-8, "x = {}", out.x);
        assert!((out.y - c.y).abs() < 1e-8, "y = {}", out.y);
    }

    #[test]
    fn tmerc_origin_maps_to_false_origin() {
        let out = origen_nacional().project(Coordinate::new(-73.0, 4.0)).unwrap();
        assert!((out.x - 5_000_000.0).abs() < 1e-3, "x = {}", out.x);
        assert!((out.y - 2_000_000.0).abs() < 1e-3, "y = {}", out.y);
    }

    #[test]
    fn tmerc_is_plausible_near_bogota() {
        let projector = origen_nacional();
        let out = projector.project(Coordinate::new(-74.0, 4.6)).unwrap();
        assert!(out.x > 4_888_500.0 && out.x < 4_889_700.0, "x = {}", out.x);
        assert!(out.y > 2_066_000.0 && out.y < 2_066_800.0, "y = {}", out.y);

        let east = projector.project(Coordinate::new(-72.0, 4.6)).unwrap();
        assert!(((east.x - 5_000_000.0) + (out.x - 5_000_000.0)).abs() < 1e-3);
        assert!((east.y - out.y).abs() < 1e-3);
    }

    #[test]
    fn projected_source_goes_back_to_degrees() {
        let registry = default_registry();
        let back = Projector::new(&registry, "EPSG:9377", "EPSG:4326").unwrap();
        let planar = origen_nacional().project(Coordinate::new(-74.0, 4.6)).unwrap();
        let out = back.project(planar).unwrap();
        assert!((out.x - -74.0).abs() < 1e-7, "x = {}", out.x);
        assert!((out.y - 4.6).abs() < 1e-7, "y = {}", out.y);
    }

    #[test]
    fn errors() {
        let mut registry = default_registry();
        assert!(matches!(
            Projector::new(&registry, "EPSG:4326", "EPSG:3857"),
            Err(ProjectionError::UnknownSystem(_))
        ));

        registry.insert(
            "LOCAL:1".to_string(),
            ProjectionEntry {
                definition: "+proj=nosuchthing".to_string(),
                wkt: None,
            },
        );
        assert!(matches!(
            Projector::new(&registry, "EPSG:4326", "LOCAL:1"),
            Err(ProjectionError::InvalidDefinition { .. })
        ));

        assert!(matches!(
            origen_nacional().project(Coordinate::new(-73.0, 95.0)),
            Err(ProjectionError::OutOfRange { .. })
        ));
    }
}
