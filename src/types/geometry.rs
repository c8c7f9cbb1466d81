use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A planar or geographic position. Any z value from the source is dropped.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    /// Sentinel returned when no usable label point exists.
    pub const ORIGIN: Coordinate = Coordinate::new(0.0, 0.0);

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn to_tuple(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((x, y): (f64, f64)) -> Self {
        Coordinate::new(x, y)
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from([x, y]: [f64; 2]) -> Self {
        Coordinate::new(x, y)
    }
}

impl From<Coordinate> for geo::Coord<f64> {
    fn from(c: Coordinate) -> Self {
        geo::Coord { x: c.x, y: c.y }
    }
}

impl From<geo::Coord<f64>> for Coordinate {
    fn from(c: geo::Coord<f64>) -> Self {
        Coordinate::new(c.x, c.y)
    }
}

/// Closed sequence of coordinates, first == last.
pub type Ring = Vec<Coordinate>;

/// Outer ring followed by zero or more holes.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Polygon {
    pub rings: Vec<Ring>,
}

impl Polygon {
    pub fn new(exterior: Ring, holes: Vec<Ring>) -> Self {
        let mut rings = Vec::with_capacity(holes.len() + 1);
        rings.push(exterior);
        rings.extend(holes);
        Self { rings }
    }

    pub fn exterior(&self) -> Option<&Ring> {
        self.rings.first()
    }

    pub fn holes(&self) -> &[Ring] {
        self.rings.get(1..).unwrap_or(&[])
    }

    pub fn to_geo(&self) -> geo::Polygon<f64> {
        let to_line = |ring: &Ring| geo::LineString(ring.iter().map(|c| (*c).into()).collect());
        let exterior = self.exterior().map(to_line).unwrap_or_else(|| geo::LineString(vec![]));
        geo::Polygon::new(exterior, self.holes().iter().map(to_line).collect())
    }
}

/// Geometry family used to split features into typed output collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeFamily {
    Point,
    Line,
    Polygon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
}

impl GeometryKind {
    /// Nesting depth of the coordinate tree, counting a single position as 1.
    pub fn depth(self) -> usize {
        match self {
            GeometryKind::Point => 1,
            GeometryKind::MultiPoint | GeometryKind::LineString => 2,
            GeometryKind::MultiLineString | GeometryKind::Polygon => 3,
            GeometryKind::MultiPolygon => 4,
        }
    }

    pub fn family(self) -> ShapeFamily {
        match self {
            GeometryKind::Point | GeometryKind::MultiPoint => ShapeFamily::Point,
            GeometryKind::LineString | GeometryKind::MultiLineString => ShapeFamily::Line,
            GeometryKind::Polygon | GeometryKind::MultiPolygon => ShapeFamily::Polygon,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::MultiPoint => "MultiPoint",
            GeometryKind::LineString => "LineString",
            GeometryKind::MultiLineString => "MultiLineString",
            GeometryKind::Polygon => "Polygon",
            GeometryKind::MultiPolygon => "MultiPolygon",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coordinate),
    MultiPoint(Vec<Coordinate>),
    LineString(Vec<Coordinate>),
    MultiLineString(Vec<Vec<Coordinate>>),
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::MultiPoint(_) => GeometryKind::MultiPoint,
            Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::MultiLineString(_) => GeometryKind::MultiLineString,
            Geometry::Polygon(_) => GeometryKind::Polygon,
            Geometry::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }

    /// First polygon's outer ring, if this is a polygonal geometry.
    pub fn outer_ring(&self) -> Option<&Ring> {
        match self {
            Geometry::Polygon(polygon) => polygon.exterior(),
            Geometry::MultiPolygon(polygons) => polygons.first().and_then(Polygon::exterior),
            _ => None,
        }
    }

    /// Every vertex in order. Ring closing points (last equal to first) are
    /// left out.
    pub fn vertices(&self) -> Vec<Coordinate> {
        fn open_ring(ring: &[Coordinate], out: &mut Vec<Coordinate>) {
            let end = match (ring.first(), ring.last()) {
                (Some(first), Some(last)) if ring.len() > 1 && first == last => ring.len() - 1,
                _ => ring.len(),
            };
            out.extend_from_slice(&ring[..end]);
        }

        let mut out = Vec::new();
        match self {
            Geometry::Point(c) => out.push(*c),
            Geometry::MultiPoint(coords) | Geometry::LineString(coords) => out.extend_from_slice(coords),
            Geometry::MultiLineString(parts) => parts.iter().for_each(|p| out.extend_from_slice(p)),
            Geometry::Polygon(polygon) => polygon.rings.iter().for_each(|r| open_ring(r, &mut out)),
            Geometry::MultiPolygon(polygons) => polygons
                .iter()
                .flat_map(|p| p.rings.iter())
                .for_each(|r| open_ring(r, &mut out)),
        }
        out
    }

    pub fn to_tree(&self) -> CoordinateTree {
        fn points(coords: &[Coordinate]) -> CoordinateTree {
            CoordinateTree::Nested(coords.iter().copied().map(CoordinateTree::Leaf).collect())
        }
        fn lines(lines: &[Vec<Coordinate>]) -> CoordinateTree {
            CoordinateTree::Nested(lines.iter().map(|l| points(l)).collect())
        }

        match self {
            Geometry::Point(c) => CoordinateTree::Leaf(*c),
            Geometry::MultiPoint(coords) | Geometry::LineString(coords) => points(coords),
            Geometry::MultiLineString(parts) => lines(parts),
            Geometry::Polygon(polygon) => lines(&polygon.rings),
            Geometry::MultiPolygon(polygons) => {
                CoordinateTree::Nested(polygons.iter().map(|p| lines(&p.rings)).collect())
            }
        }
    }

    /// Rebuilds a typed geometry from a coordinate tree, rejecting trees whose
    /// shape does not match `kind`.
    pub fn from_tree(kind: GeometryKind, tree: CoordinateTree) -> Result<Geometry> {
        if let Some(depth) = tree.leaf_depth()? {
            if depth != kind.depth() {
                return Err(Error::MalformedGeometry(format!(
                    "{} expects coordinate depth {}, found {}",
                    kind.name(),
                    kind.depth(),
                    depth
                )));
            }
        }

        Ok(match kind {
            GeometryKind::Point => Geometry::Point(tree.into_leaf()?),
            GeometryKind::MultiPoint => Geometry::MultiPoint(tree.into_points()?),
            GeometryKind::LineString => Geometry::LineString(tree.into_points()?),
            GeometryKind::MultiLineString => Geometry::MultiLineString(tree.into_lines()?),
            GeometryKind::Polygon => Geometry::Polygon(Polygon {
                rings: tree.into_lines()?,
            }),
            GeometryKind::MultiPolygon => Geometry::MultiPolygon(
                tree.into_nested()?
                    .into_iter()
                    .map(|p| p.into_lines().map(|rings| Polygon { rings }))
                    .collect::<Result<_>>()?,
            ),
        })
    }
}

/// Arbitrarily nested coordinates, the shape GeoJSON uses for every geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinateTree {
    Leaf(Coordinate),
    Nested(Vec<CoordinateTree>),
}

impl CoordinateTree {
    /// Depth at which leaves sit, a bare leaf being depth 1.
    ///
    /// `Ok(None)` means the tree holds no leaves at all. Leaves at different
    /// depths are a `MalformedGeometry` error.
    pub fn leaf_depth(&self) -> Result<Option<usize>> {
        match self {
            CoordinateTree::Leaf(_) => Ok(Some(1)),
            CoordinateTree::Nested(children) => {
                let mut found: Option<usize> = None;
                for (index, child) in children.iter().enumerate() {
                    let Some(depth) = child.leaf_depth()? else {
                        continue;
                    };
                    match found {
                        None => found = Some(depth),
                        Some(existing) if existing != depth => {
                            return Err(Error::MalformedGeometry(format!(
                                "mixed nesting depth under one parent: child {} has depth {}, earlier children {}",
                                index, depth, existing
                            )));
                        }
                        Some(_) => {}
                    }
                }
                Ok(found.map(|d| d + 1))
            }
        }
    }

    fn into_leaf(self) -> Result<Coordinate> {
        match self {
            CoordinateTree::Leaf(c) => Ok(c),
            CoordinateTree::Nested(_) => Err(Error::MalformedGeometry(
                "expected a position, found a nested list".to_string(),
            )),
        }
    }

    fn into_nested(self) -> Result<Vec<CoordinateTree>> {
        match self {
            CoordinateTree::Nested(children) => Ok(children),
            CoordinateTree::Leaf(_) => Err(Error::MalformedGeometry(
                "expected a nested list, found a position".to_string(),
            )),
        }
    }

    fn into_points(self) -> Result<Vec<Coordinate>> {
        self.into_nested()?.into_iter().map(CoordinateTree::into_leaf).collect()
    }

    fn into_lines(self) -> Result<Vec<Vec<Coordinate>>> {
        self.into_nested()?.into_iter().map(CoordinateTree::into_points).collect()
    }
}
