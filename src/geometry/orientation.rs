use crate::types::{Coordinate, Geometry, Polygon, Ring};

/// Smallest vertex count of a closed ring (triangle plus closing point).
const MIN_RING_LEN: usize = 4;

/// Shoelace sum over consecutive vertex pairs, `(x1 - x0) * (y1 + y0)`.
///
/// Positive means clockwise with the y axis pointing up. This is the only
/// winding test used anywhere in the crate.
pub fn shoelace(ring: &[Coordinate]) -> f64 {
    ring.windows(2)
        .map(|w| (w[1].x - w[0].x) * (w[1].y + w[0].y))
        .sum()
}

pub fn is_clockwise(ring: &[Coordinate]) -> bool {
    shoelace(ring) > 0.0
}

fn oriented(ring: &Ring, clockwise: bool) -> Ring {
    if ring.len() < MIN_RING_LEN || is_clockwise(ring) == clockwise {
        return ring.clone();
    }
    ring.iter().rev().copied().collect()
}

/// Outer ring clockwise, holes counter-clockwise.
pub fn normalize_polygon(polygon: &Polygon) -> Polygon {
    let rings = polygon
        .rings
        .iter()
        .enumerate()
        .map(|(index, ring)| oriented(ring, index == 0))
        .collect();
    Polygon { rings }
}

/// Rewrites ring order of polygonal geometries; everything else is returned
/// as is.
pub fn normalize(geometry: &Geometry) -> Geometry {
    match geometry {
        Geometry::Polygon(polygon) => Geometry::Polygon(normalize_polygon(polygon)),
        Geometry::MultiPolygon(polygons) => {
            Geometry::MultiPolygon(polygons.iter().map(normalize_polygon).collect())
        }
        other => other.clone(),
    }
}
