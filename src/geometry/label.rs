//! Label placement by pole of inaccessibility.
//!
//! The search starts from a grid of square cells covering the outer ring's
//! bounding box and keeps a max-heap ordered by each cell's upper bound on
//! the distance any of its points can have to the boundary. Cells whose bound
//! cannot beat the best known point by more than `precision` are dropped, the
//! rest are split into four.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::consts::SQRT_2;

use geo::{Area, BoundingRect, Centroid, Contains, Distance, Euclidean, Point};
use tracing::trace;

use crate::types::{Coordinate, Geometry, LabelPoint, Polygon};

/// Upper limit on seed cells along the longer bounding-box side.
const MAX_SEED_CELLS_PER_SIDE: f64 = 64.0;

#[derive(Debug, Clone, Copy)]
struct Cell {
    x: f64,
    y: f64,
    /// Half the cell side.
    h: f64,
    /// Signed distance from the centre to the boundary, negative outside.
    d: f64,
    /// Upper bound of `d` over the whole cell.
    max: f64,
}

impl Cell {
    fn new(x: f64, y: f64, h: f64, polygon: &geo::Polygon<f64>, ceiling: f64) -> Self {
        let d = signed_distance(Point::new(x, y), polygon);
        Cell {
            x,
            y,
            h,
            d,
            max: (d + h * SQRT_2).min(ceiling),
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.max.total_cmp(&other.max) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        self.max.total_cmp(&other.max)
    }
}

fn signed_distance(point: Point<f64>, polygon: &geo::Polygon<f64>) -> f64 {
    let dist = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .filter(|ring| !ring.0.is_empty())
        .map(|ring| Euclidean.distance(&point, ring))
        .fold(f64::INFINITY, f64::min);
    if polygon.contains(&point) { dist } else { -dist }
}

/// Signed distance from `(x, y)` to the nearest ring edge: positive inside the
/// polygon (inside the outer ring and outside every hole), negative outside.
pub fn point_to_polygon_distance(x: f64, y: f64, polygon: &Polygon) -> f64 {
    signed_distance(Point::new(x, y), &polygon.to_geo())
}

/// Approximate pole of inaccessibility of a single polygon.
///
/// Returns the point and its distance to the boundary, or `None` when the
/// polygon has no outer ring or no area. The returned distance is within
/// `precision` of the true optimum.
pub fn polylabel(polygon: &Polygon, precision: f64) -> Option<(Coordinate, f64)> {
    let outer = polygon.exterior().filter(|ring| !ring.is_empty())?;
    let geo_polygon = polygon.to_geo();
    if geo_polygon.unsigned_area() <= 0.0 {
        return None;
    }

    let bbox = geo_polygon.bounding_rect()?;
    let (min_x, min_y) = (bbox.min().x, bbox.min().y);
    let (width, height) = (bbox.width(), bbox.height());
    if width.min(height) <= 0.0 {
        return None;
    }

    // no inscribed circle can be wider than the shorter bbox side
    let ceiling = width.min(height) / 2.0;
    let cell_size = width
        .min(height)
        .max(precision)
        .max(width.max(height) / MAX_SEED_CELLS_PER_SIDE);
    let precision = precision.max(cell_size * f64::EPSILON);
    let min_half = cell_size * 1e-12;
    let cell = |x: f64, y: f64, h: f64| Cell::new(x, y, h, &geo_polygon, ceiling);

    let mut h = cell_size / 2.0;
    let mut queue = BinaryHeap::new();
    let mut x = min_x;
    while x < min_x + width {
        let mut y = min_y;
        while y < min_y + height {
            queue.push(cell(x + h, y + h, h));
            y += cell_size;
        }
        x += cell_size;
    }

    let seed = geo_polygon
        .centroid()
        .map(|p| (p.x(), p.y()))
        .unwrap_or((outer[0].x, outer[0].y));
    let mut best = cell(seed.0, seed.1, 0.0);

    let bbox_cell = cell(min_x + width / 2.0, min_y + height / 2.0, 0.0);
    if bbox_cell.d > best.d {
        best = bbox_cell;
    }

    let mut probes = queue.len();
    while let Some(next) = queue.pop() {
        if next.d > best.d {
            best = next;
        }
        if best.d > 0.0 && ceiling - best.d <= precision {
            break;
        }

        let settled = if best.d > 0.0 {
            next.max - best.d <= precision
        } else {
            // no interior point found yet; only cells that may hold one matter
            next.max <= 0.0
        };
        if settled || next.h < min_half {
            continue;
        }

        h = next.h / 2.0;
        queue.push(cell(next.x - h, next.y - h, h));
        queue.push(cell(next.x + h, next.y - h, h));
        queue.push(cell(next.x - h, next.y + h, h));
        queue.push(cell(next.x + h, next.y + h, h));
        probes += 4;
    }

    trace!(probes, distance = best.d, "pole of inaccessibility search finished");
    Some((Coordinate::new(best.x, best.y), best.d))
}

fn polygon_label(polygon: &Polygon, precision: f64) -> LabelPoint {
    let area = polygon.to_geo().unsigned_area();
    match polylabel(polygon, precision) {
        Some((point, _)) if area > 0.0 => LabelPoint { point, area },
        _ => LabelPoint::NONE,
    }
}

/// Label anchor for a polygonal geometry.
///
/// For a multipolygon every part is searched and the part with the largest
/// area wins; the first part wins a tie. Degenerate or non-polygonal input
/// yields [`LabelPoint::NONE`].
pub fn locate_label(geometry: &Geometry, precision: f64) -> LabelPoint {
    match geometry {
        Geometry::Polygon(polygon) => polygon_label(polygon, precision),
        Geometry::MultiPolygon(polygons) => {
            let mut best = LabelPoint::NONE;
            for polygon in polygons {
                let candidate = polygon_label(polygon, precision);
                if candidate.area > best.area {
                    best = candidate;
                }
            }
            best
        }
        _ => LabelPoint::NONE,
    }
}

pub fn locate(geometry: &Geometry, precision: f64) -> Coordinate {
    locate_label(geometry, precision).point
}
