use std::fmt::Display;

use crate::error::{CoordinatePath, Error, Result};
use crate::types::{Coordinate, CoordinateTree, Geometry};

/// Applies `project` to every leaf of `tree`, returning a new tree with the
/// same nesting and order.
///
/// The tree is checked for mixed nesting depth before any leaf is projected.
/// A failing or non-finite projection aborts the whole walk and reports the
/// index path of the offending leaf.
pub fn transform<F, E>(tree: &CoordinateTree, mut project: F) -> Result<CoordinateTree>
where
    F: FnMut(Coordinate) -> std::result::Result<Coordinate, E>,
    E: Display,
{
    tree.leaf_depth()?;
    let mut path = Vec::new();
    walk(tree, &mut project, &mut path)
}

fn walk<F, E>(node: &CoordinateTree, project: &mut F, path: &mut Vec<usize>) -> Result<CoordinateTree>
where
    F: FnMut(Coordinate) -> std::result::Result<Coordinate, E>,
    E: Display,
{
    match node {
        CoordinateTree::Leaf(coordinate) => {
            let projected = project(*coordinate).map_err(|e| Error::ProjectionFailure {
                path: CoordinatePath(path.clone()),
                reason: e.to_string(),
            })?;
            if !projected.is_finite() {
                return Err(Error::ProjectionFailure {
                    path: CoordinatePath(path.clone()),
                    reason: format!(
                        "({}, {}) projected to non-finite ({}, {})",
                        coordinate.x, coordinate.y, projected.x, projected.y
                    ),
                });
            }
            Ok(CoordinateTree::Leaf(projected))
        }
        CoordinateTree::Nested(children) => {
            let mut out = Vec::with_capacity(children.len());
            for (index, child) in children.iter().enumerate() {
                path.push(index);
                out.push(walk(child, project, path)?);
                path.pop();
            }
            Ok(CoordinateTree::Nested(out))
        }
    }
}

/// Reprojects a typed geometry through its coordinate tree.
pub fn transform_geometry<F, E>(geometry: &Geometry, project: F) -> Result<Geometry>
where
    F: FnMut(Coordinate) -> std::result::Result<Coordinate, E>,
    E: Display,
{
    let tree = transform(&geometry.to_tree(), project)?;
    Geometry::from_tree(geometry.kind(), tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Polygon;
    use std::convert::Infallible;

    fn identity(c: Coordinate) -> std::result::Result<Coordinate, Infallible> {
        Ok(c)
    }

    fn leaf(x: f64, y: f64) -> CoordinateTree {
        CoordinateTree::Leaf(Coordinate::new(x, y))
    }

    fn sample_polygon_tree() -> CoordinateTree {
        CoordinateTree::Nested(vec![
            CoordinateTree::Nested(vec![leaf(0.0, 0.0), leaf(0.0, 5.0), leaf(5.0, 5.0), leaf(0.0, 0.0)]),
            CoordinateTree::Nested(vec![leaf(1.0, 1.0), leaf(2.0, 1.0), leaf(2.0, 2.0), leaf(1.0, 1.0)]),
        ])
    }

    #[test]
    fn identity_preserves_structure() {
        let trees = vec![
            leaf(3.5, -2.0),
            CoordinateTree::Nested(vec![]),
            CoordinateTree::Nested(vec![CoordinateTree::Nested(vec![])]),
            sample_polygon_tree(),
            CoordinateTree::Nested(vec![sample_polygon_tree(), sample_polygon_tree()]),
        ];
        for tree in trees {
            assert_eq!(transform(&tree, identity).unwrap(), tree);
        }
    }

    #[test]
    fn applies_projection_to_every_leaf() {
        let out = transform(&sample_polygon_tree(), |c| {
            Ok::<_, Infallible>(Coordinate::new(c.x + 10.0, c.y * 2.0))
        })
        .unwrap();
        let CoordinateTree::Nested(rings) = out else {
            panic!("expected nested")
        };
        assert_eq!(rings[0], CoordinateTree::Nested(vec![
            leaf(10.0, 0.0),
            leaf(10.0, 10.0),
            leaf(15.0, 10.0),
            leaf(10.0, 0.0),
        ]));
    }

    #[test]
    fn failure_reports_leaf_path() {
        let err = transform(&sample_polygon_tree(), |c| {
            if c == Coordinate::new(2.0, 1.0) {
                Err("outside domain")
            } else {
                Ok(c)
            }
        })
        .unwrap_err();
        match err {
            Error::ProjectionFailure { path, reason } => {
                assert_eq!(path, CoordinatePath(vec![1, 1]));
                assert!(reason.contains("outside domain"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn non_finite_output_is_a_failure() {
        let err = transform(&sample_polygon_tree(), |c| {
            Ok::<_, Infallible>(Coordinate::new(c.x / 0.0, c.y))
        })
        .unwrap_err();
        assert!(matches!(err, Error::ProjectionFailure { ref path, .. } if path.0 == vec![0, 0]));
    }

    #[test]
    fn mixed_depth_is_rejected_before_projecting() {
        let tree = CoordinateTree::Nested(vec![leaf(0.0, 0.0), CoordinateTree::Nested(vec![leaf(1.0, 1.0)])]);
        let mut calls = 0;
        let err = transform(&tree, |c| {
            calls += 1;
            Ok::<_, Infallible>(c)
        })
        .unwrap_err();
        assert!(matches!(err, Error::MalformedGeometry(_)));
        assert_eq!(calls, 0);
    }

    #[test]
    fn typed_geometry_keeps_its_kind() {
        let geometry = Geometry::MultiPolygon(vec![Polygon::new(
            vec![
                Coordinate::new(0.0, 0.0),
                Coordinate::new(1.0, 0.0),
                Coordinate::new(1.0, 1.0),
                Coordinate::new(0.0, 0.0),
            ],
            vec![],
        )]);
        let moved = transform_geometry(&geometry, |c| Ok::<_, Infallible>(Coordinate::new(c.x + 1.0, c.y))).unwrap();
        assert_eq!(moved.kind(), geometry.kind());
        assert_eq!(moved.outer_ring().unwrap()[1], Coordinate::new(2.0, 0.0));
        // input untouched
        assert_eq!(geometry.outer_ring().unwrap()[1], Coordinate::new(1.0, 0.0));
    }
}
