//! Geometry processing: reprojection walk, ring orientation and label
//! placement. Everything here is pure and allocation-only.

mod label;
mod orientation;
mod transform;

pub use label::*;
pub use orientation::*;
pub use transform::*;
