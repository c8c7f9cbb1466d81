mod feature;
mod geojson_types;
mod geometry;

pub use feature::*;
pub use geojson_types::*;
pub use geometry::*;
