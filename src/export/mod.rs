//! Export side of the pipeline: shapefile and KML encoders, artifact sinks
//! and the [`Exporter`] that wires a resolve to them.

mod kml;
mod pipeline;
mod shp;
mod sink;

pub use kml::*;
pub use pipeline::*;
pub use shp::*;
pub use sink::*;
