use std::fmt;

use thiserror::Error;

use crate::types::Filter;

/// Index path of a leaf inside a coordinate tree, outermost index first.
///
/// For a polygon `[2, 7]` is ring 2, point 7. For a multipolygon
/// `[0, 1, 3]` is polygon 0, ring 1, point 3.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatePath(pub Vec<usize>);

impl fmt::Display for CoordinatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for index in &self.0 {
            write!(f, "[{}]", index)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("projection failed at coordinate {path}: {reason}")]
    ProjectionFailure { path: CoordinatePath, reason: String },

    #[error("no data found in any source for {filter}")]
    NoDataFound { filter: Filter },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("malformed geometry: {0}")]
    MalformedGeometry(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("timed out waiting for feature sources")]
    Timeout,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
