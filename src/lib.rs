pub mod error;
pub mod export;
pub mod geometry;
pub mod projection;
pub mod settings;
pub mod source;
pub mod types;

pub use error::{Error, Result};
