//! Feature sources: the ArcGIS feature-service client, the ordered
//! first-non-empty resolver and a timed background worker around it.

mod client;
mod resolver;
pub(crate) mod worker;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ureq::Agent;

pub use client::*;
pub use resolver::*;
pub use worker::*;

use crate::types::{FeatureCollection, Filter};

/// One queryable layer endpoint, e.g. `.../MapServer/3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub url: String,
}

impl SourceSpec {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Failure of a single source. Never escapes the resolver.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] ureq::Error),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// The external fetch collaborator: run `filter` against one source.
pub trait FeatureFetcher {
    fn fetch(&self, source: &SourceSpec, filter: &Filter) -> Result<FeatureCollection, FetchError>;
}

impl<T: FeatureFetcher + ?Sized> FeatureFetcher for &T {
    fn fetch(&self, source: &SourceSpec, filter: &Filter) -> Result<FeatureCollection, FetchError> {
        (**self).fetch(source, filter)
    }
}

impl<T: FeatureFetcher + ?Sized> FeatureFetcher for Arc<T> {
    fn fetch(&self, source: &SourceSpec, filter: &Filter) -> Result<FeatureCollection, FetchError> {
        (**self).fetch(source, filter)
    }
}

#[derive(Clone)]
pub struct ArcGisClient {
    pub agent: Agent,
}

impl Default for ArcGisClient {
    fn default() -> Self {
        ArcGisClient::new(Duration::from_secs(30))
    }
}

impl ArcGisClient {
    pub fn new(timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        let agent: Agent = config.into();
        ArcGisClient { agent }
    }
}
