use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::types::{FeatureCollection, Filter, parse_feature_collection};

use super::{ArcGisClient, FeatureFetcher, FetchError, SourceSpec};

/// Highest layer id probed by [`ArcGisClient::discover_layers`].
pub const MAX_PROBED_LAYER: u32 = 5;

#[derive(Debug, Deserialize)]
struct LayerInfo {
    name: Option<String>,
}

impl ArcGisClient {
    fn get_string(&self, url: &str, params: &[(&str, &str)]) -> Result<String, FetchError> {
        let mut request = self.agent.get(url).header("Accept", "application/json");
        for (key, value) in params {
            request = request.query(*key, *value);
        }
        let mut response = request.call()?;
        if response.status() != 200 {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        Ok(response.body_mut().read_to_string()?)
    }

    /// Runs an exact-match attribute query against one layer and returns the
    /// features as GeoJSON-derived collections.
    pub fn query_features(&self, source: &SourceSpec, filter: &Filter) -> Result<FeatureCollection, FetchError> {
        let url = format!("{}/query", source.url.trim_end_matches('/'));
        let where_clause = filter.where_clause();
        info!("Fetching data from {} where {}", url, where_clause);

        let body = self.get_string(
            &url,
            &[
                ("where", where_clause.as_str()),
                ("outFields", "*"),
                ("returnGeometry", "true"),
                ("f", "geojson"),
            ],
        )?;
        debug!("Data received from {}: {} bytes", url, body.len());

        parse_feature_collection(&body).map_err(|e| FetchError::Malformed(e.to_string()))
    }

    /// Name of layer `layer` under a MapServer base url.
    pub fn layer_name(&self, base_url: &str, layer: u32) -> Result<Option<String>, FetchError> {
        let url = format!("{}/{}", base_url.trim_end_matches('/'), layer);
        let body = self.get_string(&url, &[("f", "json")])?;
        let info: LayerInfo = serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;
        Ok(info.name)
    }

    /// Probes layer ids `0..=MAX_PROBED_LAYER` and maps each wanted layer
    /// name to the id serving it. Unreachable layers are skipped.
    pub fn discover_layers(&self, base_url: &str, wanted: &[String]) -> BTreeMap<String, u32> {
        let mut found = BTreeMap::new();
        for layer in 0..=MAX_PROBED_LAYER {
            match self.layer_name(base_url, layer) {
                Ok(Some(name)) if wanted.contains(&name) => {
                    info!("Layer {} is {}", layer, name);
                    found.insert(name, layer);
                }
                Ok(_) => {}
                Err(e) => warn!("Error checking layer {}: {}", layer, e),
            }
        }
        found
    }
}

impl FeatureFetcher for ArcGisClient {
    fn fetch(&self, source: &SourceSpec, filter: &Filter) -> Result<FeatureCollection, FetchError> {
        self.query_features(source, filter)
    }
}
