use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoordinatePath, Error, Result};
use crate::projection::{ProjectionRegistry, Projector, default_registry, normalize_crs_id};
use crate::source::SourceSpec;
use crate::types::Filter;

pub const DEFAULT_SERVICE_URL: &str =
    "https://annamineria.anm.gov.co/annageo/rest/services/SIGM/TenureLayers/MapServer";
pub const DEFAULT_FILTER_FIELD: &str = "TENURE_ID";
pub const DEFAULT_SOURCE_CRS: &str = "EPSG:4326";
pub const DEFAULT_TARGET_CRS: &str = "EPSG:4686";

/// Runtime configuration, read from TOML. Every field is optional in the
/// file; missing ones take the deployment defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Layers queried in order, first non-empty answer wins.
    pub sources: Vec<SourceSpec>,
    /// MapServer root probed by layer discovery.
    pub service_url: String,
    pub layer_names: Vec<String>,
    pub filter_field: String,
    /// System the feature service answers in.
    pub source_crs: String,
    /// Entries here are added to the built-in registry, replacing built-ins
    /// with the same identifier.
    pub projections: ProjectionRegistry,
    pub label_precision: f64,
    pub request_timeout_secs: u64,
    pub resolve_timeout_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                SourceSpec::new("Título Vigente", format!("{}/3", DEFAULT_SERVICE_URL)),
                SourceSpec::new("Solicitud Vigente", format!("{}/4", DEFAULT_SERVICE_URL)),
            ],
            service_url: DEFAULT_SERVICE_URL.to_string(),
            layer_names: vec!["Título Vigente".to_string(), "Solicitud Vigente".to_string()],
            filter_field: DEFAULT_FILTER_FIELD.to_string(),
            source_crs: DEFAULT_SOURCE_CRS.to_string(),
            projections: default_registry(),
            label_precision: 1e-6,
            request_timeout_secs: 30,
            resolve_timeout_secs: 120,
        }
    }
}

impl ExportConfig {
    pub fn from_toml_str(data: &str) -> Result<Self> {
        let mut config: ExportConfig =
            toml::from_str(data).map_err(|e| Error::Config(format!("invalid config: {}", e)))?;

        let mut registry = default_registry();
        registry.extend(
            std::mem::take(&mut config.projections)
                .into_iter()
                .map(|(id, entry)| (normalize_crs_id(&id), entry)),
        );
        config.projections = registry;
        config.source_crs = normalize_crs_id(&config.source_crs);
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.label_precision > 0.0 && self.label_precision.is_finite()) {
            return Err(Error::Config(format!(
                "label_precision must be a positive number, got {}",
                self.label_precision
            )));
        }
        if self.filter_field.trim().is_empty() {
            return Err(Error::Config("filter_field must not be empty".to_string()));
        }
        if !self.projections.contains_key(&self.source_crs) {
            return Err(Error::Config(format!(
                "source_crs {} is not a registered projection",
                self.source_crs
            )));
        }
        Ok(())
    }

    /// `config.toml` in the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("co", "anm", "tenure-export").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Loads `path` when given (it must exist), otherwise the default
    /// location if a file is there, otherwise the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        info!("Loading config from {}", path.display());
        let data = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&data)
    }

    pub fn filter(&self, code: &str) -> Filter {
        Filter::new(self.filter_field.clone(), code)
    }

    /// Projector from the source system to `target` (bare EPSG numbers are
    /// accepted).
    pub fn projector(&self, target: &str) -> Result<Projector> {
        let target = normalize_crs_id(target);
        Projector::new(&self.projections, &self.source_crs, &target).map_err(|e| Error::ProjectionFailure {
            path: CoordinatePath::default(),
            reason: e.to_string(),
        })
    }

    /// Text written to `.prj` files: the registered WKT, or the identifier
    /// itself when none is registered.
    pub fn prj_descriptor(&self, target: &str) -> String {
        let target = normalize_crs_id(target);
        self.projections
            .get(&target)
            .and_then(|entry| entry.wkt.clone())
            .unwrap_or(target)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }
}
