use tracing::info;

use crate::error::{Error, Result};
use crate::geometry::{locate_label, normalize, transform_geometry};
use crate::projection::{Projector, crs_code};
use crate::settings::ExportConfig;
use crate::source::{FeatureFetcher, FeatureSourceResolver, spawn_resolve};
use crate::types::{Coordinate, Feature, FeatureCollection, LabelPoint};

use super::{Artifact, ArtifactSink, encode_kml, encode_shapefiles};

/// Reprojects every feature and normalizes ring orientation. Attributes are
/// copied as they are. The first failing coordinate aborts the whole
/// collection.
pub fn prepare_collection(collection: &FeatureCollection, projector: &Projector) -> Result<FeatureCollection> {
    collection
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            let projected = transform_geometry(&feature.geometry, |c| projector.project(c)).map_err(|e| match e {
                Error::ProjectionFailure { path, reason } => Error::ProjectionFailure {
                    path,
                    reason: format!("feature {}: {}", index, reason),
                },
                other => other,
            })?;
            Ok(Feature {
                geometry: normalize(&projected),
                attributes: feature.attributes.clone(),
            })
        })
        .collect()
}

/// Folder holding the shapefile bundles of one export, `{code}_EPSG-{n}`.
pub fn bundle_folder(code: &str, target: &str) -> String {
    format!("{}_EPSG-{}", code, crs_code(target))
}

/// Encodes the shapefile bundles of `collection` (already projected) under
/// [`bundle_folder`].
pub fn shapefile_artifacts(collection: &FeatureCollection, code: &str, target: &str, prj: &str) -> Result<Vec<Artifact>> {
    let folder = bundle_folder(code, target);
    let bundles = encode_shapefiles(collection, prj, code)?;
    Ok(bundles
        .iter()
        .flat_map(|bundle| {
            bundle
                .files()
                .into_iter()
                .map(|(file, bytes)| Artifact::new(format!("{}/{}", folder, file), bytes))
                .collect::<Vec<_>>()
        })
        .collect())
}

/// `{code}.kml` for the untransformed collection, whose coordinates are in
/// `source`.
pub fn kml_artifact(collection: &FeatureCollection, source: &str, code: &str) -> Result<Artifact> {
    Ok(Artifact::new(format!("{}.kml", code), encode_kml(collection, source, code)?))
}

/// Resolve, transform, encode and store, driven by an [`ExportConfig`].
pub struct Exporter<F> {
    config: ExportConfig,
    resolver: FeatureSourceResolver<F>,
}

impl<F> Exporter<F>
where
    F: FeatureFetcher + Clone + Send + 'static,
{
    pub fn new(config: ExportConfig, fetcher: F) -> Self {
        let resolver = FeatureSourceResolver::new(fetcher, config.sources.clone());
        Self { config, resolver }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Geographic features for `code`, bounded by the configured resolve
    /// timeout.
    pub fn fetch(&self, code: &str) -> Result<FeatureCollection> {
        let filter = self.config.filter(code);
        spawn_resolve(self.resolver.clone(), filter).wait(self.config.resolve_timeout())
    }

    /// Features for `code` projected into `target` with normalized rings.
    pub fn fetch_projected(&self, code: &str, target: &str) -> Result<FeatureCollection> {
        let projector = self.config.projector(target)?;
        let collection = self.fetch(code)?;
        prepare_collection(&collection, &projector)
    }

    /// Writes one bundle per geometry family present. Nothing reaches
    /// `sink` unless every bundle encoded.
    pub fn export_shapefile(&self, code: &str, target: &str, sink: &dyn ArtifactSink) -> Result<Vec<String>> {
        let projector = self.config.projector(target)?;
        let collection = self.fetch(code)?;
        info!("Transforming {} features to {}", collection.len(), projector.to_id());
        let prepared = prepare_collection(&collection, &projector)?;

        let artifacts = shapefile_artifacts(
            &prepared,
            code,
            projector.to_id(),
            &self.config.prj_descriptor(projector.to_id()),
        )?;
        sink.store_all(&artifacts)?;
        info!("Exported {} files for {}", artifacts.len(), code);
        Ok(artifacts.into_iter().map(|a| a.name).collect())
    }

    pub fn export_kml(&self, code: &str, sink: &dyn ArtifactSink) -> Result<String> {
        let collection = self.fetch(code)?;
        let artifact = kml_artifact(&collection, &self.config.source_crs, code)?;
        sink.store_all(std::slice::from_ref(&artifact))?;
        info!("Exported {}", artifact.name);
        Ok(artifact.name)
    }

    /// Label point of the first feature, in the source system or projected
    /// into `target`.
    pub fn label(&self, code: &str, target: Option<&str>) -> Result<LabelPoint> {
        let collection = match target {
            Some(target) => self.fetch_projected(code, target)?,
            None => self.fetch(code)?,
        };
        let first = collection.first().ok_or_else(|| Error::NoDataFound {
            filter: self.config.filter(code),
        })?;
        Ok(locate_label(&first.geometry, self.config.label_precision))
    }

    /// Distinct vertices of the first feature, optionally projected.
    pub fn vertices(&self, code: &str, target: Option<&str>) -> Result<Vec<Coordinate>> {
        let collection = match target {
            Some(target) => self.fetch_projected(code, target)?,
            None => self.fetch(code)?,
        };
        Ok(collection.first().map(|f| f.geometry.vertices()).unwrap_or_default())
    }
}
