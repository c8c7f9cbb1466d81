use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::types::{FeatureCollection, Filter};

use super::{FeatureFetcher, SourceSpec};

/// Tries each source in order and stops at the first one that answers with
/// at least one feature.
///
/// Fetches run one after another; a later source is never contacted once an
/// earlier one succeeds. Per-source errors are logged and skipped.
pub fn resolve<F: FeatureFetcher>(fetcher: &F, sources: &[SourceSpec], filter: &Filter) -> Result<FeatureCollection> {
    for (index, source) in sources.iter().enumerate() {
        info!(
            "Querying source {}/{} ({}) for {}",
            index + 1,
            sources.len(),
            source.name,
            filter
        );
        match fetcher.fetch(source, filter) {
            Ok(collection) if !collection.is_empty() => {
                info!("Source {} returned {} features", source.name, collection.len());
                return Ok(collection);
            }
            Ok(_) => info!("Source {} returned no features", source.name),
            Err(e) => warn!("Error fetching data from {}: {}", source.name, e),
        }
    }

    Err(Error::NoDataFound { filter: filter.clone() })
}

/// A fetcher bound to its ordered source list.
#[derive(Clone)]
pub struct FeatureSourceResolver<F> {
    fetcher: F,
    sources: Vec<SourceSpec>,
}

impl<F: FeatureFetcher> FeatureSourceResolver<F> {
    pub fn new(fetcher: F, sources: Vec<SourceSpec>) -> Self {
        Self { fetcher, sources }
    }

    pub fn sources(&self) -> &[SourceSpec] {
        &self.sources
    }

    pub fn resolve(&self, filter: &Filter) -> Result<FeatureCollection> {
        resolve(&self.fetcher, &self.sources, filter)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::source::FetchError;
    use crate::types::{Coordinate, Feature, Geometry};

    pub(crate) enum Canned {
        Features(usize),
        Fail,
    }

    /// Fetcher answering from a fixed table and recording every call.
    pub(crate) struct ScriptedFetcher {
        pub answers: HashMap<String, Canned>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        pub fn new(answers: Vec<(&str, Canned)>) -> Self {
            Self {
                answers: answers.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl FeatureFetcher for ScriptedFetcher {
        fn fetch(&self, source: &SourceSpec, _filter: &Filter) -> std::result::Result<FeatureCollection, FetchError> {
            self.calls.lock().unwrap().push(source.name.clone());
            match self.answers.get(&source.name) {
                Some(Canned::Features(n)) => Ok((0..*n)
                    .map(|i| Feature::new(Geometry::Point(Coordinate::new(i as f64, 0.0))))
                    .collect()),
                Some(Canned::Fail) | None => Err(FetchError::Status(500)),
            }
        }
    }

    fn specs(names: &[&str]) -> Vec<SourceSpec> {
        names
            .iter()
            .map(|n| SourceSpec::new(*n, format!("https://example.test/{}", n)))
            .collect()
    }

    #[test]
    fn first_non_empty_source_wins() {
        let fetcher = ScriptedFetcher::new(vec![
            ("A", Canned::Features(0)),
            ("B", Canned::Features(2)),
            ("C", Canned::Features(5)),
        ]);
        let filter = Filter::new("TENURE_ID", "X");
        let collection = resolve(&fetcher, &specs(&["A", "B", "C"]), &filter).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(fetcher.calls(), vec!["A", "B"]);
    }

    #[test]
    fn errors_are_skipped() {
        let fetcher = ScriptedFetcher::new(vec![("A", Canned::Fail), ("B", Canned::Features(1))]);
        let resolver = FeatureSourceResolver::new(&fetcher, specs(&["A", "B"]));
        assert_eq!(resolver.resolve(&Filter::new("TENURE_ID", "X")).unwrap().len(), 1);
    }

    #[test]
    fn all_failing_is_no_data_found() {
        let fetcher = ScriptedFetcher::new(vec![("A", Canned::Fail), ("B", Canned::Fail)]);
        let filter = Filter::new("TENURE_ID", "HKT-08031");
        match resolve(&fetcher, &specs(&["A", "B"]), &filter) {
            Err(Error::NoDataFound { filter: attempted }) => assert_eq!(attempted, filter),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(fetcher.calls(), vec!["A", "B"]);
    }

    #[test]
    fn empty_source_list_is_no_data_found() {
        let fetcher = ScriptedFetcher::new(vec![]);
        assert!(matches!(
            resolve(&fetcher, &[], &Filter::new("TENURE_ID", "X")),
            Err(Error::NoDataFound { .. })
        ));
    }
}
