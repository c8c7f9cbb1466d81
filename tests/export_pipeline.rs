use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use quick_xml::Reader;
use quick_xml::events::Event;

use tenure_export::Error;
use tenure_export::export::{ArtifactSink, Exporter, MemorySink};
use tenure_export::geometry::is_clockwise;
use tenure_export::settings::ExportConfig;
use tenure_export::source::{FeatureFetcher, FetchError, SourceSpec};
use tenure_export::types::{Coordinate, FeatureCollection, Filter, parse_feature_collection};

const TENURE: &str = r#"{
  "type": "FeatureCollection",
  "features": [{
    "type": "Feature",
    "properties": { "TENURE_ID": "HKT-08031", "MODALIDAD": "CONTRATO DE CONCESION", "AREA_HA": 98.1432 },
    "geometry": {
      "type": "Polygon",
      "coordinates": [[[-74.1, 4.6], [-74.0, 4.6], [-74.0, 4.7], [-74.1, 4.7], [-74.1, 4.6]]]
    }
  }]
}"#;

/// Serves canned GeoJSON per source name and records what was asked.
#[derive(Clone, Default)]
struct InMemoryFetcher {
    bodies: Arc<HashMap<String, String>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl InMemoryFetcher {
    fn new(bodies: &[(&str, &str)]) -> Self {
        Self {
            bodies: Arc::new(bodies.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
            calls: Arc::default(),
        }
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl FeatureFetcher for InMemoryFetcher {
    fn fetch(&self, source: &SourceSpec, filter: &Filter) -> Result<FeatureCollection, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((source.name.clone(), filter.where_clause()));
        match self.bodies.get(&source.name) {
            Some(body) => parse_feature_collection(body).map_err(|e| FetchError::Malformed(e.to_string())),
            None => Err(FetchError::Status(404)),
        }
    }
}

fn config() -> ExportConfig {
    ExportConfig {
        sources: vec![
            SourceSpec::new("titles", "https://example.test/MapServer/3"),
            SourceSpec::new("requests", "https://example.test/MapServer/4"),
        ],
        ..ExportConfig::default()
    }
}

const EMPTY: &str = r#"{"type": "FeatureCollection", "features": []}"#;

#[test]
fn shapefile_export_falls_through_to_second_source() {
    let fetcher = InMemoryFetcher::new(&[("titles", EMPTY), ("requests", TENURE)]);
    let exporter = Exporter::new(config(), fetcher.clone());
    let sink = MemorySink::new();

    let names = exporter.export_shapefile("HKT-08031", "9377", &sink).unwrap();
    assert_eq!(
        names,
        vec![
            "HKT-08031_EPSG-9377/HKT-08031.shp",
            "HKT-08031_EPSG-9377/HKT-08031.shx",
            "HKT-08031_EPSG-9377/HKT-08031.dbf",
            "HKT-08031_EPSG-9377/HKT-08031.prj",
        ]
    );
    assert_eq!(
        fetcher.calls(),
        vec![
            ("titles".to_string(), "TENURE_ID='HKT-08031'".to_string()),
            ("requests".to_string(), "TENURE_ID='HKT-08031'".to_string()),
        ]
    );

    let stored = sink.artifacts();
    let shp = &stored[0].bytes;
    let shapes = shapefile::ShapeReader::new(Cursor::new(shp.clone()))
        .unwrap()
        .read()
        .unwrap();
    assert_eq!(shapes.len(), 1);
    let shapefile::Shape::Polygon(polygon) = &shapes[0] else {
        panic!("expected a polygon shape");
    };
    let outer: Vec<Coordinate> = polygon.rings()[0]
        .points()
        .iter()
        .map(|p| Coordinate::new(p.x, p.y))
        .collect();
    assert!(is_clockwise(&outer));
    assert!(outer.iter().all(|c| (4_800_000.0..5_000_000.0).contains(&c.x)));

    let prj = String::from_utf8(stored[3].bytes.clone()).unwrap();
    assert!(prj.contains("Transverse_Mercator"));
}

#[test]
fn kml_export_keeps_geographic_coordinates() {
    let exporter = Exporter::new(config(), InMemoryFetcher::new(&[("titles", TENURE)]));
    let sink = MemorySink::new();
    let name = exporter.export_kml("HKT-08031", &sink).unwrap();
    assert_eq!(name, "HKT-08031.kml");

    let stored = sink.artifacts();
    assert_eq!(stored.len(), 1);
    let mut reader = Reader::from_reader(stored[0].bytes.as_slice());
    let mut buf = Vec::new();
    let mut in_coordinates = false;
    let mut coordinates = String::new();
    loop {
        match reader.read_event_into(&mut buf).unwrap() {
            Event::Start(e) => in_coordinates = e.name().as_ref() == b"coordinates",
            Event::End(_) => in_coordinates = false,
            Event::Text(t) if in_coordinates => coordinates.push_str(&t.unescape().unwrap()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    let first = coordinates.split_whitespace().next().unwrap();
    assert_eq!(first, "-74.1,4.6,0");
    assert_eq!(coordinates.split_whitespace().count(), 5);
}

#[test]
fn nothing_is_stored_when_no_source_answers() {
    let exporter = Exporter::new(config(), InMemoryFetcher::new(&[("titles", EMPTY)]));
    let sink = MemorySink::new();
    match exporter.export_shapefile("NOPE-1", "EPSG:4686", &sink) {
        Err(Error::NoDataFound { filter }) => assert_eq!(filter.value, "NOPE-1"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(sink.artifacts().is_empty());
}

#[test]
fn projection_failure_stores_nothing() {
    let far_north = TENURE.replace("4.7", "91.0");
    let exporter = Exporter::new(config(), InMemoryFetcher::new(&[("titles", far_north.as_str())]));
    let sink = MemorySink::new();
    match exporter.export_shapefile("HKT-08031", "EPSG:9377", &sink) {
        Err(Error::ProjectionFailure { path, .. }) => assert_eq!(path.0, vec![0, 2]),
        other => panic!("unexpected {:?}", other),
    }
    assert!(sink.artifacts().is_empty());
}

#[test]
fn label_and_vertices_of_first_feature() {
    let exporter = Exporter::new(config(), InMemoryFetcher::new(&[("titles", TENURE)]));
    let label = exporter.label("HKT-08031", None).unwrap();
    assert!(label.is_usable());
    assert!((label.point.x - -74.05).abs() < 1e-3);
    assert!((label.point.y - 4.65).abs() < 1e-3);

    let vertices = exporter.vertices("HKT-08031", None).unwrap();
    assert_eq!(vertices.len(), 4);
    assert_eq!(vertices[0], Coordinate::new(-74.1, 4.6));
}

#[test]
fn sink_trait_is_object_safe() {
    let sink: Box<dyn ArtifactSink> = Box::new(MemorySink::new());
    sink.store("x", b"y").unwrap();
}

#[test]
fn kml_export_needs_a_geographic_source() {
    let config = ExportConfig {
        source_crs: "EPSG:9377".to_string(),
        ..config()
    };
    let exporter = Exporter::new(config, InMemoryFetcher::new(&[("titles", TENURE)]));
    let sink = MemorySink::new();
    assert!(matches!(exporter.export_kml("HKT-08031", &sink), Err(Error::Encoding(_))));
    assert!(sink.artifacts().is_empty());
}

#[test]
fn degenerate_line_is_an_encoding_error() {
    let stub = r#"{"type": "FeatureCollection", "features": [{"type": "Feature",
        "properties": {"TENURE_ID": "HKT-08031"},
        "geometry": {"type": "LineString", "coordinates": [[-74.1, 4.6]]}}]}"#;
    let exporter = Exporter::new(config(), InMemoryFetcher::new(&[("titles", stub)]));
    let sink = MemorySink::new();
    match exporter.export_shapefile("HKT-08031", "EPSG:9377", &sink) {
        Err(Error::Encoding(message)) => assert!(message.contains("feature 0"), "{}", message),
        other => panic!("unexpected {:?}", other),
    }
    assert!(sink.artifacts().is_empty());
}
