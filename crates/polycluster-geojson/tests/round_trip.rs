//! Integration test: read a small observation collection, cluster it,
//! and write the cluster ids back out.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use polycluster_geojson::{
    CLUSTER_ID_PROPERTY, GeoJsonError, parse_feature_collection, write_feature_collection,
};
use polycluster_pipeline::{ClusterConfig, ClusterError, cluster};
use serde_json::Value;

/// Three overlapping footprints (the third two hours after the others)
/// and one far away, with RFC 3339 timestamps.
const OBSERVATIONS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [2, 0], [2, 2], [0, 2], [0, 0]]] },
            "properties": { "timestamp": "2023-11-14T22:13:20Z", "sensor": "a" }
        },
        {
            "type": "Feature",
            "geometry": { "type": "Polygon", "coordinates": [[[1, 0.5], [3, 0.5], [3, 2.5], [1, 2.5], [1, 0.5]]] },
            "properties": { "timestamp": "2023-11-14T22:18:20Z", "sensor": "b" }
        },
        {
            "type": "Feature",
            "geometry": { "type": "Polygon", "coordinates": [[[0.5, 1], [2.5, 1], [2.5, 3], [0.5, 3], [0.5, 1]]] },
            "properties": { "timestamp": "2023-11-15T00:13:20Z", "sensor": "a" }
        },
        {
            "type": "Feature",
            "geometry": { "type": "Polygon", "coordinates": [[[50, 50], [52, 50], [52, 52], [50, 52], [50, 50]]] },
            "properties": { "timestamp": 1700000100, "sensor": "c" }
        }
    ]
}"#;

fn cluster_ids_of(written: &str) -> Vec<i64> {
    let output: Value = serde_json::from_str(written).unwrap();
    output["features"]
        .as_array()
        .unwrap()
        .iter()
        .map(|feature| feature["properties"][CLUSTER_ID_PROPERTY].as_i64().unwrap())
        .collect()
}

fn run(time_threshold: Option<f64>, min_cluster_size: usize) -> Vec<i64> {
    let dataset = parse_feature_collection(OBSERVATIONS, Some("timestamp")).unwrap();
    let config = ClusterConfig {
        time_threshold,
        min_cluster_size,
        ..ClusterConfig::default()
    };
    let result = cluster(dataset.items(), &config).unwrap();
    let written = write_feature_collection(&dataset, &result.cluster_ids).unwrap();
    cluster_ids_of(&written)
}

#[test]
fn short_window_splits_late_observation() {
    assert_eq!(run(Some(600.0), 1), vec![0, 0, 1, 2]);
}

#[test]
fn long_window_merges_late_observation() {
    assert_eq!(run(Some(7200.0), 1), vec![0, 0, 0, 1]);
}

#[test]
fn min_cluster_size_writes_noise() {
    assert_eq!(run(Some(7200.0), 3), vec![0, 0, 0, -1]);
}

#[test]
fn spatial_only_ignores_timestamps() {
    assert_eq!(run(None, 1), vec![0, 0, 0, 1]);
}

#[test]
fn properties_survive_the_round_trip() {
    let dataset = parse_feature_collection(OBSERVATIONS, Some("timestamp")).unwrap();
    let result = cluster(dataset.items(), &ClusterConfig::default()).unwrap();
    let written = write_feature_collection(&dataset, &result.cluster_ids).unwrap();
    let reread = parse_feature_collection(&written, Some("timestamp")).unwrap();

    assert_eq!(reread.items(), dataset.items());
    for (before, after) in dataset.attributes().iter().zip(reread.attributes()) {
        assert_eq!(before.properties["sensor"], after.properties["sensor"]);
        assert_eq!(before.properties["timestamp"], after.properties["timestamp"]);
    }
}

#[test]
fn missing_time_key_surfaces_as_configuration_error() {
    let dataset = parse_feature_collection(OBSERVATIONS, Some("observed_at")).unwrap();
    assert!(dataset.items().iter().all(|item| item.timestamp.is_none()));

    let config = ClusterConfig {
        time_threshold: Some(600.0),
        ..ClusterConfig::default()
    };
    let err = cluster(dataset.items(), &config).expect_err("timestamps are missing");
    assert!(matches!(err, ClusterError::InvalidArgument(_)));
}

#[test]
fn mismatched_ids_are_rejected() {
    let dataset = parse_feature_collection(OBSERVATIONS, None).unwrap();
    let result = cluster(&dataset.items()[..2], &ClusterConfig::default()).unwrap();
    let err = write_feature_collection(&dataset, &result.cluster_ids).unwrap_err();
    assert!(matches!(err, GeoJsonError::IdCountMismatch { features: 4, ids: 2 }));
}
