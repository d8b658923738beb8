//! End-to-end clustering scenarios over small hand-built datasets.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use geo::LineString;
use polycluster_pipeline::{
    Adjacency, ClusterConfig, ClusterError, ClusterId, Item, Polygon, cluster, cluster_polygons,
    find_overlapping_neighbors,
};

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
        vec![],
    )
}

fn ids(result: &[ClusterId]) -> Vec<i64> {
    result.iter().map(|id| id.get()).collect()
}

/// Four footprints: 0 and 1 overlap five minutes apart, 2 overlaps both
/// two hours later, 3 is far away.
fn observation_dataset() -> Vec<Item> {
    vec![
        Item::new(rect(0.0, 0.0, 2.0, 2.0)).with_timestamp(1_700_000_000.0),
        Item::new(rect(1.0, 0.5, 3.0, 2.5)).with_timestamp(1_700_000_300.0),
        Item::new(rect(0.5, 1.0, 2.5, 3.0)).with_timestamp(1_700_007_200.0),
        Item::new(rect(50.0, 50.0, 52.0, 52.0)).with_timestamp(1_700_000_100.0),
    ]
}

#[test]
fn observation_dataset_neighbors() {
    let geometries: Vec<_> = observation_dataset()
        .into_iter()
        .map(|item| item.geometry)
        .collect();
    let adjacency = find_overlapping_neighbors(&geometries, 10.0).unwrap();

    assert!(adjacency.contains(0, 1));
    assert!(adjacency.contains(0, 2));
    assert!(adjacency.contains(1, 0));
    assert!(adjacency.contains(1, 2));
    assert!(adjacency.contains(2, 0));
    assert!(adjacency.contains(2, 1));
    assert!(adjacency.neighbors(3).is_empty());
}

#[test]
fn small_time_window_separates_late_observation() {
    let config = ClusterConfig {
        time_threshold: Some(600.0),
        ..ClusterConfig::default()
    };
    let result = cluster(&observation_dataset(), &config).unwrap();
    let labels = ids(&result.cluster_ids);

    assert_eq!(labels[0], labels[1]);
    assert_ne!(labels[0], labels[2]);
    assert_ne!(labels[0], labels[3]);
    assert_eq!(labels, vec![0, 0, 1, 2]);
}

#[test]
fn large_time_window_merges_late_observation() {
    let config = ClusterConfig {
        time_threshold: Some(7200.0),
        ..ClusterConfig::default()
    };
    let result = cluster(&observation_dataset(), &config).unwrap();
    assert_eq!(ids(&result.cluster_ids), vec![0, 0, 0, 1]);
    assert_eq!(result.cluster_count, 2);
}

#[test]
fn min_cluster_size_marks_lone_observation_as_noise() {
    let config = ClusterConfig {
        time_threshold: Some(7200.0),
        min_cluster_size: 3,
        ..ClusterConfig::default()
    };
    let result = cluster(&observation_dataset(), &config).unwrap();
    assert_eq!(ids(&result.cluster_ids), vec![0, 0, 0, -1]);
}

#[test]
fn cluster_ids_are_sequential_after_noise() {
    let items = vec![
        Item::new(rect(10.0, 10.0, 11.0, 11.0)),
        Item::new(rect(0.0, 0.0, 1.0, 1.0)),
        Item::new(rect(0.5, 0.5, 1.5, 1.5)),
        Item::new(rect(20.0, 20.0, 21.0, 21.0)),
    ];
    let config = ClusterConfig {
        min_cluster_size: 2,
        ..ClusterConfig::default()
    };
    let result = cluster(&items, &config).unwrap();
    assert_eq!(ids(&result.cluster_ids), vec![-1, 0, 0, -1]);
}

#[test]
fn overlap_threshold_controls_cluster_membership() {
    let items = vec![
        Item::new(rect(0.0, 0.0, 1.0, 1.0)),
        Item::new(rect(0.2, 0.2, 1.2, 1.2)),
    ];
    let strict = ClusterConfig {
        overlap_threshold: 50.0,
        ..ClusterConfig::default()
    };
    let relaxed = ClusterConfig {
        overlap_threshold: 40.0,
        ..ClusterConfig::default()
    };
    assert_eq!(ids(&cluster(&items, &strict).unwrap().cluster_ids), vec![0, 1]);
    assert_eq!(ids(&cluster(&items, &relaxed).unwrap().cluster_ids), vec![0, 0]);
}

#[test]
fn empty_dataset() {
    let adjacency = find_overlapping_neighbors(&[], 0.0).unwrap();
    assert!(adjacency.is_empty());
    let result = cluster_polygons(&[], &adjacency, Some(3600.0), 2).unwrap();
    assert!(result.is_empty());
}

#[test]
fn temporal_filtering_without_timestamps_is_a_configuration_error() {
    let items = vec![
        Item::new(rect(0.0, 0.0, 1.0, 1.0)),
        Item::new(rect(0.5, 0.5, 1.5, 1.5)),
    ];
    let config = ClusterConfig {
        time_threshold: Some(ClusterConfig::DEFAULT_TIME_THRESHOLD),
        ..ClusterConfig::default()
    };
    let err = cluster(&items, &config).expect_err("missing timestamps must be rejected");
    assert!(matches!(err, ClusterError::InvalidArgument(_)));
    assert!(err.to_string().contains("item 0"));
}

#[test]
fn rerunning_yields_identical_ids() {
    let config = ClusterConfig {
        time_threshold: Some(600.0),
        overlap_threshold: 5.0,
        min_cluster_size: 2,
    };
    let first = cluster(&observation_dataset(), &config).unwrap();
    let second = cluster(&observation_dataset(), &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn grid_of_overlapping_tiles_forms_rows() {
    // Three rows of five tiles; tiles overlap horizontally within a row
    // and rows are separated by a gap.
    let mut items = Vec::new();
    for row in 0..3_i32 {
        for col in 0..5_i32 {
            let x = f64::from(col) * 0.8;
            let y = f64::from(row) * 3.0;
            items.push(Item::new(rect(x, y, x + 1.0, y + 1.0)));
        }
    }
    let result = cluster(&items, &ClusterConfig::default()).unwrap();
    let labels = ids(&result.cluster_ids);
    let expected: Vec<i64> = (0..3_i64).flat_map(|row| std::iter::repeat_n(row, 5)).collect();
    assert_eq!(labels, expected);
    assert_eq!(result.adjacency.pair_count(), 12);
}

#[test]
fn precomputed_adjacency_can_be_reused_across_windows() {
    let items = observation_dataset();
    let geometries: Vec<_> = items.iter().map(|item| item.geometry.clone()).collect();
    let adjacency = find_overlapping_neighbors(&geometries, 0.0).unwrap();

    let narrow = cluster_polygons(&items, &adjacency, Some(60.0), 1).unwrap();
    let wide = cluster_polygons(&items, &adjacency, Some(86_400.0), 1).unwrap();
    let none = cluster_polygons(&items, &adjacency, None, 1).unwrap();

    assert_eq!(ids(&narrow), vec![0, 1, 2, 3]);
    assert_eq!(ids(&wide), vec![0, 0, 0, 1]);
    assert_eq!(wide, none);
}

#[test]
fn hand_built_adjacency_is_honored() {
    let items: Vec<_> = (0..5_i32)
        .map(|i| Item::new(rect(f64::from(i), 0.0, f64::from(i) + 0.5, 0.5)))
        .collect();
    let adjacency = Adjacency::from_pairs(5, [(4, 2), (0, 3)]);
    let result = cluster_polygons(&items, &adjacency, None, 1).unwrap();
    assert_eq!(ids(&result), vec![0, 1, 2, 0, 2]);
}
