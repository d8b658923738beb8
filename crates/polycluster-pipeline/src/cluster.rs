//! Graph clustering over an adjacency relation.
//!
//! Turns the spatial [`Adjacency`] relation into final [`ClusterId`]s:
//!
//! 1. Build an undirected graph with one node per item.
//! 2. Optionally drop edges whose endpoints are further apart in time
//!    than the configured window. Filtering only ever removes edges.
//! 3. Label connected components via union-find. The labels are opaque
//!    partition keys.
//! 4. Demote components smaller than `min_cluster_size` to noise.
//! 5. Renumber surviving components densely from 0, in order of first
//!    appearance when scanning items by input index.

use std::collections::HashMap;

use log::debug;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;

use crate::types::{
    Adjacency, ClusterError, ClusterId, Item, validate_min_cluster_size, validate_time_threshold,
};

/// Undirected, unweighted item graph. Node `i` is item `i`.
pub type ItemGraph = UnGraph<(), ()>;

/// Assign a cluster id to every item.
///
/// `time_threshold` (seconds) enables temporal filtering when `Some`:
/// every item must then carry a timestamp. Components with fewer than
/// `min_cluster_size` members become [`ClusterId::NOISE`].
///
/// # Errors
///
/// Returns [`ClusterError::InvalidArgument`] if `min_cluster_size` is
/// zero, `time_threshold` is negative or not finite, temporal filtering
/// is requested while an item has no (or a non-finite) timestamp, or the
/// adjacency relation does not cover exactly `items.len()` items.
pub fn cluster_polygons(
    items: &[Item],
    adjacency: &Adjacency,
    time_threshold: Option<f64>,
    min_cluster_size: usize,
) -> Result<Vec<ClusterId>, ClusterError> {
    validate_min_cluster_size(min_cluster_size)?;
    let timestamps = temporal_timestamps(items, time_threshold)?;
    validate_adjacency(adjacency, items.len())?;

    let mut graph = build_graph(adjacency);
    if let (Some(window), Some(timestamps)) = (time_threshold, timestamps.as_deref()) {
        filter_by_time(&mut graph, timestamps, window);
    }
    let labels = component_labels(&graph);
    Ok(assign_cluster_ids(&labels, min_cluster_size))
}

/// Collect per-item timestamps when temporal filtering is requested.
///
/// Returns `Ok(None)` when `time_threshold` is `None`.
pub(crate) fn temporal_timestamps(
    items: &[Item],
    time_threshold: Option<f64>,
) -> Result<Option<Vec<f64>>, ClusterError> {
    validate_time_threshold(time_threshold)?;
    if time_threshold.is_none() {
        return Ok(None);
    }
    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item.timestamp {
            Some(t) if t.is_finite() => Ok(t),
            Some(t) => Err(ClusterError::InvalidArgument(format!(
                "item {index} has a non-finite timestamp ({t})"
            ))),
            None => Err(ClusterError::InvalidArgument(format!(
                "temporal filtering requires a timestamp on every item; item {index} has none"
            ))),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Reject relations that do not match the item count or point outside it.
pub(crate) fn validate_adjacency(adjacency: &Adjacency, n: usize) -> Result<(), ClusterError> {
    if adjacency.len() != n {
        return Err(ClusterError::InvalidArgument(format!(
            "adjacency covers {} items but {n} items were given",
            adjacency.len()
        )));
    }
    let out_of_range = (0..n).find(|&i| adjacency.neighbors(i).iter().any(|&j| j >= n));
    if let Some(i) = out_of_range {
        return Err(ClusterError::InvalidArgument(format!(
            "adjacency entry {i} references an item outside 0..{n}"
        )));
    }
    Ok(())
}

/// Build the undirected item graph, one edge per unordered adjacent pair.
#[must_use]
pub fn build_graph(adjacency: &Adjacency) -> ItemGraph {
    let n = adjacency.len();
    let mut graph = ItemGraph::with_capacity(n, adjacency.pair_count());
    for _ in 0..n {
        graph.add_node(());
    }
    for (i, j) in adjacency.pairs() {
        graph.add_edge(NodeIndex::new(i), NodeIndex::new(j), ());
    }
    graph
}

/// Remove every edge whose endpoints' timestamps differ by more than
/// `time_threshold` seconds. Returns the number of edges removed.
///
/// `timestamps` is indexed by node index.
///
/// # Panics
///
/// Panics if `timestamps` has fewer entries than the graph has nodes.
pub fn filter_by_time(graph: &mut ItemGraph, timestamps: &[f64], time_threshold: f64) -> usize {
    assert!(
        timestamps.len() >= graph.node_count(),
        "{} timestamps given for {} graph nodes",
        timestamps.len(),
        graph.node_count()
    );
    let before = graph.edge_count();
    graph.retain_edges(|g, edge| {
        g.edge_endpoints(edge).is_some_and(|(a, b)| {
            (timestamps[a.index()] - timestamps[b.index()]).abs() <= time_threshold
        })
    });
    let removed = before - graph.edge_count();
    debug!("temporal filter removed {removed} of {before} edges (window {time_threshold}s)");
    removed
}

/// Connected-component label for every node.
///
/// Labels are union-find representatives: equal labels mean the same
/// component, but the values themselves carry no meaning.
#[must_use]
pub fn component_labels(graph: &ItemGraph) -> Vec<usize> {
    let mut uf = UnionFind::<usize>::new(graph.node_count());
    for edge in graph.edge_references() {
        uf.union(edge.source().index(), edge.target().index());
    }
    uf.into_labeling()
}

/// Apply the minimum-size policy and renumber components densely.
///
/// Components with fewer than `min_cluster_size` members become
/// [`ClusterId::NOISE`]. Surviving components are numbered `0, 1, ...`
/// in order of their first member's input index.
#[must_use]
pub fn assign_cluster_ids(labels: &[usize], min_cluster_size: usize) -> Vec<ClusterId> {
    let mut sizes: HashMap<usize, usize> = HashMap::new();
    if min_cluster_size > 1 {
        for &label in labels {
            *sizes.entry(label).or_default() += 1;
        }
    }

    let mut dense: HashMap<usize, ClusterId> = HashMap::new();
    labels
        .iter()
        .map(|label| {
            if min_cluster_size > 1 && sizes.get(label).copied().unwrap_or(0) < min_cluster_size {
                return ClusterId::NOISE;
            }
            let next = ClusterId::cluster(dense.len());
            *dense.entry(*label).or_insert(next)
        })
        .collect()
}

/// Number of distinct non-noise clusters in a dense id assignment.
#[must_use]
pub fn cluster_count(ids: &[ClusterId]) -> usize {
    ids.iter()
        .filter_map(|id| id.index())
        .max()
        .map_or(0, |max| max + 1)
}
