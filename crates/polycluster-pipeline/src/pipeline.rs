//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::cluster()`] which runs everything in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use polycluster_pipeline::{ClusterConfig, ClusterError, Item, Pipeline};
//! # fn run(items: &[Item]) -> Result<(), ClusterError> {
//! let config = ClusterConfig::default();
//! let clustered = Pipeline::new(items, config)
//!     .find_neighbors()?
//!     .build_graph()
//!     .filter_by_time()
//!     .label_components();
//!
//! let result = clustered.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! All argument validation happens in [`Pending::find_neighbors`],
//! before any geometry is evaluated. Every later stage is infallible.

use std::collections::HashSet;

use log::debug;

use crate::cluster::{self, ItemGraph};
use crate::neighbors::{self, NeighborStats};
use crate::types::{Adjacency, ClusterConfig, ClusterError, ClusterId, ClusterResult, Item};

/// Entry point for the staged pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Start a pipeline over `items` with the given configuration.
    pub const fn new(items: &[Item], config: ClusterConfig) -> Pending<'_> {
        Pending { items, config }
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing; call .find_neighbors() to continue"]
pub struct Pending<'a> {
    items: &'a [Item],
    config: ClusterConfig,
}

impl<'a> Pending<'a> {
    /// The input items.
    #[must_use]
    pub const fn items(&self) -> &'a [Item] {
        self.items
    }

    /// Validate the configuration, then discover overlapping neighbors.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::InvalidArgument`] for any out-of-range
    /// parameter, or when temporal filtering is enabled and an item has
    /// no finite timestamp. Returns [`ClusterError::Geometry`] when a
    /// geometry cannot be evaluated.
    pub fn find_neighbors(self) -> Result<NeighborsFound<'a>, ClusterError> {
        self.config.validate()?;
        let timestamps = cluster::temporal_timestamps(self.items, self.config.time_threshold)?;

        let geometries: Vec<_> = self.items.iter().map(|item| &item.geometry).collect();
        let (adjacency, stats) =
            neighbors::find_neighbors_with_stats(&geometries, self.config.overlap_threshold)?;
        Ok(NeighborsFound {
            items: self.items,
            config: self.config,
            timestamps,
            adjacency,
            stats,
        })
    }
}

// ───────────────────────── Stage 1: NeighborsFound ───────────────────

/// Pipeline state after spatial neighbor discovery.
#[must_use = "pipeline stages are consumed by advancing; call .build_graph() to continue"]
pub struct NeighborsFound<'a> {
    items: &'a [Item],
    config: ClusterConfig,
    timestamps: Option<Vec<f64>>,
    adjacency: Adjacency,
    stats: NeighborStats,
}

impl<'a> NeighborsFound<'a> {
    /// The spatial adjacency relation.
    #[must_use]
    pub const fn adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    /// Number of geometries that entered the spatial index.
    #[must_use]
    pub const fn indexed_count(&self) -> usize {
        self.stats.indexed
    }

    /// Number of candidate pairs whose exact overlap was computed.
    #[must_use]
    pub const fn candidate_pairs(&self) -> usize {
        self.stats.candidate_pairs
    }

    /// Advance to the graph construction stage.
    pub fn build_graph(self) -> GraphBuilt<'a> {
        let graph = cluster::build_graph(&self.adjacency);
        debug!(
            "built graph with {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        GraphBuilt {
            items: self.items,
            config: self.config,
            timestamps: self.timestamps,
            adjacency: self.adjacency,
            graph,
        }
    }
}

// ───────────────────────── Stage 2: GraphBuilt ───────────────────────

/// Pipeline state after building the unfiltered item graph.
#[must_use = "pipeline stages are consumed by advancing; call .filter_by_time() to continue"]
pub struct GraphBuilt<'a> {
    items: &'a [Item],
    config: ClusterConfig,
    timestamps: Option<Vec<f64>>,
    adjacency: Adjacency,
    graph: ItemGraph,
}

impl<'a> GraphBuilt<'a> {
    /// The item graph before temporal filtering.
    #[must_use]
    pub const fn graph(&self) -> &ItemGraph {
        &self.graph
    }

    /// Advance to the temporal filtering stage.
    ///
    /// A no-op when the configuration has no time threshold.
    pub fn filter_by_time(mut self) -> TimeFiltered<'a> {
        let removed_edges = match (self.config.time_threshold, self.timestamps.as_deref()) {
            (Some(window), Some(timestamps)) => {
                Some(cluster::filter_by_time(&mut self.graph, timestamps, window))
            }
            _ => None,
        };
        TimeFiltered {
            items: self.items,
            config: self.config,
            adjacency: self.adjacency,
            graph: self.graph,
            removed_edges,
        }
    }
}

// ───────────────────────── Stage 3: TimeFiltered ─────────────────────

/// Pipeline state after (optional) temporal edge filtering.
#[must_use = "pipeline stages are consumed by advancing; call .label_components() to continue"]
pub struct TimeFiltered<'a> {
    items: &'a [Item],
    config: ClusterConfig,
    adjacency: Adjacency,
    graph: ItemGraph,
    removed_edges: Option<usize>,
}

impl TimeFiltered<'_> {
    /// The item graph after temporal filtering.
    #[must_use]
    pub const fn graph(&self) -> &ItemGraph {
        &self.graph
    }

    /// Number of edges removed, or `None` if filtering was disabled.
    #[must_use]
    pub const fn removed_edges(&self) -> Option<usize> {
        self.removed_edges
    }

    /// Advance to the final stage: label components, apply the noise
    /// policy, and assign dense cluster ids.
    pub fn label_components(self) -> Clustered {
        let labels = cluster::component_labels(&self.graph);
        let component_count = labels.iter().collect::<HashSet<_>>().len();
        let cluster_ids = cluster::assign_cluster_ids(&labels, self.config.min_cluster_size);
        let cluster_count = cluster::cluster_count(&cluster_ids);
        debug!(
            "{} items -> {component_count} components -> {cluster_count} clusters",
            self.items.len()
        );
        Clustered {
            adjacency: self.adjacency,
            labels,
            component_count,
            cluster_ids,
            cluster_count,
        }
    }
}

// ───────────────────────── Stage 4: Clustered ────────────────────────

/// Pipeline state after cluster assignment.
#[must_use = "call .into_result() to obtain the cluster ids"]
pub struct Clustered {
    adjacency: Adjacency,
    labels: Vec<usize>,
    component_count: usize,
    cluster_ids: Vec<ClusterId>,
    cluster_count: usize,
}

impl Clustered {
    /// Raw connected-component labels (opaque partition keys).
    #[must_use]
    pub fn component_labels(&self) -> &[usize] {
        &self.labels
    }

    /// Number of connected components, noise included.
    #[must_use]
    pub const fn component_count(&self) -> usize {
        self.component_count
    }

    /// Final per-item cluster ids.
    #[must_use]
    pub fn cluster_ids(&self) -> &[ClusterId] {
        &self.cluster_ids
    }

    /// Number of surviving clusters.
    #[must_use]
    pub const fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    /// Consume the final stage and return the pipeline result.
    #[must_use]
    pub fn into_result(self) -> ClusterResult {
        ClusterResult {
            cluster_ids: self.cluster_ids,
            adjacency: self.adjacency,
            cluster_count: self.cluster_count,
        }
    }
}
