//! polycluster-pipeline: Pure polygon clustering pipeline (sans-IO).
//!
//! Groups polygons into clusters through:
//! spatial index -> overlap (IoU) neighbors -> item graph ->
//! optional temporal filter -> connected components -> noise policy ->
//! dense relabeling.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! geometries and returns structured data. Reading and writing
//! GeoJSON lives in `polycluster-geojson`.

pub mod cluster;
pub mod diagnostics;
pub mod neighbors;
pub mod pipeline;
pub mod types;

pub use cluster::cluster_polygons;
pub use neighbors::{find_overlapping_neighbors, overlap_ratio};
pub use pipeline::Pipeline;
pub use types::{Adjacency, ClusterConfig, ClusterError, ClusterId, ClusterResult, Item, Polygon};

/// Run the full clustering pipeline.
///
/// # Pipeline steps
///
/// 1. Validate the configuration (and timestamps, when temporal
///    filtering is on) before touching any geometry
/// 2. Find overlapping neighbors through an R\*-tree
/// 3. Build the undirected item graph
/// 4. Optionally remove edges that span more than the time window
/// 5. Label connected components
/// 6. Demote undersized components to noise and renumber the rest
///
/// # Errors
///
/// Returns [`ClusterError::InvalidArgument`] if any parameter is out of
/// range or temporal filtering is requested with missing timestamps.
/// Returns [`ClusterError::Geometry`] if a geometry cannot be evaluated.
pub fn cluster(items: &[Item], config: &ClusterConfig) -> Result<ClusterResult, ClusterError> {
    Ok(Pipeline::new(items, config.clone())
        .find_neighbors()?
        .build_graph()
        .filter_by_time()
        .label_components()
        .into_result())
}
