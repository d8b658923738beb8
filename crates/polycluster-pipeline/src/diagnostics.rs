//! Pipeline diagnostics: timing and counts for each clustering stage.
//!
//! [`cluster_with_diagnostics`] drives the staged [`Pipeline`] and
//! records a [`StageDiagnostics`] entry per stage. Timing goes through
//! the [`Clock`] trait so the core stays free of platform clocks;
//! [`WebClock`] uses the `web-time` crate (`performance.now()` on WASM,
//! `std::time::Instant` on native).
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;
use crate::types::{ClusterConfig, ClusterError, ClusterResult, Item};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of monotonic timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by `web_time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebClock;

impl Clock for WebClock {
    type Instant = web_time::Instant;

    fn now(&self) -> Self::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &Self::Instant) -> Duration {
        since.elapsed()
    }
}

/// Diagnostics collected from a single clustering run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterDiagnostics {
    /// Stage 1: spatial index build and overlap evaluation.
    pub neighbor_search: StageDiagnostics,
    /// Stage 2: graph construction.
    pub graph: StageDiagnostics,
    /// Stage 3: temporal filtering (only when a time threshold is set).
    pub temporal_filter: Option<StageDiagnostics>,
    /// Stage 4: connected components, noise policy, and relabeling.
    pub components: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: ClusterSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Neighbor search metrics.
    NeighborSearch {
        /// Overlap threshold in percent.
        overlap_threshold: f64,
        /// Geometries that entered the spatial index.
        indexed_count: usize,
        /// Candidate pairs whose exact overlap was computed.
        candidate_pairs: usize,
        /// Pairs accepted as neighbors.
        neighbor_pairs: usize,
    },
    /// Graph construction metrics.
    Graph {
        /// Nodes (one per item).
        node_count: usize,
        /// Edges (one per neighbor pair).
        edge_count: usize,
    },
    /// Temporal filter metrics.
    TemporalFilter {
        /// Time window in seconds.
        time_threshold: f64,
        /// Edges removed for exceeding the window.
        removed_edges: usize,
        /// Edges remaining.
        remaining_edges: usize,
    },
    /// Component labeling metrics.
    Components {
        /// Minimum cluster size applied.
        min_cluster_size: usize,
        /// Connected components, noise included.
        component_count: usize,
        /// Surviving clusters.
        cluster_count: usize,
        /// Items labeled noise.
        noise_count: usize,
    },
}

/// High-level summary counts for the entire run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Number of input items.
    pub item_count: usize,
    /// Number of surviving clusters.
    pub cluster_count: usize,
    /// Number of items labeled noise.
    pub noise_count: usize,
}

/// Run the full clustering pipeline, timing every stage.
///
/// # Errors
///
/// Same as [`crate::cluster()`].
pub fn cluster_with_diagnostics<C: Clock>(
    items: &[Item],
    config: &ClusterConfig,
    clock: &C,
) -> Result<(ClusterResult, ClusterDiagnostics), ClusterError> {
    let run_start = clock.now();

    let start = clock.now();
    let found = Pipeline::new(items, config.clone()).find_neighbors()?;
    let neighbor_search = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::NeighborSearch {
            overlap_threshold: config.overlap_threshold,
            indexed_count: found.indexed_count(),
            candidate_pairs: found.candidate_pairs(),
            neighbor_pairs: found.adjacency().pair_count(),
        },
    };

    let start = clock.now();
    let built = found.build_graph();
    let graph = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Graph {
            node_count: built.graph().node_count(),
            edge_count: built.graph().edge_count(),
        },
    };

    let start = clock.now();
    let filtered = built.filter_by_time();
    let filter_duration = clock.elapsed(&start);
    let temporal_filter = match (config.time_threshold, filtered.removed_edges()) {
        (Some(time_threshold), Some(removed_edges)) => Some(StageDiagnostics {
            duration: filter_duration,
            metrics: StageMetrics::TemporalFilter {
                time_threshold,
                removed_edges,
                remaining_edges: filtered.graph().edge_count(),
            },
        }),
        _ => None,
    };

    let start = clock.now();
    let clustered = filtered.label_components();
    let component_count = clustered.component_count();
    let result = clustered.into_result();
    let noise_count = result.noise_count();
    let components = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Components {
            min_cluster_size: config.min_cluster_size,
            component_count,
            cluster_count: result.cluster_count,
            noise_count,
        },
    };

    let diagnostics = ClusterDiagnostics {
        neighbor_search,
        graph,
        temporal_filter,
        components,
        total_duration: clock.elapsed(&run_start),
        summary: ClusterSummary {
            item_count: items.len(),
            cluster_count: result.cluster_count,
            noise_count,
        },
    };
    Ok((result, diagnostics))
}

impl ClusterDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Clustering Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!("Items: {}", self.summary.item_count));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<20} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let mut stages = vec![
            ("Neighbor Search", &self.neighbor_search),
            ("Graph", &self.graph),
        ];
        if let Some(ref filter) = self.temporal_filter {
            stages.push(("Temporal Filter", filter));
        }
        stages.push(("Components", &self.components));

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<20} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Clusters: {}  |  Noise items: {}",
            self.summary.cluster_count, self.summary.noise_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::NeighborSearch {
            overlap_threshold,
            indexed_count,
            candidate_pairs,
            neighbor_pairs,
        } => format!(
            "iou>={overlap_threshold:.1}% indexed={indexed_count} candidates={candidate_pairs} neighbors={neighbor_pairs}",
        ),
        StageMetrics::Graph {
            node_count,
            edge_count,
        } => format!("{node_count} nodes, {edge_count} edges"),
        StageMetrics::TemporalFilter {
            time_threshold,
            removed_edges,
            remaining_edges,
        } => format!("window={time_threshold}s removed={removed_edges} kept={remaining_edges}"),
        StageMetrics::Components {
            min_cluster_size,
            component_count,
            cluster_count,
            noise_count,
        } => format!(
            "min_size={min_cluster_size} components={component_count} clusters={cluster_count} noise={noise_count}",
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use geo::{LineString, Polygon};

    use super::*;

    /// Clock that advances one millisecond per reading.
    struct TickClock {
        ticks: Cell<u64>,
    }

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn square(x: f64, t: f64) -> Item {
        Item::new(Polygon::new(
            LineString::from(vec![(x, 0.0), (x + 1.0, 0.0), (x + 1.0, 1.0), (x, 1.0)]),
            vec![],
        ))
        .with_timestamp(t)
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn diagnostics_match_result() {
        let items = vec![square(0.0, 0.0), square(0.5, 10.0), square(9.0, 0.0)];
        let config = ClusterConfig {
            time_threshold: Some(5.0),
            min_cluster_size: 1,
            ..ClusterConfig::default()
        };
        let clock = TickClock {
            ticks: Cell::new(0),
        };
        let (result, diag) = cluster_with_diagnostics(&items, &config, &clock).unwrap();

        assert_eq!(result.cluster_count, 3);
        assert_eq!(diag.summary.item_count, 3);
        assert_eq!(diag.summary.cluster_count, 3);
        assert!(matches!(
            diag.neighbor_search.metrics,
            StageMetrics::NeighborSearch {
                neighbor_pairs: 1,
                ..
            }
        ));
        assert!(matches!(
            diag.temporal_filter.as_ref().map(|s| &s.metrics),
            Some(StageMetrics::TemporalFilter {
                removed_edges: 1,
                remaining_edges: 0,
                ..
            })
        ));
        assert!(diag.total_duration >= diag.neighbor_search.duration);
    }

    #[test]
    fn temporal_stage_absent_without_threshold() {
        let items = vec![square(0.0, 0.0)];
        let (_, diag) =
            cluster_with_diagnostics(&items, &ClusterConfig::default(), &WebClock).unwrap();
        assert!(diag.temporal_filter.is_none());
    }

    #[test]
    fn report_mentions_every_stage() {
        let items = vec![square(0.0, 0.0), square(0.5, 0.0)];
        let config = ClusterConfig {
            time_threshold: Some(60.0),
            ..ClusterConfig::default()
        };
        let (_, diag) = cluster_with_diagnostics(&items, &config, &WebClock).unwrap();
        let report = diag.report();
        assert!(report.contains("Clustering Diagnostics Report"));
        assert!(report.contains("Neighbor Search"));
        assert!(report.contains("Temporal Filter"));
        assert!(report.contains("Components"));
    }

    #[test]
    fn diagnostics_serialize_to_json() {
        let items = vec![square(0.0, 0.0)];
        let (_, diag) =
            cluster_with_diagnostics(&items, &ClusterConfig::default(), &WebClock).unwrap();
        let json = serde_json::to_string(&diag).unwrap();
        let back: ClusterDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary.item_count, 1);
    }
}
