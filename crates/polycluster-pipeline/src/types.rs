//! Shared types for the polycluster clustering pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `Polygon` so downstream crates can build items without
/// depending on `geo` directly.
pub use geo::Polygon;

/// One input record: a planar polygon and an optional timestamp.
///
/// Items are identified by their position in the input slice. That
/// position is the index used throughout the adjacency relation and the
/// cluster id output.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// The polygon footprint (may contain holes).
    pub geometry: Polygon<f64>,
    /// Seconds since an arbitrary epoch. Required only when temporal
    /// filtering is enabled.
    pub timestamp: Option<f64>,
}

impl Item {
    /// Create an item without a timestamp.
    #[must_use]
    pub const fn new(geometry: Polygon<f64>) -> Self {
        Self {
            geometry,
            timestamp: None,
        }
    }

    /// Attach a timestamp (seconds) to this item.
    #[must_use]
    pub fn with_timestamp(mut self, seconds: f64) -> Self {
        self.timestamp = Some(seconds);
        self
    }
}

/// Final per-item cluster assignment.
///
/// Either a dense, non-negative cluster index or the [`ClusterId::NOISE`]
/// sentinel (`-1`). Serializes as a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ClusterId(i64);

impl ClusterId {
    /// Sentinel for items whose component is smaller than the minimum
    /// cluster size.
    pub const NOISE: Self = Self(-1);

    /// Id of the `index`-th surviving cluster.
    #[must_use]
    pub fn cluster(index: usize) -> Self {
        Self(i64::try_from(index).unwrap_or(i64::MAX))
    }

    /// Returns `true` for the noise sentinel.
    #[must_use]
    pub const fn is_noise(self) -> bool {
        self.0 < 0
    }

    /// The dense cluster index, or `None` for noise.
    #[must_use]
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }

    /// The raw integer value (`-1` for noise).
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for ClusterId {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < -1 {
            return Err(format!("cluster id must be -1 or non-negative, got {value}"));
        }
        Ok(Self(value))
    }
}

impl From<ClusterId> for i64 {
    fn from(id: ClusterId) -> Self {
        id.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sparse, symmetric, irreflexive adjacency relation over item indices.
///
/// Entry `i` holds the ascending list of items that overlap item `i`
/// sufficiently. Memory is linear in the number of overlapping pairs.
///
/// Deserialization goes through `TryFrom<Vec<Vec<usize>>>`, so a
/// deserialized relation upholds the same invariants as one built with
/// [`Adjacency::from_pairs`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<usize>>")]
pub struct Adjacency(Vec<Vec<usize>>);

impl Adjacency {
    /// An adjacency relation over `n` isolated items.
    #[must_use]
    pub fn isolated(n: usize) -> Self {
        Self(vec![Vec::new(); n])
    }

    /// Build a relation over `n` items from unordered pairs.
    ///
    /// Both directions are recorded. Self pairs, duplicates, and pairs
    /// referencing an index `>= n` are dropped.
    #[must_use]
    pub fn from_pairs(n: usize, pairs: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut lists = vec![Vec::new(); n];
        for (a, b) in pairs {
            if a == b || a >= n || b >= n {
                continue;
            }
            lists[a].push(b);
            lists[b].push(a);
        }
        for list in &mut lists {
            list.sort_unstable();
            list.dedup();
        }
        Self(lists)
    }

    /// Number of items covered by the relation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the relation covers no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted neighbors of item `index` (empty if out of range).
    #[must_use]
    pub fn neighbors(&self, index: usize) -> &[usize] {
        self.0.get(index).map_or(&[], Vec::as_slice)
    }

    /// Returns `true` if items `a` and `b` are adjacent.
    #[must_use]
    pub fn contains(&self, a: usize, b: usize) -> bool {
        self.neighbors(a).binary_search(&b).is_ok()
    }

    /// Number of unordered adjacent pairs.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.0.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Iterate unordered pairs `(i, j)` with `i < j`, in ascending order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.0.iter().enumerate().flat_map(|(i, list)| {
            list.iter()
                .copied()
                .filter(move |&j| j > i)
                .map(move |j| (i, j))
        })
    }

    /// Consumes the relation and returns the per-item neighbor lists.
    #[must_use]
    pub fn into_inner(self) -> Vec<Vec<usize>> {
        self.0
    }
}

impl TryFrom<Vec<Vec<usize>>> for Adjacency {
    type Error = String;

    /// Accept neighbor lists that are strictly ascending, in range,
    /// irreflexive, and symmetric.
    fn try_from(lists: Vec<Vec<usize>>) -> Result<Self, Self::Error> {
        let n = lists.len();
        for (i, list) in lists.iter().enumerate() {
            if let Some(&j) = list.iter().find(|&&j| j >= n) {
                return Err(format!("item {i} lists neighbor {j} outside 0..{n}"));
            }
            if list.contains(&i) {
                return Err(format!("item {i} lists itself as a neighbor"));
            }
            if list.windows(2).any(|w| w[0] >= w[1]) {
                return Err(format!("neighbors of item {i} are not strictly ascending"));
            }
        }
        for (i, list) in lists.iter().enumerate() {
            if let Some(&j) = list.iter().find(|&&j| lists[j].binary_search(&i).is_err()) {
                return Err(format!(
                    "item {i} lists neighbor {j}, but item {j} does not list {i}"
                ));
            }
        }
        Ok(Self(lists))
    }
}

/// Configuration for one clustering call.
///
/// All values are supplied per call; nothing is process-wide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Minimum intersection-over-union, as a percentage in `[0, 100]`,
    /// for two polygons to be neighbors. `0` accepts any positive-area
    /// overlap.
    pub overlap_threshold: f64,

    /// Maximum timestamp difference (seconds) between neighbors.
    /// `None` disables temporal filtering.
    pub time_threshold: Option<f64>,

    /// Components with fewer members than this are labeled noise.
    /// `1` disables the noise policy.
    pub min_cluster_size: usize,
}

impl ClusterConfig {
    /// Default overlap threshold (percent).
    pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.0;

    /// Default temporal window (seconds) when temporal filtering is on.
    pub const DEFAULT_TIME_THRESHOLD: f64 = 3600.0;

    /// Default minimum cluster size.
    pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 1;

    /// Check every parameter range.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::InvalidArgument`] if `overlap_threshold`
    /// is outside `[0, 100]`, `time_threshold` is negative or not finite,
    /// or `min_cluster_size` is zero.
    pub fn validate(&self) -> Result<(), ClusterError> {
        validate_overlap_threshold(self.overlap_threshold)?;
        validate_time_threshold(self.time_threshold)?;
        validate_min_cluster_size(self.min_cluster_size)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: Self::DEFAULT_OVERLAP_THRESHOLD,
            time_threshold: None,
            min_cluster_size: Self::DEFAULT_MIN_CLUSTER_SIZE,
        }
    }
}

pub(crate) fn validate_overlap_threshold(overlap_threshold: f64) -> Result<(), ClusterError> {
    if overlap_threshold.is_finite() && (0.0..=100.0).contains(&overlap_threshold) {
        Ok(())
    } else {
        Err(ClusterError::InvalidArgument(format!(
            "overlap_threshold must be within [0, 100], got {overlap_threshold}"
        )))
    }
}

pub(crate) fn validate_time_threshold(time_threshold: Option<f64>) -> Result<(), ClusterError> {
    match time_threshold {
        Some(t) if !t.is_finite() || t < 0.0 => Err(ClusterError::InvalidArgument(format!(
            "time_threshold must be a non-negative number of seconds, got {t}"
        ))),
        _ => Ok(()),
    }
}

pub(crate) fn validate_min_cluster_size(min_cluster_size: usize) -> Result<(), ClusterError> {
    if min_cluster_size == 0 {
        return Err(ClusterError::InvalidArgument(
            "min_cluster_size must be at least 1".to_owned(),
        ));
    }
    Ok(())
}

/// Result of running the full clustering pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResult {
    /// One id per input item, in input order.
    pub cluster_ids: Vec<ClusterId>,

    /// The spatial adjacency relation (before temporal filtering).
    pub adjacency: Adjacency,

    /// Number of surviving (non-noise) clusters.
    pub cluster_count: usize,
}

impl ClusterResult {
    /// Number of items labeled noise.
    #[must_use]
    pub fn noise_count(&self) -> usize {
        self.cluster_ids.iter().filter(|id| id.is_noise()).count()
    }
}

/// Errors that can occur during clustering.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClusterError {
    /// A parameter is out of range or inconsistent with the input.
    /// Raised before any geometry is evaluated.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The geometry engine could not evaluate an item.
    #[error("geometry error at item {index}: {reason}")]
    Geometry {
        /// Index of the offending item.
        index: usize,
        /// What went wrong.
        reason: String,
    },
}
