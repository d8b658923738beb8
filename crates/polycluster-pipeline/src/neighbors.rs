//! Overlap-based neighbor discovery.
//!
//! Builds a sparse [`Adjacency`] relation from polygon geometries:
//!
//! 1. Bulk-load an R\*-tree over the bounding rectangles of all
//!    geometries. Each entry carries its item index, so every index
//!    query yields plain integer indices with no reverse geometry lookup.
//! 2. For each item, collect the entries whose envelopes intersect its
//!    own envelope. Only candidates with a higher index are evaluated,
//!    so each unordered pair is tested exactly once.
//! 3. Compute the exact intersection area. Pairs with no positive-area
//!    overlap (including boundary-only contact) are rejected before the
//!    ratio is consulted.
//! 4. Accept the pair when intersection-over-union reaches
//!    `overlap_threshold / 100`.
//!
//! With the `parallel` feature the per-item candidate loop runs on the
//! rayon thread pool. Each item's decisions are independent, and the
//! final relation is sorted, so the output is identical either way.

use std::borrow::Borrow;

use geo::{Area, BooleanOps, BoundingRect, CoordsIter, Polygon};
use log::{debug, trace};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};

use crate::types::{Adjacency, ClusterError, validate_overlap_threshold};

/// An item's bounding rectangle tagged with the item index.
type IndexedEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Counts gathered while searching for neighbors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct NeighborStats {
    /// Geometries that had a bounding rectangle and entered the index.
    pub indexed: usize,
    /// Candidate pairs (`idx > i`) whose exact overlap was computed.
    pub candidate_pairs: usize,
}

/// Find, for every geometry, the other geometries it overlaps with an
/// intersection-over-union of at least `overlap_threshold` percent.
///
/// The result covers indices `0..geometries.len()`; isolated items map
/// to an empty list. Neighbor lists are sorted ascending, symmetric, and
/// never contain the item itself.
///
/// # Errors
///
/// Returns [`ClusterError::InvalidArgument`] if `overlap_threshold` is
/// outside `[0, 100]`. Returns [`ClusterError::Geometry`] if a geometry
/// has non-finite coordinates or its area or an intersection cannot be
/// evaluated to a finite value.
pub fn find_overlapping_neighbors(
    geometries: &[Polygon<f64>],
    overlap_threshold: f64,
) -> Result<Adjacency, ClusterError> {
    find_neighbors_with_stats(geometries, overlap_threshold).map(|(adjacency, _)| adjacency)
}

/// Intersection-over-union of two polygons, in `[0, 1]`.
///
/// Returns `1.0` when the union area is exactly zero (two degenerate
/// geometries). Neighbor discovery never reaches that case because it
/// rejects pairs without positive intersection area first.
#[must_use]
pub fn overlap_ratio(a: &Polygon<f64>, b: &Polygon<f64>) -> f64 {
    let intersection = a.intersection(b).unsigned_area();
    intersection_over_union(a.unsigned_area(), b.unsigned_area(), intersection)
}

#[allow(clippy::float_cmp)]
fn intersection_over_union(area_a: f64, area_b: f64, intersection: f64) -> f64 {
    let union = area_a + area_b - intersection;
    if union == 0.0 {
        1.0
    } else {
        intersection / union
    }
}

/// Neighbor search shared by [`find_overlapping_neighbors`] and the
/// staged pipeline, which passes borrowed geometries.
pub(crate) fn find_neighbors_with_stats<G: Borrow<Polygon<f64>> + Sync>(
    geometries: &[G],
    overlap_threshold: f64,
) -> Result<(Adjacency, NeighborStats), ClusterError> {
    validate_overlap_threshold(overlap_threshold)?;
    validate_coordinates(geometries)?;

    let n = geometries.len();
    if n == 0 {
        return Ok((Adjacency::default(), NeighborStats::default()));
    }

    let min_ratio = overlap_threshold / 100.0;
    let areas = geometries
        .iter()
        .enumerate()
        .map(|(index, geometry)| finite_area(index, geometry.borrow()))
        .collect::<Result<Vec<_>, _>>()?;
    let envelopes: Vec<Option<AABB<[f64; 2]>>> =
        geometries.iter().map(|g| envelope(g.borrow())).collect();

    let entries: Vec<IndexedEnvelope> = envelopes
        .iter()
        .enumerate()
        .filter_map(|(index, &env)| {
            env.map(|aabb| GeomWithData::new(Rectangle::from_aabb(aabb), index))
        })
        .collect();
    let tree = RTree::bulk_load(entries);
    let indexed = tree.size();
    debug!("indexed {indexed} of {n} geometries");

    let evaluate_item = |i: usize| -> Result<(Vec<usize>, usize), ClusterError> {
        let Some(query) = envelopes[i] else {
            return Ok((Vec::new(), 0));
        };
        let mut accepted = Vec::new();
        let mut evaluated = 0;
        for candidate in tree.locate_in_envelope_intersecting(&query) {
            let j = candidate.data;
            if j <= i {
                continue;
            }
            evaluated += 1;
            if is_neighbor_pair(geometries, &areas, i, j, min_ratio)? {
                accepted.push(j);
            }
        }
        Ok((accepted, evaluated))
    };

    #[cfg(feature = "parallel")]
    let rows: Vec<(Vec<usize>, usize)> = {
        use rayon::prelude::*;
        (0..n)
            .into_par_iter()
            .map(evaluate_item)
            .collect::<Result<_, _>>()?
    };
    #[cfg(not(feature = "parallel"))]
    let rows: Vec<(Vec<usize>, usize)> = (0..n).map(evaluate_item).collect::<Result<_, _>>()?;

    let candidate_pairs = rows.iter().map(|(_, evaluated)| evaluated).sum::<usize>();
    let adjacency = Adjacency::from_pairs(
        n,
        rows.iter()
            .enumerate()
            .flat_map(|(i, (accepted, _))| accepted.iter().map(move |&j| (i, j))),
    );
    debug!(
        "evaluated {candidate_pairs} candidate pairs, accepted {} neighbor pairs",
        adjacency.pair_count()
    );

    Ok((
        adjacency,
        NeighborStats {
            indexed,
            candidate_pairs,
        },
    ))
}

/// Decide whether items `i` and `j` overlap enough to be neighbors.
fn is_neighbor_pair<G: Borrow<Polygon<f64>>>(
    geometries: &[G],
    areas: &[f64],
    i: usize,
    j: usize,
    min_ratio: f64,
) -> Result<bool, ClusterError> {
    let intersection = geometries[i]
        .borrow()
        .intersection(geometries[j].borrow())
        .unsigned_area();
    if !intersection.is_finite() {
        return Err(ClusterError::Geometry {
            index: i,
            reason: format!("intersection with item {j} is not finite"),
        });
    }
    // Boundary-only contact has zero area and never qualifies, even at
    // a threshold of zero.
    if intersection <= 0.0 {
        return Ok(false);
    }
    let ratio = intersection_over_union(areas[i], areas[j], intersection);
    trace!("pair ({i}, {j}): intersection={intersection} ratio={ratio}");
    Ok(ratio >= min_ratio)
}

/// Fail on the first geometry holding a NaN or infinite coordinate.
fn validate_coordinates<G: Borrow<Polygon<f64>>>(geometries: &[G]) -> Result<(), ClusterError> {
    let offending = geometries.iter().position(|geometry| {
        geometry
            .borrow()
            .coords_iter()
            .any(|c| !c.x.is_finite() || !c.y.is_finite())
    });
    match offending {
        Some(index) => Err(ClusterError::Geometry {
            index,
            reason: "geometry has a non-finite coordinate".to_owned(),
        }),
        None => Ok(()),
    }
}

fn finite_area(index: usize, geometry: &Polygon<f64>) -> Result<f64, ClusterError> {
    let area = geometry.unsigned_area();
    if area.is_finite() {
        Ok(area)
    } else {
        Err(ClusterError::Geometry {
            index,
            reason: "area is not finite".to_owned(),
        })
    }
}

/// Axis-aligned envelope of a polygon, or `None` if it has no coordinates.
fn envelope(geometry: &Polygon<f64>) -> Option<AABB<[f64; 2]>> {
    geometry.bounding_rect().map(|rect| {
        let min = rect.min();
        let max = rect.max();
        AABB::from_corners([min.x, min.y], [max.x, max.y])
    })
}
