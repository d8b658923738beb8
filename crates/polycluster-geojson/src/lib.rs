//! polycluster-geojson: Pure GeoJSON codec (sans-IO)
//!
//! Reads a GeoJSON `FeatureCollection` of `Polygon` features into
//! pipeline [`Item`]s and writes the same features back with a
//! `cluster_id` property. Works on `&str` and `String` only; reading and
//! writing files is the caller's job.

pub mod parse;
mod time;
pub mod write;

use polycluster_pipeline::Item;
use serde_json::{Map, Value};

pub use parse::parse_feature_collection;
pub use write::write_feature_collection;

/// Property name that [`write_feature_collection`] stores cluster ids under.
pub const CLUSTER_ID_PROPERTY: &str = "cluster_id";

/// Everything about a feature except its geometry and timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureAttributes {
    /// The feature's `id` member, if it had one.
    pub id: Option<Value>,
    /// The feature's `properties` object, unchanged.
    pub properties: Map<String, Value>,
}

/// A parsed feature collection.
///
/// Items and attributes are stored side by side so the items can be fed
/// to the pipeline as one contiguous slice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    items: Vec<Item>,
    attributes: Vec<FeatureAttributes>,
}

impl Dataset {
    /// Append one feature.
    pub fn push(&mut self, item: Item, attributes: FeatureAttributes) {
        self.items.push(item);
        self.attributes.push(attributes);
    }

    /// The items, in feature order.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Per-feature attributes, parallel to [`Self::items`].
    #[must_use]
    pub fn attributes(&self) -> &[FeatureAttributes] {
        &self.attributes
    }

    /// Number of features.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection has no features.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Errors from reading or writing GeoJSON.
#[derive(Debug, thiserror::Error)]
pub enum GeoJsonError {
    /// The input is not valid JSON, or does not have the expected shape.
    #[error("invalid GeoJSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The top-level object is not a `FeatureCollection`.
    #[error("expected a FeatureCollection, found type {found:?}")]
    NotFeatureCollection {
        /// The `type` member that was found instead.
        found: String,
    },

    /// A feature has a geometry other than `Polygon` (or none at all).
    #[error("feature {index}: unsupported geometry type {kind:?}, only Polygon is accepted")]
    UnsupportedGeometry {
        /// Feature index within the collection.
        index: usize,
        /// The geometry `type`, or `"null"` for a missing geometry.
        kind: String,
    },

    /// A `Polygon` whose coordinates do not form valid linear rings.
    #[error("feature {index}: malformed coordinates: {reason}")]
    MalformedCoordinates {
        /// Feature index within the collection.
        index: usize,
        /// What was wrong with the coordinates.
        reason: String,
    },

    /// The time property is present but is neither a number nor a
    /// parseable date-time string.
    #[error("feature {index}: invalid time property {key:?}: {reason}")]
    InvalidTime {
        /// Feature index within the collection.
        index: usize,
        /// The time property name.
        key: String,
        /// What was wrong with the value.
        reason: String,
    },

    /// The number of cluster ids does not match the number of features.
    #[error("{ids} cluster ids given for {features} features")]
    IdCountMismatch {
        /// Features in the dataset.
        features: usize,
        /// Cluster ids supplied.
        ids: usize,
    },
}
