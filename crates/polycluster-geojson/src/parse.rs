//! `FeatureCollection` reader.

use geo::{Coord, LineString};
use polycluster_pipeline::{Item, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::time::seconds_from_value;
use crate::{Dataset, FeatureAttributes, GeoJsonError};

#[derive(Deserialize)]
struct RawCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
    id: Option<Value>,
    geometry: Option<RawGeometry>,
    properties: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

/// Parse a GeoJSON `FeatureCollection` of `Polygon` features.
///
/// When `time_key` is given, that property supplies each item's
/// timestamp: a number is Unix seconds, a string is an RFC 3339
/// date-time (UTC when it carries no offset). A missing or `null`
/// property leaves the timestamp unset; the pipeline rejects that only
/// if temporal filtering is requested. All properties, the time
/// property included, are kept in [`FeatureAttributes::properties`].
///
/// # Errors
///
/// Returns [`GeoJsonError::Json`] for malformed JSON,
/// [`GeoJsonError::NotFeatureCollection`] for any other top-level type,
/// and a per-feature error naming the feature index for non-`Polygon`
/// geometries, malformed rings, or an unreadable time property.
pub fn parse_feature_collection(
    json: &str,
    time_key: Option<&str>,
) -> Result<Dataset, GeoJsonError> {
    let collection: RawCollection = serde_json::from_str(json)?;
    if collection.kind != "FeatureCollection" {
        return Err(GeoJsonError::NotFeatureCollection {
            found: collection.kind,
        });
    }

    let mut dataset = Dataset::default();
    for (index, feature) in collection.features.into_iter().enumerate() {
        let geometry = polygon_from_geometry(index, feature.geometry)?;
        let properties = feature.properties.unwrap_or_default();
        let timestamp = match time_key {
            Some(key) => timestamp_property(index, key, &properties)?,
            None => None,
        };
        dataset.push(
            Item {
                geometry,
                timestamp,
            },
            FeatureAttributes {
                id: feature.id,
                properties,
            },
        );
    }
    Ok(dataset)
}

fn timestamp_property(
    index: usize,
    key: &str,
    properties: &Map<String, Value>,
) -> Result<Option<f64>, GeoJsonError> {
    properties
        .get(key)
        .map_or(Ok(None), seconds_from_value)
        .map_err(|reason| GeoJsonError::InvalidTime {
            index,
            key: key.to_owned(),
            reason,
        })
}

fn polygon_from_geometry(
    index: usize,
    geometry: Option<RawGeometry>,
) -> Result<Polygon<f64>, GeoJsonError> {
    let geometry = geometry.ok_or_else(|| GeoJsonError::UnsupportedGeometry {
        index,
        kind: "null".to_owned(),
    })?;
    if geometry.kind != "Polygon" {
        return Err(GeoJsonError::UnsupportedGeometry {
            index,
            kind: geometry.kind,
        });
    }

    let rings: Vec<Vec<Vec<f64>>> = serde_json::from_value(geometry.coordinates)
        .map_err(|err| malformed(index, format!("expected an array of rings ({err})")))?;
    let mut rings = rings
        .into_iter()
        .enumerate()
        .map(|(ring_index, positions)| linear_ring(index, ring_index, positions));
    let exterior = rings
        .next()
        .ok_or_else(|| malformed(index, "polygon has no rings".to_owned()))??;
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

/// A ring needs at least four positions (first and last equal), each
/// with at least two values. Extra values such as altitude are dropped.
fn linear_ring(
    index: usize,
    ring_index: usize,
    positions: Vec<Vec<f64>>,
) -> Result<LineString<f64>, GeoJsonError> {
    if positions.len() < 4 {
        return Err(malformed(
            index,
            format!(
                "ring {ring_index} has {} positions, at least 4 are required",
                positions.len()
            ),
        ));
    }
    let coords = positions
        .into_iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(malformed(
                index,
                format!("ring {ring_index} has a position with fewer than two values"),
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if coords.first() != coords.last() {
        return Err(malformed(
            index,
            format!("ring {ring_index} is not closed (first and last positions differ)"),
        ));
    }
    Ok(LineString::new(coords))
}

const fn malformed(index: usize, reason: String) -> GeoJsonError {
    GeoJsonError::MalformedCoordinates { index, reason }
}
