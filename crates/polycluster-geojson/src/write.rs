//! `FeatureCollection` writer.

use polycluster_pipeline::{ClusterId, Polygon};
use serde_json::{Map, Value, json};

use crate::{CLUSTER_ID_PROPERTY, Dataset, FeatureAttributes, GeoJsonError};

/// Serialize `dataset` back to a GeoJSON `FeatureCollection`, adding a
/// [`CLUSTER_ID_PROPERTY`] integer property to every feature.
///
/// Feature order, ids, and all other properties are kept. An existing
/// `cluster_id` property is overwritten. Noise items get `-1`.
///
/// # Errors
///
/// Returns [`GeoJsonError::IdCountMismatch`] if `cluster_ids` does not
/// have exactly one entry per feature.
pub fn write_feature_collection(
    dataset: &Dataset,
    cluster_ids: &[ClusterId],
) -> Result<String, GeoJsonError> {
    if cluster_ids.len() != dataset.len() {
        return Err(GeoJsonError::IdCountMismatch {
            features: dataset.len(),
            ids: cluster_ids.len(),
        });
    }

    let features: Vec<Value> = dataset
        .items()
        .iter()
        .zip(dataset.attributes())
        .zip(cluster_ids)
        .map(|((item, attributes), &cluster_id)| {
            feature_value(&item.geometry, attributes, cluster_id)
        })
        .collect();
    let collection = json!({ "type": "FeatureCollection", "features": features });
    Ok(serde_json::to_string(&collection)?)
}

fn feature_value(geometry: &Polygon<f64>, attributes: &FeatureAttributes, id: ClusterId) -> Value {
    let mut properties = attributes.properties.clone();
    properties.insert(CLUSTER_ID_PROPERTY.to_owned(), Value::from(id.get()));

    let mut feature = Map::new();
    feature.insert("type".to_owned(), Value::from("Feature"));
    if let Some(feature_id) = &attributes.id {
        feature.insert("id".to_owned(), feature_id.clone());
    }
    feature.insert("geometry".to_owned(), polygon_value(geometry));
    feature.insert("properties".to_owned(), Value::Object(properties));
    Value::Object(feature)
}

fn polygon_value(polygon: &Polygon<f64>) -> Value {
    let rings: Vec<Vec<[f64; 2]>> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| ring.coords().map(|c| [c.x, c.y]).collect())
        .collect();
    json!({ "type": "Polygon", "coordinates": rings })
}
