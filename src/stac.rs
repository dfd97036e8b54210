//! STAC Item to native dataset document conversion.
//!
//! STAC Items describe a dataset as a GeoJSON `Feature` with `properties`
//! and `assets`. The catalog expects its own dataset document:
//!
//! | Native field | Taken from |
//! |--------------|-----------|
//! | `id` | STAC `id` if it is a UUID, else a UUIDv5 of it |
//! | `label` | STAC `id` |
//! | `product.name` | `properties["odc:product"]`, else `collection` |
//! | `crs` | `properties["proj:epsg"]` as `epsg:<code>` |
//! | `grids.default` | `proj:shape` and `proj:transform` |
//! | `measurements` | assets with a `data` role (or no roles) |
//! | `accessories` | every other asset |

use anyhow::{bail, Result};
use serde_json::{json, Map, Value};
use uuid::Uuid;

pub const DATASET_SCHEMA: &str = "https://schemas.opendatacube.org/dataset";

/// Convert a STAC Item into a native dataset document.
pub fn stac_transform(item: &Value) -> Result<Value> {
    let obj = match item.as_object() {
        Some(obj) => obj,
        None => bail!("STAC item must be a JSON object"),
    };

    if obj.get("type").and_then(Value::as_str) != Some("Feature") {
        bail!("Not a STAC Item: expected type 'Feature'");
    }

    let stac_id = match obj.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id,
        _ => bail!("STAC item has no id"),
    };

    let empty = Map::new();
    let properties = obj
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let product = properties
        .get("odc:product")
        .and_then(Value::as_str)
        .or_else(|| obj.get("collection").and_then(Value::as_str));
    let product = match product {
        Some(p) => p,
        None => bail!("STAC item '{}' has no collection or odc:product", stac_id),
    };

    let mut doc = Map::new();
    doc.insert("$schema".into(), json!(DATASET_SCHEMA));
    doc.insert("id".into(), json!(dataset_id(stac_id).to_string()));
    doc.insert("label".into(), json!(stac_id));
    doc.insert("product".into(), json!({ "name": product }));

    if let Some(epsg) = properties.get("proj:epsg").and_then(Value::as_i64) {
        doc.insert("crs".into(), json!(format!("epsg:{}", epsg)));
    }

    if let Some(geometry) = obj.get("geometry").filter(|g| !g.is_null()) {
        doc.insert("geometry".into(), geometry.clone());
    }

    if let (Some(shape), Some(transform)) =
        (properties.get("proj:shape"), properties.get("proj:transform"))
    {
        doc.insert(
            "grids".into(),
            json!({ "default": { "shape": shape, "transform": transform } }),
        );
    }

    doc.insert("properties".into(), Value::Object(native_properties(properties)));

    let (measurements, accessories) = split_assets(obj.get("assets"));
    doc.insert("measurements".into(), Value::Object(measurements));
    if !accessories.is_empty() {
        doc.insert("accessories".into(), Value::Object(accessories));
    }

    doc.insert("lineage".into(), json!({}));

    Ok(Value::Object(doc))
}

/// Stable dataset UUID for a STAC id.
pub fn dataset_id(stac_id: &str) -> Uuid {
    Uuid::parse_str(stac_id)
        .unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_URL, stac_id.as_bytes()))
}

fn native_properties(properties: &Map<String, Value>) -> Map<String, Value> {
    let mut out = properties.clone();
    if !out.contains_key("odc:processing_datetime") {
        if let Some(created) = properties.get("created") {
            out.insert("odc:processing_datetime".into(), created.clone());
        }
    }
    out
}

fn split_assets(assets: Option<&Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut measurements = Map::new();
    let mut accessories = Map::new();

    let assets = match assets.and_then(Value::as_object) {
        Some(a) => a,
        None => return (measurements, accessories),
    };

    for (name, asset) in assets {
        let href = match asset.get("href").and_then(Value::as_str) {
            Some(h) => h,
            None => {
                tracing::warn!(asset = %name, "skipping STAC asset without href");
                continue;
            }
        };

        let is_data = match asset.get("roles").and_then(Value::as_array) {
            Some(roles) => roles.iter().any(|r| r.as_str() == Some("data")),
            None => true,
        };

        let entry = json!({ "path": href });
        if is_data {
            measurements.insert(name.clone(), entry);
        } else {
            accessories.insert(name.clone(), entry);
        }
    }

    (measurements, accessories)
}
