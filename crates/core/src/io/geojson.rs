//! GeoJSON FeatureCollection reading and writing.
//!
//! The CRS of an input comes from the caller's override, else from the
//! legacy `crs` member (`{"type":"name","properties":{"name":"EPSG:26911"}}`),
//! else it stays unknown and downstream alignment fails fast.

use std::fs;
use std::path::Path;

use geojson::{GeoJson, JsonObject};
use serde_json::json;

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};

/// Read a GeoJSON file into a [`FeatureCollection`] named after the file stem.
pub fn read_geojson<P: AsRef<Path>>(path: P, crs_override: Option<&CRS>) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let collection = parse_geojson(&text, &name, crs_override)?;
    tracing::debug!(
        path = %path.display(),
        features = collection.len(),
        crs = %collection.crs,
        "read GeoJSON"
    );
    Ok(collection)
}

/// Parse GeoJSON text. A bare Feature or Geometry becomes a one-feature
/// collection.
pub fn parse_geojson(text: &str, name: &str, crs_override: Option<&CRS>) -> Result<FeatureCollection> {
    let geojson: GeoJson = text.parse()?;

    let (features, declared) = match geojson {
        GeoJson::FeatureCollection(fc) => {
            let declared = fc.foreign_members.as_ref().and_then(declared_crs);
            (fc.features, declared)
        }
        GeoJson::Feature(f) => {
            let declared = f.foreign_members.as_ref().and_then(declared_crs);
            (vec![f], declared)
        }
        GeoJson::Geometry(g) => (
            vec![geojson::Feature {
                bbox: None,
                geometry: Some(g),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            None,
        ),
    };

    let crs = crs_override.cloned().or(declared).unwrap_or_default();
    let mut collection = FeatureCollection::new(name, crs);

    for (index, feature) in features.into_iter().enumerate() {
        let geometry = match feature.geometry {
            Some(g) => Some(geo_types::Geometry::<f64>::try_from(g).map_err(|e| {
                Error::InvalidAttribute {
                    field: "geometry".to_string(),
                    feature: index,
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };
        let properties = feature
            .properties
            .unwrap_or_default()
            .iter()
            .map(|(k, v)| (k.clone(), AttributeValue::from(v)))
            .collect();
        let id = feature.id.map(|id| match id {
            geojson::feature::Id::String(s) => s,
            geojson::feature::Id::Number(n) => n.to_string(),
        });
        collection.push(Feature {
            geometry,
            properties,
            id,
        });
    }

    Ok(collection)
}

fn declared_crs(members: &JsonObject) -> Option<CRS> {
    let name = members
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    let crs: CRS = name.parse().ok()?;
    (!crs.is_unknown()).then_some(crs)
}

/// Serialize a [`FeatureCollection`], declaring its CRS in the legacy
/// `crs` member when it is known.
pub fn to_geojson(collection: &FeatureCollection) -> GeoJson {
    let features = collection
        .iter()
        .map(|f| {
            let properties: JsonObject = f
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                .collect();
            geojson::Feature {
                bbox: None,
                geometry: f
                    .geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: f.id.clone().map(geojson::feature::Id::String),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let foreign_members = (!collection.crs.is_unknown()).then(|| {
        let mut members = JsonObject::new();
        let name = match collection.crs.epsg() {
            Some(code) => format!("urn:ogc:def:crs:EPSG::{code}"),
            None => collection.crs.identifier(),
        };
        members.insert(
            "crs".to_string(),
            json!({"type": "name", "properties": {"name": name}}),
        );
        members
    });

    GeoJson::FeatureCollection(geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    })
}

/// Write a [`FeatureCollection`] as GeoJSON.
pub fn write_geojson<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, to_geojson(collection).to_string())?;
    tracing::debug!(path = %path.display(), features = collection.len(), "wrote GeoJSON");
    Ok(())
}
