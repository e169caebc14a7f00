//! Vector features: geometry, attributes and the CRS they are expressed in

use geo::MapCoords;
use geo_types::{Coord, Geometry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::crs::{CoordinateTransform, CRS};
use crate::error::{Error, Result};

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Integer reading of the value: integers, floats without a fractional
    /// part and numeric strings qualify.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            AttributeValue::Float(v) if v.is_finite() && v.fract() == 0.0 => {
                // Guard the cast against values beyond i64.
                (v.abs() < 9.0e18).then_some(*v as i64)
            }
            AttributeValue::String(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .and_then(|f| AttributeValue::Float(f).as_integer())
                })
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<&serde_json::Value> for AttributeValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttributeValue::Null,
            serde_json::Value::Bool(b) => AttributeValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => AttributeValue::Int(i),
                None => n.as_f64().map_or(AttributeValue::Null, AttributeValue::Float),
            },
            serde_json::Value::String(s) => AttributeValue::String(s.clone()),
            other => AttributeValue::String(other.to_string()),
        }
    }
}

impl From<&AttributeValue> for serde_json::Value {
    fn from(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::Null => serde_json::Value::Null,
            AttributeValue::Bool(b) => serde_json::Value::Bool(*b),
            AttributeValue::Int(i) => serde_json::Value::from(*i),
            AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            AttributeValue::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    pub properties: HashMap<String, AttributeValue>,
    pub id: Option<String>,
}

impl Feature {
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Builder-style attribute setter
    pub fn with_property(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// Named collection of features sharing one CRS
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    /// Dataset name used in error messages
    pub name: String,
    pub crs: CRS,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(name: impl Into<String>, crs: CRS) -> Self {
        Self {
            name: name.into(),
            crs,
            features: Vec::new(),
        }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Fail fast when the collection's CRS was never set.
    pub fn require_known_crs(&self) -> Result<()> {
        self.crs.require_known(&self.name)
    }

    /// Integer value of `field` on feature `index`.
    ///
    /// A missing field or a value that is not integral is an
    /// [`Error::InvalidAttribute`] naming the field and feature.
    pub fn integer_attribute(&self, index: usize, field: &str) -> Result<i64> {
        let invalid = |reason: String| Error::InvalidAttribute {
            field: field.to_string(),
            feature: index,
            reason,
        };
        let feature = self
            .features
            .get(index)
            .ok_or_else(|| invalid(format!("{} has no feature {index}", self.name)))?;
        let value = feature
            .get_property(field)
            .ok_or_else(|| invalid(format!("missing in {}", self.name)))?;
        value
            .as_integer()
            .ok_or_else(|| invalid(format!("{value:?} is not an integer")))
    }

    /// Copy of the collection expressed in `target`.
    ///
    /// Returns the collection unchanged when the CRSs are equivalent.
    pub fn reprojected(&self, target: &CRS) -> Result<FeatureCollection> {
        self.require_known_crs()?;
        let transform = CoordinateTransform::new(&self.crs, target)?;
        if transform.is_identity() {
            return Ok(self.clone());
        }

        tracing::debug!(
            dataset = %self.name,
            from = %self.crs,
            to = %target,
            features = self.len(),
            "reprojecting features"
        );

        let features = self
            .features
            .iter()
            .map(|f| Feature {
                geometry: f.geometry.as_ref().map(|g| {
                    g.map_coords(|c| {
                        let (x, y) = transform.apply(c.x, c.y);
                        Coord { x, y }
                    })
                }),
                properties: f.properties.clone(),
                id: f.id.clone(),
            })
            .collect();

        Ok(FeatureCollection {
            name: self.name.clone(),
            crs: target.clone(),
            features,
        })
    }

    /// Append another collection's features, reprojecting them into this
    /// collection's CRS first.
    pub fn merge(&mut self, other: &FeatureCollection) -> Result<()> {
        let other = other.reprojected(&self.crs)?;
        self.features.extend(other.features);
        Ok(())
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}
