//! Total polygon area per class

use std::collections::BTreeMap;

use geo::Area;
use wildpath_core::vector::FeatureCollection;
use wildpath_core::{Error, Result};

use crate::rasterize::polygon_parts;

/// Total polygon area of each value of `class_field`, in squared units of
/// the collection's CRS, ordered by class.
///
/// # Errors
/// - `UnknownSpatialReference` when the collection has no CRS
/// - `InvalidAttribute` for a non-integral class or a non-polygon geometry
pub fn class_area_summary(features: &FeatureCollection, class_field: &str) -> Result<BTreeMap<i64, f64>> {
    features.require_known_crs()?;
    if features.crs.is_geographic() {
        tracing::warn!(
            dataset = %features.name,
            "class areas of a geographic CRS are in squared degrees"
        );
    }

    let mut areas: BTreeMap<i64, f64> = BTreeMap::new();
    for (index, feature) in features.iter().enumerate() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let polygon = polygon_parts(geometry).ok_or_else(|| Error::InvalidAttribute {
            field: "geometry".to_string(),
            feature: index,
            reason: format!("{} holds a non-polygon geometry", features.name),
        })?;
        let class = features.integer_attribute(index, class_field)?;
        *areas.entry(class).or_insert(0.0) += polygon.unsigned_area();
    }
    Ok(areas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo_types::{polygon, Geometry};
    use wildpath_core::vector::{AttributeValue, Feature};
    use wildpath_core::CRS;

    fn parcel(x0: f64, w: f64, h: f64, class: i64) -> Feature {
        Feature::new(Geometry::Polygon(polygon![
            (x: x0, y: 0.0), (x: x0 + w, y: 0.0), (x: x0 + w, y: h), (x: x0, y: h),
        ]))
        .with_property("LC_class", AttributeValue::Int(class))
    }

    #[test]
    fn test_area_per_class() {
        let mut fc = FeatureCollection::new("landcover", CRS::from_epsg(26911));
        fc.push(parcel(0.0, 100.0, 50.0, 110));
        fc.push(parcel(100.0, 20.0, 10.0, 20));
        fc.push(parcel(200.0, 10.0, 10.0, 110));

        let areas = class_area_summary(&fc, "LC_class").unwrap();
        assert_eq!(areas.keys().copied().collect::<Vec<_>>(), vec![20, 110]);
        assert_relative_eq!(areas[&110], 5100.0);
        assert_relative_eq!(areas[&20], 200.0);
    }

    #[test]
    fn test_unknown_crs_rejected() {
        let mut fc = FeatureCollection::new("landcover", CRS::unknown());
        fc.push(parcel(0.0, 1.0, 1.0, 1));
        assert!(matches!(
            class_area_summary(&fc, "LC_class"),
            Err(Error::UnknownSpatialReference { .. })
        ));
    }
}
