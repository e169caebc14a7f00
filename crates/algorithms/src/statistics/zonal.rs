//! Zonal statistics
//!
//! Computes statistics for each zone defined by an integer zone raster.
//! Zones are identified by unique integer values in the zone raster;
//! no-data zones and no-data values are skipped.

use std::collections::BTreeMap;

use wildpath_core::raster::Raster;
use wildpath_core::vector::FeatureCollection;
use wildpath_core::{Error, Grid, Result};

use crate::rasterize::{polygon_to_raster, PolygonAssignment};

/// Result of zonal statistics for one zone
#[derive(Debug, Clone, PartialEq)]
pub struct ZonalResult {
    pub zone_id: i32,
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub median: f64,
}

impl ZonalResult {
    fn from_values(zone_id: i32, mut vals: Vec<f64>) -> Option<Self> {
        if vals.is_empty() {
            return None;
        }
        let count = vals.len();
        let sum: f64 = vals.iter().sum();
        let mean = sum / count as f64;
        let var = vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;

        vals.sort_by(f64::total_cmp);
        let min = vals[0];
        let max = vals[count - 1];
        let median = if count % 2 == 0 {
            (vals[count / 2 - 1] + vals[count / 2]) / 2.0
        } else {
            vals[count / 2]
        };

        Some(Self {
            zone_id,
            count,
            sum,
            mean,
            std_dev: var.sqrt(),
            min,
            max,
            range: max - min,
            median,
        })
    }
}

/// Compute zonal statistics
///
/// For each zone in `zones`, computes statistics from the corresponding
/// valid cells of `values`. Zones with no valid value are left out.
///
/// # Returns
/// Map from zone id to its statistics, ordered by zone id
pub fn zonal_statistics(
    values: &Raster<f64>,
    zones: &Raster<i32>,
) -> Result<BTreeMap<i32, ZonalResult>> {
    let (rows_v, cols_v) = values.shape();
    let (rows_z, cols_z) = zones.shape();

    if rows_v != rows_z || cols_v != cols_z {
        return Err(Error::SizeMismatch {
            er: rows_v,
            ec: cols_v,
            ar: rows_z,
            ac: cols_z,
        });
    }

    let mut zone_values: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for row in 0..rows_v {
        for col in 0..cols_v {
            let zone = unsafe { zones.get_unchecked(row, col) };
            let val = unsafe { values.get_unchecked(row, col) };
            if zones.is_nodata(zone) || values.is_nodata(val) {
                continue;
            }
            zone_values.entry(zone).or_default().push(val);
        }
    }

    Ok(zone_values
        .into_iter()
        .filter_map(|(zone_id, vals)| ZonalResult::from_values(zone_id, vals).map(|r| (zone_id, r)))
        .collect())
}

/// Zonal statistics with zones taken from polygon features.
///
/// The zones are rasterized onto `grid` by cell centre, reading zone ids
/// from `zone_field`; `values` must already be on `grid`.
pub fn zonal_statistics_by_features(
    values: &Raster<f64>,
    zones: &FeatureCollection,
    zone_field: &str,
    grid: &Grid,
) -> Result<BTreeMap<i32, ZonalResult>> {
    grid.conforms(values, "values")?;
    let zone_raster = polygon_to_raster(zones, zone_field, grid, PolygonAssignment::CellCenter)?;
    zonal_statistics(values, &zone_raster)
}

/// Statistics of `values` over the whole study area (the grid mask).
///
/// `None` when no in-mask cell holds a value.
pub fn study_area_statistics(values: &Raster<f64>, grid: &Grid) -> Result<Option<ZonalResult>> {
    grid.conforms(values, "values")?;
    let mut vals = Vec::with_capacity(grid.mask_count());
    for ((row, col), &inside) in grid.mask().indexed_iter() {
        if !inside {
            continue;
        }
        if let Some(v) = values.valid_value(row, col) {
            vals.push(v);
        }
    }
    Ok(ZonalResult::from_values(1, vals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo_types::{polygon, Geometry, MultiPolygon};
    use wildpath_core::vector::{AttributeValue, Feature};
    use wildpath_core::{GeoTransform, CRS};

    #[test]
    fn test_zonal_basic() {
        let mut values = Raster::new(4, 4);
        values.set_transform(GeoTransform::north_up(0.0, 4.0, 1.0));
        let mut zones: Raster<i32> = Raster::new(4, 4);
        zones.set_transform(GeoTransform::north_up(0.0, 4.0, 1.0));

        // Zone 1: west half, Zone 2: east half
        for row in 0..4 {
            for col in 0..4 {
                values.set(row, col, (row * 4 + col) as f64).unwrap();
                zones.set(row, col, if col < 2 { 1 } else { 2 }).unwrap();
            }
        }

        let results = zonal_statistics(&values, &zones).unwrap();
        assert_eq!(results.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        let z1 = &results[&1];
        assert_eq!(z1.count, 8);
        assert_relative_eq!(z1.mean, 6.5);
        assert_relative_eq!(z1.median, 6.5);
        assert_relative_eq!(results[&2].max, 15.0);
    }

    #[test]
    fn test_zonal_uniform_zone() {
        let values = Raster::filled(5, 5, 10.0_f64);
        let zones: Raster<i32> = Raster::filled(5, 5, 1);

        let z1 = &zonal_statistics(&values, &zones).unwrap()[&1];
        assert_eq!(z1.count, 25);
        assert_relative_eq!(z1.mean, 10.0);
        assert_relative_eq!(z1.std_dev, 0.0);
        assert_relative_eq!(z1.range, 0.0);
    }

    #[test]
    fn test_zonal_dimension_mismatch() {
        let values: Raster<f64> = Raster::new(5, 5);
        let zones: Raster<i32> = Raster::new(3, 3);
        assert!(matches!(
            zonal_statistics(&values, &zones),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_zonal_skip_nodata() {
        let mut values = Raster::filled(3, 3, 5.0);
        values.set(1, 1, f64::NAN).unwrap();
        let mut zones: Raster<i32> = Raster::filled(3, 3, 1);
        zones.set_nodata(Some(i32::MIN));
        zones.set(0, 0, i32::MIN).unwrap();

        let results = zonal_statistics(&values, &zones).unwrap();
        assert_eq!(results[&1].count, 7);
    }

    fn grid() -> Grid {
        let boundary = MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0), (x: 40.0, y: 0.0), (x: 40.0, y: 40.0), (x: 0.0, y: 40.0),
        ]]);
        Grid::with_boundary(CRS::from_epsg(26911), 10.0, boundary, None).unwrap()
    }

    #[test]
    fn test_by_features_and_study_area() {
        let g = grid();
        let mut dem = g.raster_filled(1000.0);
        for col in 0..4 {
            dem.set(0, col, 1400.0).unwrap();
        }

        let mut zones = FeatureCollection::new("parks", CRS::from_epsg(26911));
        zones.push(
            Feature::new(Geometry::Polygon(polygon![
                (x: 0.0, y: 30.0), (x: 40.0, y: 30.0), (x: 40.0, y: 40.0), (x: 0.0, y: 40.0),
            ]))
            .with_property("PARK", AttributeValue::Int(3)),
        );
        let by_zone = zonal_statistics_by_features(&dem, &zones, "PARK", &g).unwrap();
        assert_eq!(by_zone[&3].count, 4);
        assert_relative_eq!(by_zone[&3].mean, 1400.0);

        let area = study_area_statistics(&dem, &g).unwrap().unwrap();
        assert_eq!(area.count, 16);
        assert_relative_eq!(area.mean, 1100.0);
    }
}
