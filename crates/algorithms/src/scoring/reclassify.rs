//! Discrete reclassification of categorical rasters
//!
//! Every class code must have an entry in the map. A code without one is an
//! error naming the code and the first cell holding it; it never falls back
//! to a default score.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use wildpath_core::raster::Raster;
use wildpath_core::{Algorithm, Error, Result};

use crate::maybe_rayon::*;

/// Ordered `(source class, target score)` pairs with unique sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(i64, f64)>", into = "Vec<(i64, f64)>")]
pub struct ReclassificationMap {
    entries: Vec<(i64, f64)>,
    lookup: HashMap<i64, f64>,
}

impl ReclassificationMap {
    /// Build a map, rejecting duplicate sources and non-finite targets.
    pub fn new(entries: Vec<(i64, f64)>) -> Result<Self> {
        let mut lookup = HashMap::with_capacity(entries.len());
        for &(source, target) in &entries {
            if !target.is_finite() {
                return Err(Error::invalid_parameter(
                    "reclassification target",
                    format!("{source} -> {target}"),
                    "target scores must be finite",
                ));
            }
            if lookup.insert(source, target).is_some() {
                return Err(Error::invalid_parameter(
                    "reclassification source",
                    source,
                    "source classes must be unique",
                ));
            }
        }
        Ok(Self { entries, lookup })
    }

    pub fn get(&self, source: i64) -> Option<f64> {
        self.lookup.get(&source).copied()
    }

    /// Pairs in declaration order
    pub fn entries(&self) -> &[(i64, f64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<Vec<(i64, f64)>> for ReclassificationMap {
    type Error = Error;

    fn try_from(entries: Vec<(i64, f64)>) -> Result<Self> {
        Self::new(entries)
    }
}

impl From<ReclassificationMap> for Vec<(i64, f64)> {
    fn from(map: ReclassificationMap) -> Self {
        map.entries
    }
}

/// Reclassification as an [`Algorithm`].
#[derive(Debug, Clone, Default)]
pub struct Reclassify;

impl Algorithm for Reclassify {
    type Input = (Raster<i32>, ReclassificationMap);
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Reclassify"
    }

    fn description(&self) -> &'static str {
        "Replace class codes with scores from a reclassification map"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        reclassify(&input.0, &input.1)
    }
}

/// Replace every class code by its mapped score.
///
/// No-data cells stay no-data (NaN in the output).
///
/// # Errors
/// `UnmappedClass` for the first cell, in row-major order, whose code has
/// no entry in `map`.
pub fn reclassify(raster: &Raster<i32>, map: &ReclassificationMap) -> Result<Raster<f64>> {
    let (rows, cols) = raster.shape();

    let row_results: Vec<Result<Vec<f64>>> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, cell) in row_data.iter_mut().enumerate() {
                let value = unsafe { raster.get_unchecked(row, col) };
                if raster.is_nodata(value) {
                    continue;
                }
                let value = i64::from(value);
                *cell = map
                    .get(value)
                    .ok_or(Error::UnmappedClass { value, row, col })?;
            }
            Ok(row_data)
        })
        .collect();

    // Sequential scan keeps the reported cell the first in row-major order.
    let mut data = Vec::with_capacity(rows * cols);
    for row in row_results {
        data.extend(row?);
    }

    let mut output = raster.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = ndarray::Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn landcover_map() -> ReclassificationMap {
        ReclassificationMap::new(vec![(20, 10.0), (31, 8.0), (110, 2.0)]).unwrap()
    }

    #[test]
    fn test_reclassify_mapped_cells() {
        let mut raster = Raster::from_vec(vec![20, 31, 110, i32::MIN], 2, 2).unwrap();
        raster.set_nodata(Some(i32::MIN));
        let scores = reclassify(&raster, &landcover_map()).unwrap();
        assert_eq!(scores.get(0, 0).unwrap(), 10.0);
        assert_eq!(scores.get(0, 1).unwrap(), 8.0);
        assert_eq!(scores.get(1, 0).unwrap(), 2.0);
        assert!(scores.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_first_unmapped_cell_reported() {
        let raster = Raster::from_vec(vec![20, 31, 110, 32, 20, 50], 2, 3).unwrap();
        match reclassify(&raster, &landcover_map()) {
            Err(Error::UnmappedClass { value, row, col }) => {
                assert_eq!((value, row, col), (32, 1, 0));
            }
            other => panic!("expected UnmappedClass, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_sources_rejected() {
        let err = ReclassificationMap::new(vec![(20, 10.0), (20, 1.0)]).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn test_map_from_json_pairs() {
        let map: ReclassificationMap =
            serde_json::from_str("[[20, 10], [31, 8], [110, 2]]").unwrap();
        assert_eq!(map.get(110), Some(2.0));
        assert_eq!(map.entries()[0], (20, 10.0));
        assert!(serde_json::from_str::<ReclassificationMap>("[[1, 1], [1, 2]]").is_err());
    }
}
