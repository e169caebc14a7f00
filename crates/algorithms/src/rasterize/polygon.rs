//! Polygon to categorical raster conversion

use serde::{Deserialize, Serialize};
use wildpath_core::raster::Raster;
use wildpath_core::vector::FeatureCollection;
use wildpath_core::{Algorithm, Error, Grid, Result};

use super::{polygon_parts, PolygonIndex};
use crate::maybe_rayon::*;

/// How a cell picks among the polygons that touch it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PolygonAssignment {
    /// The first polygon (input order) intersecting the cell centre wins.
    #[default]
    CellCenter,
    /// The polygon covering most points of a `samples × samples` lattice
    /// inside the cell wins; ties go to the earlier polygon.
    MaximumArea { samples: usize },
}

/// Polygon-to-raster as an [`Algorithm`].
#[derive(Debug, Clone)]
pub struct PolygonToRaster {
    pub class_field: String,
    pub grid: Grid,
}

impl Algorithm for PolygonToRaster {
    type Input = FeatureCollection;
    type Output = Raster<i32>;
    type Params = PolygonAssignment;
    type Error = Error;

    fn name(&self) -> &'static str {
        "PolygonToRaster"
    }

    fn description(&self) -> &'static str {
        "Rasterize polygon class values onto the grid"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        polygon_to_raster(&input, &self.class_field, &self.grid, params)
    }
}

/// Rasterize polygon features onto `grid`, taking each cell's value from
/// `class_field`.
///
/// Cells outside the grid mask or touched by no polygon are no-data
/// (`i32::MIN`). Class values must be integral; features without geometry
/// are ignored.
///
/// # Errors
/// - `UnknownSpatialReference` when the features have no CRS
/// - `InvalidAttribute` for a non-integral class value or a non-polygon
///   geometry
pub fn polygon_to_raster(
    features: &FeatureCollection,
    class_field: &str,
    grid: &Grid,
    assignment: PolygonAssignment,
) -> Result<Raster<i32>> {
    if let PolygonAssignment::MaximumArea { samples } = assignment
        && samples == 0
    {
        return Err(Error::invalid_parameter(
            "samples",
            samples,
            "maximum-area assignment needs at least one sample per axis",
        ));
    }

    let features = features.reprojected(grid.crs())?;

    let mut polygons = Vec::with_capacity(features.len());
    let mut classes = Vec::with_capacity(features.len());
    for (index, feature) in features.iter().enumerate() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let parts = polygon_parts(geometry).ok_or_else(|| Error::InvalidAttribute {
            field: "geometry".to_string(),
            feature: index,
            reason: format!("{} holds a non-polygon geometry", features.name),
        })?;
        let class = features.integer_attribute(index, class_field)?;
        let class = i32::try_from(class)
            .ok()
            .filter(|c| *c != i32::MIN)
            .ok_or_else(|| Error::InvalidAttribute {
                field: class_field.to_string(),
                feature: index,
                reason: format!("class {class} does not fit a 32-bit class code"),
            })?;
        polygons.push(parts);
        classes.push(class);
    }

    tracing::debug!(
        dataset = %features.name,
        polygons = polygons.len(),
        ?assignment,
        "rasterizing polygons"
    );

    let index = PolygonIndex::new(polygons);
    let (rows, cols) = grid.shape();
    let transform = *grid.transform();
    let nodata = i32::MIN;

    let data: Vec<i32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![nodata; cols];
            for (col, cell) in row_data.iter_mut().enumerate() {
                if !grid.in_mask(row, col) {
                    continue;
                }
                let winner = match assignment {
                    PolygonAssignment::CellCenter => {
                        let (x, y) = transform.pixel_to_geo(col, row);
                        index.first_covering(x, y)
                    }
                    PolygonAssignment::MaximumArea { samples } => {
                        majority_polygon(&index, &transform, row, col, samples)
                    }
                };
                if let Some(fidx) = winner {
                    *cell = classes[fidx];
                }
            }
            row_data
        })
        .collect();

    grid.raster_from_vec(data)
}

fn majority_polygon(
    index: &PolygonIndex,
    transform: &wildpath_core::GeoTransform,
    row: usize,
    col: usize,
    samples: usize,
) -> Option<usize> {
    let mut counts = vec![0usize; index.len()];
    let step = 1.0 / samples as f64;
    for i in 0..samples {
        for j in 0..samples {
            let (x, y) = transform.fractional_to_geo(
                col as f64 + (j as f64 + 0.5) * step,
                row as f64 + (i as f64 + 0.5) * step,
            );
            for fidx in index.covering(x, y) {
                counts[fidx] += 1;
            }
        }
    }
    // Strictly greater keeps the earliest polygon on ties.
    let mut best: Option<(usize, usize)> = None;
    for (fidx, &count) in counts.iter().enumerate() {
        if count > 0 && best.is_none_or(|(_, c)| count > c) {
            best = Some((fidx, count));
        }
    }
    best.map(|(fidx, _)| fidx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{polygon, Geometry, LineString, MultiPolygon};
    use wildpath_core::vector::{AttributeValue, Feature};
    use wildpath_core::CRS;

    fn grid() -> Grid {
        let boundary = MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0), (x: 100.0, y: 0.0), (x: 100.0, y: 100.0), (x: 0.0, y: 100.0),
        ]]);
        Grid::with_boundary(CRS::from_epsg(26911), 25.0, boundary, None).unwrap()
    }

    fn class_polygon(coords: [(f64, f64); 4], class: i64) -> Feature {
        let p = polygon![
            (x: coords[0].0, y: coords[0].1),
            (x: coords[1].0, y: coords[1].1),
            (x: coords[2].0, y: coords[2].1),
            (x: coords[3].0, y: coords[3].1),
        ];
        Feature::new(Geometry::Polygon(p)).with_property("LC_class", AttributeValue::Int(class))
    }

    fn landcover() -> FeatureCollection {
        let mut fc = FeatureCollection::new("landcover", CRS::from_epsg(26911));
        // West half forest (110), east half shrub (31).
        fc.push(class_polygon([(0.0, 0.0), (50.0, 0.0), (50.0, 100.0), (0.0, 100.0)], 110));
        fc.push(class_polygon([(50.0, 0.0), (100.0, 0.0), (100.0, 100.0), (50.0, 100.0)], 31));
        fc
    }

    #[test]
    fn test_cell_center_assignment() {
        let raster = polygon_to_raster(&landcover(), "LC_class", &grid(), PolygonAssignment::CellCenter)
            .unwrap();
        assert_eq!(raster.shape(), (4, 4));
        assert_eq!(raster.get(0, 0).unwrap(), 110);
        assert_eq!(raster.get(0, 1).unwrap(), 110);
        assert_eq!(raster.get(3, 2).unwrap(), 31);
        assert_eq!(raster.get(3, 3).unwrap(), 31);
    }

    #[test]
    fn test_overlap_first_feature_wins() {
        let mut fc = landcover();
        fc.features.insert(
            0,
            class_polygon([(0.0, 75.0), (100.0, 75.0), (100.0, 100.0), (0.0, 100.0)], 20),
        );
        let raster =
            polygon_to_raster(&fc, "LC_class", &grid(), PolygonAssignment::CellCenter).unwrap();
        assert_eq!(raster.get(0, 3).unwrap(), 20);
        assert_eq!(raster.get(1, 3).unwrap(), 31);
    }

    #[test]
    fn test_maximum_area_picks_dominant_polygon() {
        let mut fc = FeatureCollection::new("landcover", CRS::from_epsg(26911));
        // A thin sliver holds the centre of cell (0, 0); the two wide strips
        // either side tie on area and the earlier one wins.
        fc.push(class_polygon([(0.0, 75.0), (12.0, 75.0), (12.0, 100.0), (0.0, 100.0)], 50));
        fc.push(class_polygon([(12.0, 75.0), (13.0, 75.0), (13.0, 100.0), (12.0, 100.0)], 120));
        fc.push(class_polygon([(13.0, 75.0), (25.0, 75.0), (25.0, 100.0), (13.0, 100.0)], 210));

        let center = polygon_to_raster(&fc, "LC_class", &grid(), PolygonAssignment::CellCenter).unwrap();
        assert_eq!(center.get(0, 0).unwrap(), 120);

        let area = polygon_to_raster(
            &fc,
            "LC_class",
            &grid(),
            PolygonAssignment::MaximumArea { samples: 10 },
        )
        .unwrap();
        assert_eq!(area.get(0, 0).unwrap(), 50);
        assert!(area.is_nodata_at(2, 2).unwrap());
    }

    #[test]
    fn test_outside_mask_is_nodata() {
        let boundary = MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0), (x: 100.0, y: 0.0), (x: 0.0, y: 100.0),
        ]]);
        let grid = Grid::with_boundary(CRS::from_epsg(26911), 25.0, boundary, None).unwrap();
        let raster =
            polygon_to_raster(&landcover(), "LC_class", &grid, PolygonAssignment::CellCenter).unwrap();
        assert!(raster.is_nodata_at(0, 3).unwrap());
        assert_eq!(raster.get(3, 0).unwrap(), 110);
    }

    #[test]
    fn test_unknown_crs_fails_fast() {
        let mut fc = landcover();
        fc.crs = CRS::unknown();
        let err = polygon_to_raster(&fc, "LC_class", &grid(), PolygonAssignment::CellCenter)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownSpatialReference { ref dataset } if dataset == "landcover"));
    }

    #[test]
    fn test_non_integral_class_names_feature() {
        let mut fc = landcover();
        fc.features[1].set_property("LC_class", AttributeValue::String("shrub".into()));
        let err = polygon_to_raster(&fc, "LC_class", &grid(), PolygonAssignment::CellCenter)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAttribute { feature: 1, .. }));
    }

    #[test]
    fn test_line_geometry_rejected() {
        let mut fc = landcover();
        fc.push(
            Feature::new(Geometry::LineString(LineString::from(vec![(0.0, 0.0), (10.0, 10.0)])))
                .with_property("LC_class", AttributeValue::Int(20)),
        );
        let err = polygon_to_raster(&fc, "LC_class", &grid(), PolygonAssignment::CellCenter)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAttribute { ref field, feature: 2, .. } if field == "geometry"));
    }

    #[test]
    fn test_assignment_serde() {
        let a: PolygonAssignment =
            serde_json::from_str(r#"{"method": "maximum_area", "samples": 4}"#).unwrap();
        assert_eq!(a, PolygonAssignment::MaximumArea { samples: 4 });
        let b: PolygonAssignment = serde_json::from_str(r#"{"method": "cell_center"}"#).unwrap();
        assert_eq!(b, PolygonAssignment::CellCenter);
    }
}
