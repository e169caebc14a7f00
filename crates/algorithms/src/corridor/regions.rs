//! Habitat regions on the grid
//!
//! A region is a set of cells sharing one integer id. Polygon regions
//! claim every in-mask cell whose centre intersects them; a polygon too
//! small to hold a cell centre claims the cell containing its interior
//! point. Point regions claim the cell they fall in.

use std::collections::BTreeMap;

use geo::{BoundingRect, InteriorPoint, Intersects};
use geo_types::{Geometry, MultiPolygon, Point};
use ndarray::Array2;
use wildpath_core::vector::FeatureCollection;
use wildpath_core::{Error, Grid, Result};

use crate::rasterize::polygon_parts;

/// One habitat region and the cells it occupies, in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: i64,
    pub cells: Vec<(usize, usize)>,
}

/// Disjoint regions ordered by id.
#[derive(Debug, Clone)]
pub struct RegionSet {
    regions: Vec<Region>,
}

impl RegionSet {
    /// Rasterize `features` onto `grid`.
    ///
    /// Ids come from `id_field` when given, otherwise from 1-based feature
    /// order. Features sharing an id form one region.
    ///
    /// # Errors
    /// - `UnknownSpatialReference` when the features have no CRS
    /// - `InvalidAttribute` for a non-integral id or a line geometry
    /// - `OverlappingRegions` when two ids claim the same cell
    pub fn rasterize(features: &FeatureCollection, id_field: Option<&str>, grid: &Grid) -> Result<Self> {
        let features = features.reprojected(grid.crs())?;

        let mut claims: BTreeMap<i64, Vec<(usize, usize)>> = BTreeMap::new();
        for (index, feature) in features.iter().enumerate() {
            let Some(geometry) = &feature.geometry else {
                continue;
            };
            let id = match id_field {
                Some(field) => features.integer_attribute(index, field)?,
                None => index as i64 + 1,
            };
            let cells = geometry_cells(geometry, grid).ok_or_else(|| Error::InvalidAttribute {
                field: "geometry".to_string(),
                feature: index,
                reason: format!("{} regions must be polygons or points", features.name),
            })?;
            if cells.is_empty() {
                tracing::warn!(region = id, feature = index, "region covers no grid cell");
            }
            claims.entry(id).or_default().extend(cells);
        }

        let set = Self::from_cells(grid.shape(), claims.into_iter().collect())?;
        tracing::debug!(
            dataset = %features.name,
            regions = set.len(),
            cells = set.regions.iter().map(|r| r.cells.len()).sum::<usize>(),
            "regions rasterized"
        );
        Ok(set)
    }

    /// Build a set from explicit `(id, cells)` claims on a `rows × cols`
    /// grid. Repeated ids merge; cells are deduplicated.
    ///
    /// # Errors
    /// `OverlappingRegions` when two ids claim the same cell, and
    /// `InvalidParameter` for a cell off the grid.
    pub fn from_cells(shape: (usize, usize), claims: Vec<(i64, Vec<(usize, usize)>)>) -> Result<Self> {
        let mut merged: BTreeMap<i64, Vec<(usize, usize)>> = BTreeMap::new();
        for (id, cells) in claims {
            merged.entry(id).or_default().extend(cells);
        }

        let mut owner: Array2<Option<i64>> = Array2::from_elem(shape, None);
        let mut regions = Vec::with_capacity(merged.len());
        for (id, mut cells) in merged {
            cells.sort_unstable();
            cells.dedup();
            for &(row, col) in &cells {
                let slot = owner.get_mut((row, col)).ok_or_else(|| {
                    Error::invalid_parameter(
                        "region cell",
                        format!("({row}, {col})"),
                        format!("outside the {}x{} grid", shape.0, shape.1),
                    )
                })?;
                if let Some(first) = *slot {
                    return Err(Error::OverlappingRegions {
                        first,
                        second: id,
                        row,
                        col,
                    });
                }
                *slot = Some(id);
            }
            regions.push(Region { id, cells });
        }
        Ok(Self { regions })
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn ids(&self) -> Vec<i64> {
        self.regions.iter().map(|r| r.id).collect()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Cells claimed by one geometry, or `None` for a geometry that cannot be
/// a region.
fn geometry_cells(geometry: &Geometry<f64>, grid: &Grid) -> Option<Vec<(usize, usize)>> {
    match geometry {
        Geometry::Point(p) => Some(point_cell(p, grid).into_iter().collect()),
        Geometry::MultiPoint(mp) => Some(mp.iter().filter_map(|p| point_cell(p, grid)).collect()),
        _ => polygon_parts(geometry).map(|parts| polygon_cells(&parts, grid)),
    }
}

fn point_cell(point: &Point<f64>, grid: &Grid) -> Option<(usize, usize)> {
    grid.cell_at(point.x(), point.y())
        .filter(|&(row, col)| grid.in_mask(row, col))
}

fn polygon_cells(polygon: &MultiPolygon<f64>, grid: &Grid) -> Vec<(usize, usize)> {
    let Some(rect) = polygon.bounding_rect() else {
        return Vec::new();
    };
    let transform = grid.transform();
    let (rows, cols) = grid.shape();
    let (c0, r0) = transform.geo_to_pixel(rect.min().x, rect.max().y);
    let (c1, r1) = transform.geo_to_pixel(rect.max().x, rect.min().y);
    let clamp = |v: f64, n: usize| (v.max(0.0) as usize).min(n);
    let (row_start, row_end) = (clamp(r0.floor(), rows), clamp(r1.ceil(), rows));
    let (col_start, col_end) = (clamp(c0.floor(), cols), clamp(c1.ceil(), cols));

    let mut cells = Vec::new();
    for row in row_start..row_end {
        for col in col_start..col_end {
            if !grid.in_mask(row, col) {
                continue;
            }
            let (x, y) = grid.cell_center(row, col);
            if polygon.intersects(&Point::new(x, y)) {
                cells.push((row, col));
            }
        }
    }

    if cells.is_empty()
        && let Some(interior) = polygon.interior_point()
        && let Some(cell) = point_cell(&interior, grid)
    {
        cells.push(cell);
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point, polygon};
    use wildpath_core::grid::Extent;
    use wildpath_core::vector::{AttributeValue, Feature};
    use wildpath_core::CRS;

    fn grid() -> Grid {
        Grid::new(
            CRS::from_epsg(26911),
            10.0,
            Extent::new(0.0, 0.0, 100.0, 100.0).unwrap(),
        )
        .unwrap()
    }

    fn square(x0: f64, y0: f64, size: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x0, y: y0), (x: x0 + size, y: y0), (x: x0 + size, y: y0 + size), (x: x0, y: y0 + size),
        ])
    }

    fn habitat(geometries: Vec<Geometry<f64>>) -> FeatureCollection {
        let mut fc = FeatureCollection::new("habitat", CRS::from_epsg(26911));
        for g in geometries {
            fc.push(Feature::new(g));
        }
        fc
    }

    #[test]
    fn test_polygon_claims_centres() {
        let fc = habitat(vec![square(0.0, 80.0, 20.0), square(80.0, 0.0, 20.0)]);
        let set = RegionSet::rasterize(&fc, None, &grid()).unwrap();
        assert_eq!(set.ids(), vec![1, 2]);
        assert_eq!(set.regions()[0].cells, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
        assert_eq!(set.regions()[1].cells.len(), 4);
        assert!(set.regions()[1].cells.contains(&(9, 9)));
    }

    #[test]
    fn test_tiny_polygon_claims_interior_cell() {
        let fc = habitat(vec![square(41.0, 41.0, 2.0)]);
        let set = RegionSet::rasterize(&fc, None, &grid()).unwrap();
        assert_eq!(set.regions()[0].cells, vec![(5, 4)]);
    }

    #[test]
    fn test_point_regions() {
        let fc = habitat(vec![
            Geometry::Point(point!(x: 5.0, y: 95.0)),
            Geometry::Point(point!(x: 95.0, y: 5.0)),
        ]);
        let set = RegionSet::rasterize(&fc, None, &grid()).unwrap();
        assert_eq!(set.regions()[0].cells, vec![(0, 0)]);
        assert_eq!(set.regions()[1].cells, vec![(9, 9)]);
    }

    #[test]
    fn test_shared_id_merges_features() {
        let mut fc = habitat(vec![square(0.0, 80.0, 10.0), square(80.0, 0.0, 10.0)]);
        for f in &mut fc.features {
            f.set_property("HAB_ID", AttributeValue::Int(7));
        }
        let set = RegionSet::rasterize(&fc, Some("HAB_ID"), &grid()).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.regions()[0].cells, vec![(1, 0), (9, 8)]);
    }

    #[test]
    fn test_overlap_is_rejected() {
        let fc = habitat(vec![square(0.0, 70.0, 30.0), square(10.0, 60.0, 30.0)]);
        match RegionSet::rasterize(&fc, None, &grid()) {
            Err(Error::OverlappingRegions { first, second, .. }) => {
                assert_eq!((first, second), (1, 2));
            }
            other => panic!("expected OverlappingRegions, got {other:?}"),
        }
    }

    #[test]
    fn test_line_region_rejected() {
        let fc = habitat(vec![Geometry::LineString(line_string![
            (x: 0.0, y: 0.0), (x: 50.0, y: 50.0)
        ])]);
        let err = RegionSet::rasterize(&fc, None, &grid()).unwrap_err();
        assert!(matches!(err, Error::InvalidAttribute { feature: 0, .. }));
    }
}
