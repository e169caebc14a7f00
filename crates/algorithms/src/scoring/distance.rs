//! Euclidean distance to source features
//!
//! Source geometries are broken into points and straight segments held in
//! an R-tree; each in-mask cell centre asks the tree for its nearest part.
//! Polygon sources count their interior as distance zero.

use geo_types::{Coord, Geometry, LineString, Polygon};
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use wildpath_core::vector::FeatureCollection;
use wildpath_core::{CancelToken, Error, Grid, Raster, Result};

use super::rescale::{rescale, RescaleFunction};
use crate::maybe_rayon::*;
use crate::rasterize::{polygon_parts, PolygonIndex};

/// Point or straight segment of a source geometry; a point has
/// `start == end`.
#[derive(Debug, Clone)]
struct SourcePart {
    start: [f64; 2],
    end: [f64; 2],
}

impl SourcePart {
    fn point(p: Coord<f64>) -> Self {
        Self {
            start: [p.x, p.y],
            end: [p.x, p.y],
        }
    }

    fn segment(a: Coord<f64>, b: Coord<f64>) -> Self {
        Self {
            start: [a.x, a.y],
            end: [b.x, b.y],
        }
    }
}

impl RTreeObject for SourcePart {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.start, self.end)
    }
}

impl PointDistance for SourcePart {
    /// Squared distance to the closest point of the segment
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let (dx, dy) = (self.end[0] - self.start[0], self.end[1] - self.start[1]);
        let len_2 = dx * dx + dy * dy;
        let t = if len_2 > 0.0 {
            (((point[0] - self.start[0]) * dx + (point[1] - self.start[1]) * dy) / len_2)
                .clamp(0.0, 1.0)
        } else {
            0.0
        };
        let (px, py) = (self.start[0] + t * dx, self.start[1] + t * dy);
        (point[0] - px).powi(2) + (point[1] - py).powi(2)
    }
}

/// Points, segments and polygon interiors of a source collection
struct DistanceSources {
    tree: RTree<SourcePart>,
    areas: PolygonIndex,
}

impl DistanceSources {
    fn build(features: &FeatureCollection) -> Self {
        let mut parts = Vec::new();
        let mut polygons = Vec::new();
        for feature in features.iter() {
            let Some(geometry) = &feature.geometry else {
                continue;
            };
            collect_parts(geometry, &mut parts);
            if let Some(poly) = polygon_parts(geometry) {
                polygons.push(poly);
            }
        }
        Self {
            tree: RTree::bulk_load(parts),
            areas: PolygonIndex::new(polygons),
        }
    }

    fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    fn distance(&self, x: f64, y: f64) -> Option<f64> {
        if self.areas.first_covering(x, y).is_some() {
            return Some(0.0);
        }
        let point = [x, y];
        self.tree
            .nearest_neighbor(&point)
            .map(|part| part.distance_2(&point).sqrt())
    }
}

fn collect_parts(geometry: &Geometry<f64>, out: &mut Vec<SourcePart>) {
    match geometry {
        Geometry::Point(p) => out.push(SourcePart::point(p.0)),
        Geometry::MultiPoint(mp) => out.extend(mp.iter().map(|p| SourcePart::point(p.0))),
        Geometry::Line(l) => out.push(SourcePart::segment(l.start, l.end)),
        Geometry::LineString(ls) => push_line(ls, out),
        Geometry::MultiLineString(mls) => mls.iter().for_each(|ls| push_line(ls, out)),
        Geometry::Polygon(p) => push_rings(p, out),
        Geometry::MultiPolygon(mp) => mp.iter().for_each(|p| push_rings(p, out)),
        Geometry::Rect(r) => push_rings(&r.to_polygon(), out),
        Geometry::Triangle(t) => push_rings(&t.to_polygon(), out),
        Geometry::GeometryCollection(gc) => gc.iter().for_each(|g| collect_parts(g, out)),
    }
}

fn push_rings(polygon: &Polygon<f64>, out: &mut Vec<SourcePart>) {
    push_line(polygon.exterior(), out);
    for ring in polygon.interiors() {
        push_line(ring, out);
    }
}

fn push_line(line: &LineString<f64>, out: &mut Vec<SourcePart>) {
    match line.0.as_slice() {
        [] => {}
        [single] => out.push(SourcePart::point(*single)),
        _ => out.extend(line.lines().map(|l| SourcePart::segment(l.start, l.end))),
    }
}

/// Straight-line distance from every in-mask cell centre to the nearest
/// source geometry, in grid units.
///
/// Sources are reprojected to the grid CRS first. Cells outside the mask
/// are no-data. The cancel token is polled once per row.
///
/// # Errors
/// - `UnknownSpatialReference` when the sources have no CRS
/// - `InvalidParameter` when the collection holds no geometry
/// - `Cancelled`
pub fn distance_accumulation(
    sources: &FeatureCollection,
    grid: &Grid,
    cancel: &CancelToken,
) -> Result<Raster<f64>> {
    let sources_in_grid = sources.reprojected(grid.crs())?;
    let index = DistanceSources::build(&sources_in_grid);
    if index.is_empty() {
        return Err(Error::invalid_parameter(
            "sources",
            &sources.name,
            "distance needs at least one source geometry",
        ));
    }
    tracing::debug!(
        dataset = %sources.name,
        parts = index.tree.size(),
        "distance to sources"
    );

    let (rows, cols) = grid.shape();
    let row_data: Vec<Vec<f64>> = (0..rows)
        .into_par_iter()
        .map(|row| {
            cancel.check()?;
            let mut row_data = vec![f64::NAN; cols];
            for (col, cell) in row_data.iter_mut().enumerate() {
                if !grid.in_mask(row, col) {
                    continue;
                }
                let (x, y) = grid.cell_center(row, col);
                if let Some(d) = index.distance(x, y) {
                    *cell = d;
                }
            }
            Ok(row_data)
        })
        .collect::<Result<Vec<_>>>()?;

    grid.raster_from_vec(row_data.into_iter().flatten().collect())
}

/// Distance to `sources`, then rescaled onto the score range.
pub fn distance_and_rescale(
    sources: &FeatureCollection,
    grid: &Grid,
    function: &RescaleFunction,
    cancel: &CancelToken,
) -> Result<Raster<f64>> {
    let distance = distance_accumulation(sources, grid, cancel)?;
    rescale(&distance, function)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo_types::{line_string, point, polygon};
    use wildpath_core::grid::Extent;
    use wildpath_core::vector::Feature;
    use wildpath_core::CRS;

    fn grid() -> Grid {
        Grid::new(
            CRS::from_epsg(26911),
            10.0,
            Extent::new(0.0, 0.0, 100.0, 100.0).unwrap(),
        )
        .unwrap()
    }

    fn collection(geometries: Vec<Geometry<f64>>) -> FeatureCollection {
        let mut fc = FeatureCollection::new("hydro", CRS::from_epsg(26911));
        for g in geometries {
            fc.push(Feature::new(g));
        }
        fc
    }

    #[test]
    fn test_distance_to_point() {
        let fc = collection(vec![Geometry::Point(point!(x: 5.0, y: 95.0))]);
        let d = distance_accumulation(&fc, &grid(), &CancelToken::new()).unwrap();
        assert_relative_eq!(d.get(0, 0).unwrap(), 0.0);
        assert_relative_eq!(d.get(0, 3).unwrap(), 30.0);
        assert_relative_eq!(d.get(4, 4).unwrap(), 40.0 * std::f64::consts::SQRT_2);
    }

    #[test]
    fn test_distance_to_line_interior() {
        // Vertical stream at x = 50
        let fc = collection(vec![Geometry::LineString(
            line_string![(x: 50.0, y: 0.0), (x: 50.0, y: 100.0)],
        )]);
        let d = distance_accumulation(&fc, &grid(), &CancelToken::new()).unwrap();
        assert_relative_eq!(d.get(3, 4).unwrap(), 5.0);
        assert_relative_eq!(d.get(7, 0).unwrap(), 45.0);
        assert_relative_eq!(d.get(7, 9).unwrap(), 45.0);
    }

    #[test]
    fn test_inside_polygon_is_zero() {
        let fc = collection(vec![Geometry::Polygon(polygon![
            (x: 20.0, y: 20.0), (x: 80.0, y: 20.0), (x: 80.0, y: 80.0), (x: 20.0, y: 80.0),
        ])]);
        let d = distance_accumulation(&fc, &grid(), &CancelToken::new()).unwrap();
        assert_relative_eq!(d.get(5, 5).unwrap(), 0.0);
        // Centre (5, 95) is 15 m above the top edge at y = 80.
        assert_relative_eq!(d.get(0, 2).unwrap(), 15.0);
    }

    #[test]
    fn test_empty_sources_rejected() {
        let fc = collection(vec![]);
        let err = distance_accumulation(&fc, &grid(), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn test_cancelled_before_start() {
        let fc = collection(vec![Geometry::Point(point!(x: 5.0, y: 95.0))]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = distance_accumulation(&fc, &grid(), &cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_rescaled_distance_bounds() {
        let fc = collection(vec![Geometry::Point(point!(x: 5.0, y: 95.0))]);
        let scores = distance_and_rescale(
            &fc,
            &grid(),
            &RescaleFunction::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_relative_eq!(scores.get(0, 0).unwrap(), 1.0);
        assert_relative_eq!(scores.get(9, 9).unwrap(), 10.0);
    }
}
