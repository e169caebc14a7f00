//! Envelope R-tree over polygon features, queried by cell centre.

use geo::{BoundingRect, Intersects};
use geo_types::{Geometry, MultiPolygon, Point, Polygon};
use rstar::{Envelope, PointDistance, RTree, RTreeObject, AABB};

/// Index entry: feature position plus its envelope.
#[derive(Debug, Clone)]
pub(crate) struct IndexedEnvelope {
    pub fidx: usize,
    pub envelope: AABB<[f64; 2]>,
}

impl PointDistance for IndexedEnvelope {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.envelope.distance_2(point)
    }

    fn contains_point(&self, point: &[f64; 2]) -> bool {
        self.envelope.contains_point(point)
    }
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Polygons in input order with an envelope index.
pub(crate) struct PolygonIndex {
    tree: RTree<IndexedEnvelope>,
    polygons: Vec<MultiPolygon<f64>>,
}

impl PolygonIndex {
    pub fn new(polygons: Vec<MultiPolygon<f64>>) -> Self {
        let entries = polygons
            .iter()
            .enumerate()
            .filter_map(|(fidx, p)| {
                let rect = p.bounding_rect()?;
                Some(IndexedEnvelope {
                    fidx,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
            polygons,
        }
    }

    pub fn polygon(&self, fidx: usize) -> &MultiPolygon<f64> {
        &self.polygons[fidx]
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    /// Positions of every polygon intersecting `(x, y)`, in input order.
    pub fn covering(&self, x: f64, y: f64) -> Vec<usize> {
        let point = Point::new(x, y);
        let mut hits: Vec<usize> = self
            .tree
            .locate_all_at_point(&[x, y])
            .filter(|e| self.polygons[e.fidx].intersects(&point))
            .map(|e| e.fidx)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Lowest input position among polygons intersecting `(x, y)`.
    pub fn first_covering(&self, x: f64, y: f64) -> Option<usize> {
        let point = Point::new(x, y);
        self.tree
            .locate_all_at_point(&[x, y])
            .filter(|e| self.polygons[e.fidx].intersects(&point))
            .map(|e| e.fidx)
            .min()
    }
}

/// Polygonal parts of a geometry, or `None` when it has no area.
pub(crate) fn polygon_parts(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    let mut parts: Vec<Polygon<f64>> = Vec::new();
    collect_polygons(geometry, &mut parts);
    (!parts.is_empty()).then(|| MultiPolygon(parts))
}

fn collect_polygons(geometry: &Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p.clone()),
        Geometry::MultiPolygon(mp) => out.extend(mp.0.iter().cloned()),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => gc.iter().for_each(|g| collect_polygons(g, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    #[test]
    fn test_covering_in_input_order() {
        let big = MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0),
        ]]);
        let small = MultiPolygon(vec![polygon![
            (x: 2.0, y: 2.0), (x: 4.0, y: 2.0), (x: 4.0, y: 4.0), (x: 2.0, y: 4.0),
        ]]);
        let index = PolygonIndex::new(vec![small, big]);
        assert_eq!(index.covering(3.0, 3.0), vec![0, 1]);
        assert_eq!(index.first_covering(3.0, 3.0), Some(0));
        assert_eq!(index.first_covering(8.0, 8.0), Some(1));
        assert_eq!(index.first_covering(11.0, 8.0), None);
    }
}
