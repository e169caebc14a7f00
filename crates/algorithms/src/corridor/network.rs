//! Least-cost corridors between habitat regions
//!
//! Every region gets its own multi-source accumulated-cost surface. For a
//! pair `a < b` the corridor ends at the cell of `b` that is cheapest to
//! reach on `a`'s surface and is traced back along the backlinks. The
//! candidate network is then pruned: by default to a minimum spanning
//! forest (Kruskal), or kept whole.

use geo::{Euclidean, Length};
use geo_types::{Coord, Geometry, LineString};
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use wildpath_core::raster::{Connectivity, Raster};
use wildpath_core::vector::{AttributeValue, Feature, FeatureCollection};
use wildpath_core::{Algorithm, CancelToken, Error, Result, CRS};

use super::cost_distance::{accumulate, CostSurface};
use super::regions::RegionSet;
use crate::maybe_rayon::*;

/// Which feasible corridors are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruningPolicy {
    /// Cheapest corridors that join every connected group of regions
    #[default]
    MinimumSpanningTree,
    /// One corridor per feasible pair
    AllPairs,
}

/// Parameters for corridor extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorridorParams {
    pub connectivity: Connectivity,
    pub pruning: PruningPolicy,
}

/// Least-cost route between two regions.
#[derive(Debug, Clone, PartialEq)]
pub struct Corridor {
    pub region_a: i64,
    pub region_b: i64,
    /// Cost-weighted distance from `region_a` to `region_b`, in grid units
    pub accumulated_cost: f64,
    /// Cells from `region_a` to `region_b`
    pub cells: Vec<(usize, usize)>,
    /// Polyline through the centres of `cells`
    pub path: LineString<f64>,
}

impl Corridor {
    /// Reported length: the accumulated cost-weighted distance.
    pub fn length(&self) -> f64 {
        self.accumulated_cost
    }

    /// Plain Euclidean length of the path polyline
    pub fn geometric_length(&self) -> f64 {
        Euclidean.length(&self.path)
    }
}

/// A region pair with no feasible path. Reported, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectedRegions {
    pub region_a: i64,
    pub region_b: i64,
}

impl std::fmt::Display for DisconnectedRegions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Region {} and Region {} cannot be connected",
            self.region_a, self.region_b
        )
    }
}

/// Kept corridors, ordered by region pair, plus the infeasible pairs.
#[derive(Debug, Clone, Default)]
pub struct CorridorSet {
    pub corridors: Vec<Corridor>,
    pub disconnected: Vec<DisconnectedRegions>,
}

impl CorridorSet {
    pub fn total_length(&self) -> f64 {
        self.corridors.iter().map(Corridor::length).sum()
    }

    /// Corridors as line features with `REGION1`, `REGION2`, `ACC_COST`
    /// and `LENGTH` attributes.
    pub fn to_features(&self, crs: &CRS) -> FeatureCollection {
        let mut fc = FeatureCollection::new("corridors", crs.clone());
        for corridor in &self.corridors {
            fc.push(
                Feature::new(Geometry::LineString(corridor.path.clone()))
                    .with_property("REGION1", AttributeValue::Int(corridor.region_a))
                    .with_property("REGION2", AttributeValue::Int(corridor.region_b))
                    .with_property("ACC_COST", AttributeValue::Float(corridor.accumulated_cost))
                    .with_property("LENGTH", AttributeValue::Float(corridor.geometric_length())),
            );
        }
        fc
    }
}

/// Corridor extraction as an [`Algorithm`].
#[derive(Debug, Clone)]
pub struct ExtractCorridors {
    pub regions: RegionSet,
}

impl Algorithm for ExtractCorridors {
    type Input = Raster<f64>;
    type Output = CorridorSet;
    type Params = CorridorParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ExtractCorridors"
    }

    fn description(&self) -> &'static str {
        "Least-cost corridors between habitat regions"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        extract_corridors(&self.regions, &input, &params, &CancelToken::new())
    }
}

/// Extract least-cost corridors between every pair of `regions` over
/// `cost`, pruned according to `params.pruning`.
///
/// Pairs that cannot be joined are logged and listed in
/// [`CorridorSet::disconnected`].
///
/// # Errors
/// `InvalidParameter` with fewer than two regions, and `Cancelled`.
pub fn extract_corridors(
    regions: &RegionSet,
    cost: &Raster<f64>,
    params: &CorridorParams,
    cancel: &CancelToken,
) -> Result<CorridorSet> {
    let n = regions.len();
    if n < 2 {
        return Err(Error::invalid_parameter(
            "regions",
            n,
            "corridors need at least two regions",
        ));
    }
    let list = regions.regions();

    // The graph is symmetric, so the last region's surface is never read.
    let surfaces: Vec<Option<CostSurface>> = list[..n - 1]
        .par_iter()
        .map(|region| {
            if region.cells.is_empty() {
                return Ok(None);
            }
            accumulate(cost, &region.cells, params.connectivity, cancel).map(Some)
        })
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!(surfaces = surfaces.len(), "per-region cost surfaces ready");

    let mut candidates = Vec::new();
    let mut disconnected = Vec::new();
    for (i, surface) in surfaces.iter().enumerate() {
        for (j, target) in list.iter().enumerate().skip(i + 1) {
            let best = surface.as_ref().and_then(|s| {
                target
                    .cells
                    .iter()
                    .filter_map(|&(r, c)| s.cost_at(r, c).map(|v| (v, (r, c))))
                    .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            });
            match best {
                Some((acc, end)) => candidates.push((acc, i, j, end)),
                None => {
                    let pair = DisconnectedRegions {
                        region_a: list[i].id,
                        region_b: target.id,
                    };
                    tracing::warn!(region_a = pair.region_a, region_b = pair.region_b, "{pair}");
                    disconnected.push(pair);
                }
            }
        }
    }

    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
    let kept: Vec<(f64, usize, usize, (usize, usize))> = match params.pruning {
        PruningPolicy::AllPairs => candidates,
        PruningPolicy::MinimumSpanningTree => {
            let mut uf = UnionFind::<usize>::new(n);
            candidates
                .into_iter()
                .filter(|&(_, i, j, _)| uf.union(i, j))
                .collect()
        }
    };

    let mut corridors: Vec<Corridor> = kept
        .into_iter()
        .filter_map(|(acc, i, j, (r, c))| {
            let surface = surfaces[i].as_ref()?;
            let cells = surface.trace(r, c);
            let path = cells
                .iter()
                .map(|&(row, col)| {
                    let (x, y) = cost.pixel_to_geo(col, row);
                    Coord { x, y }
                })
                .collect::<Vec<_>>()
                .into();
            Some(Corridor {
                region_a: list[i].id,
                region_b: list[j].id,
                accumulated_cost: acc,
                cells,
                path,
            })
        })
        .collect();
    corridors.sort_by_key(|c| (c.region_a, c.region_b));

    tracing::info!(
        corridors = corridors.len(),
        disconnected = disconnected.len(),
        policy = ?params.pruning,
        "corridors extracted"
    );

    Ok(CorridorSet {
        corridors,
        disconnected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use wildpath_core::GeoTransform;

    fn cost(rows: usize, cols: usize, cell: f64) -> Raster<f64> {
        let mut r = Raster::filled(rows, cols, 1.0);
        r.set_transform(GeoTransform::north_up(0.0, rows as f64 * cell, cell));
        r.set_nodata(Some(f64::NAN));
        r
    }

    fn regions(claims: Vec<(i64, Vec<(usize, usize)>)>, shape: (usize, usize)) -> RegionSet {
        RegionSet::from_cells(shape, claims).unwrap()
    }

    #[test]
    fn test_three_regions_minimum_spanning_tree() {
        // Regions along the top row; 1-3 is never cheaper than 1-2 + 2-3.
        let set = regions(
            vec![(1, vec![(0, 0)]), (2, vec![(0, 4)]), (3, vec![(0, 9)])],
            (5, 10),
        );
        let out =
            extract_corridors(&set, &cost(5, 10, 1.0), &CorridorParams::default(), &CancelToken::new())
                .unwrap();
        let pairs: Vec<_> = out.corridors.iter().map(|c| (c.region_a, c.region_b)).collect();
        assert_eq!(pairs, vec![(1, 2), (2, 3)]);
        assert_relative_eq!(out.total_length(), 9.0, epsilon = 1e-9);
        assert!(out.disconnected.is_empty());
    }

    #[test]
    fn test_all_pairs_keeps_every_feasible_pair() {
        let set = regions(
            vec![(1, vec![(0, 0)]), (2, vec![(0, 4)]), (3, vec![(0, 9)])],
            (5, 10),
        );
        let params = CorridorParams {
            pruning: PruningPolicy::AllPairs,
            ..Default::default()
        };
        let out = extract_corridors(&set, &cost(5, 10, 1.0), &params, &CancelToken::new()).unwrap();
        assert_eq!(out.corridors.len(), 3);
        assert_relative_eq!(out.corridors[1].accumulated_cost, 9.0, epsilon = 1e-9);
    }

    #[test]
    fn test_path_runs_from_a_to_b() {
        let set = regions(vec![(1, vec![(0, 0)]), (2, vec![(2, 2)])], (3, 3));
        let out =
            extract_corridors(&set, &cost(3, 3, 10.0), &CorridorParams::default(), &CancelToken::new())
                .unwrap();
        let corridor = &out.corridors[0];
        assert_eq!(corridor.cells, vec![(0, 0), (1, 1), (2, 2)]);
        assert_eq!(corridor.path.0[0], Coord { x: 5.0, y: 25.0 });
        assert_relative_eq!(corridor.geometric_length(), 20.0 * std::f64::consts::SQRT_2, epsilon = 1e-9);
    }

    #[test]
    fn test_wall_disconnects_pair() {
        let mut c = cost(5, 5, 1.0);
        for row in 0..5 {
            c.set(row, 2, f64::NAN).unwrap();
        }
        let set = regions(vec![(1, vec![(2, 0)]), (2, vec![(2, 4)])], (5, 5));
        let out = extract_corridors(&set, &c, &CorridorParams::default(), &CancelToken::new()).unwrap();
        assert!(out.corridors.is_empty());
        assert_eq!(
            out.disconnected,
            vec![DisconnectedRegions {
                region_a: 1,
                region_b: 2
            }]
        );
    }

    #[test]
    fn test_single_region_rejected() {
        let set = regions(vec![(1, vec![(0, 0)])], (3, 3));
        let err = extract_corridors(&set, &cost(3, 3, 1.0), &CorridorParams::default(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn test_features_carry_attributes() {
        let set = regions(vec![(1, vec![(0, 0)]), (2, vec![(0, 2)])], (1, 3));
        let out =
            extract_corridors(&set, &cost(1, 3, 1.0), &CorridorParams::default(), &CancelToken::new())
                .unwrap();
        let fc = out.to_features(&CRS::from_epsg(26911));
        assert_eq!(fc.len(), 1);
        let f = &fc.features[0];
        assert_eq!(f.get_property("REGION1"), Some(&AttributeValue::Int(1)));
        assert_eq!(f.get_property("REGION2"), Some(&AttributeValue::Int(2)));
        assert_eq!(f.get_property("ACC_COST"), Some(&AttributeValue::Float(2.0)));
    }
}
