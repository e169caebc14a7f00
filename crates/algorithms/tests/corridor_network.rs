//! Corridor extraction on small synthetic grids.

use approx::assert_relative_eq;
use geo_types::{point, polygon, Geometry, MultiPolygon};
use std::f64::consts::SQRT_2;
use wildpath_algorithms::corridor::{
    extract_corridors, CorridorParams, DisconnectedRegions, PruningPolicy, RegionSet,
};
use wildpath_algorithms::overlay::{weighted_sum, WeightedCriterion};
use wildpath_core::vector::{Feature, FeatureCollection};
use wildpath_core::{CancelToken, Grid, CRS};

const CELL: f64 = 25.0;

/// 10 × 10 cells of 25 m
fn grid() -> Grid {
    let boundary = MultiPolygon(vec![polygon![
        (x: 0.0, y: 0.0), (x: 250.0, y: 0.0), (x: 250.0, y: 250.0), (x: 0.0, y: 250.0),
    ]]);
    Grid::with_boundary(CRS::from_epsg(26911), CELL, boundary, None).unwrap()
}

/// Point habitats in the north-west and south-east corner cells
fn corner_habitats() -> FeatureCollection {
    let mut fc = FeatureCollection::new("habitat", CRS::from_epsg(26911));
    fc.push(Feature::new(Geometry::Point(point!(x: 12.5, y: 237.5))));
    fc.push(Feature::new(Geometry::Point(point!(x: 237.5, y: 12.5))));
    fc
}

#[test]
fn opposite_corners_on_uniform_cost() {
    let g = grid();
    let regions = RegionSet::rasterize(&corner_habitats(), None, &g).unwrap();
    let cost = g.raster_filled(1.0);

    let out = extract_corridors(&regions, &cost, &CorridorParams::default(), &CancelToken::new()).unwrap();
    assert_eq!(out.corridors.len(), 1);
    let corridor = &out.corridors[0];
    assert_eq!((corridor.region_a, corridor.region_b), (1, 2));
    assert_relative_eq!(corridor.accumulated_cost, 9.0 * SQRT_2 * CELL, epsilon = 1e-9);
    assert_eq!(corridor.cells.first(), Some(&(0, 0)));
    assert_eq!(corridor.cells.last(), Some(&(9, 9)));
    assert_eq!(corridor.cells.len(), 10);
    assert_relative_eq!(out.total_length(), corridor.length());
}

#[test]
fn scenario_cost_scales_corridor() {
    let g = grid();
    let regions = RegionSet::rasterize(&corner_habitats(), None, &g).unwrap();
    let cost = weighted_sum(
        &g,
        &[
            WeightedCriterion::new("landcover", g.raster_filled(2.0)),
            WeightedCriterion::new("hydro", g.raster_filled(5.0)),
            WeightedCriterion::new("trails", g.raster_filled(7.0)),
        ],
    )
    .unwrap();

    let out = extract_corridors(&regions, &cost, &CorridorParams::default(), &CancelToken::new()).unwrap();
    assert_relative_eq!(out.total_length(), 14.0 * 9.0 * SQRT_2 * CELL, epsilon = 1e-6);
}

#[test]
fn wall_of_nodata_disconnects_regions() {
    let g = grid();
    let regions = RegionSet::rasterize(&corner_habitats(), None, &g).unwrap();
    let mut cost = g.raster_filled(1.0);
    for row in 0..10 {
        cost.set(row, 5, f64::NAN).unwrap();
    }

    let out = extract_corridors(&regions, &cost, &CorridorParams::default(), &CancelToken::new()).unwrap();
    assert!(out.corridors.is_empty());
    assert_eq!(
        out.disconnected,
        vec![DisconnectedRegions {
            region_a: 1,
            region_b: 2
        }]
    );
    assert_eq!(out.total_length(), 0.0);
}

#[test]
fn spanning_tree_drops_redundant_pair() {
    let g = grid();
    let mut habitats = corner_habitats();
    // Third habitat in the north-east corner
    habitats.push(Feature::new(Geometry::Point(point!(x: 237.5, y: 237.5))));
    let regions = RegionSet::rasterize(&habitats, None, &g).unwrap();
    let cost = g.raster_filled(1.0);

    let mst = extract_corridors(&regions, &cost, &CorridorParams::default(), &CancelToken::new()).unwrap();
    let pairs: Vec<_> = mst.corridors.iter().map(|c| (c.region_a, c.region_b)).collect();
    assert_eq!(pairs, vec![(1, 3), (2, 3)]);
    assert_relative_eq!(mst.total_length(), 2.0 * 9.0 * CELL, epsilon = 1e-9);

    let all = extract_corridors(
        &regions,
        &cost,
        &CorridorParams {
            pruning: PruningPolicy::AllPairs,
            ..Default::default()
        },
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(all.corridors.len(), 3);
}

#[test]
fn cancelled_run_returns_cancelled() {
    let g = grid();
    let regions = RegionSet::rasterize(&corner_habitats(), None, &g).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = extract_corridors(&regions, &g.raster_filled(1.0), &CorridorParams::default(), &cancel)
        .unwrap_err();
    assert!(matches!(err, wildpath_core::Error::Cancelled));
}
