//! Benchmarks for cost distance and corridor extraction

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wildpath_algorithms::corridor::{cost_distance, extract_corridors, CorridorParams, RegionSet};
use wildpath_core::raster::Connectivity;
use wildpath_core::{CancelToken, GeoTransform, Raster, CRS};

fn create_cost(size: usize) -> Raster<f64> {
    let mut cost = Raster::new(size, size);
    cost.set_transform(GeoTransform::north_up(0.0, size as f64 * 25.0, 25.0));
    cost.set_crs(Some(CRS::from_epsg(26911)));
    cost.set_nodata(Some(f64::NAN));

    // Scores between 3 and 30, with some structure
    for row in 0..size {
        for col in 0..size {
            let variation = ((row * 7 + col * 13) % 100) as f64 / 100.0;
            cost.set(row, col, 3.0 + 27.0 * variation).unwrap();
        }
    }
    cost
}

fn bench_cost_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("cost_distance");

    for size in [256, 512, 1024].iter() {
        let cost = create_cost(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| cost_distance(black_box(&cost), &[(0, 0)], Connectivity::Eight).unwrap())
        });
    }

    group.finish();
}

fn bench_corridors(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_corridors");

    for size in [128, 256, 512].iter() {
        let cost = create_cost(*size);
        let last = size - 1;
        let regions = RegionSet::from_cells(
            (*size, *size),
            vec![
                (1, vec![(0, 0)]),
                (2, vec![(0, last)]),
                (3, vec![(last, 0)]),
                (4, vec![(last, last)]),
            ],
        )
        .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                extract_corridors(
                    &regions,
                    black_box(&cost),
                    &CorridorParams::default(),
                    &CancelToken::new(),
                )
                .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cost_distance, bench_corridors);
criterion_main!(benches);
