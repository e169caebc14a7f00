//! One complete run: grid, criteria, fusion, corridors, statistics.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use geo_types::{Geometry, MultiPolygon};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use wildpath_algorithms::corridor::{extract_corridors, CorridorSet, RegionSet};
use wildpath_algorithms::overlay::{weighted_sum, WeightedCriterion};
use wildpath_algorithms::rasterize::{polygon_to_raster, resample_bilinear, resample_to_grid};
use wildpath_algorithms::scoring::{distance_and_rescale, reclassify, rescale, ruggedness, RuggednessParams};
use wildpath_algorithms::statistics::{class_area_summary, study_area_statistics};
use wildpath_core::io::{read_geojson, read_geotiff, write_geojson, write_geotiff, ScratchSpace};
use wildpath_core::vector::FeatureCollection;
use wildpath_core::{CancelToken, Error, Grid, Raster, Result};

use crate::config::{
    file_stem, is_raster_path, CriterionConfig, CriterionPolicy, CriterionSource, GridConfig, PipelineConfig,
    StatisticsConfig,
};
use crate::error::PipelineError;
use crate::report::{RunOutputs, RunReport, SkippedCriterion, StatisticsReport};

/// Where a score raster sits between scoring and fusion.
enum ScoreSlot {
    Memory(Raster<f64>),
    Spilled(PathBuf),
}

struct ScoredCriterion {
    name: String,
    weight: f64,
    slot: ScoreSlot,
}

/// A configured run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    cancel: CancelToken,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_cancel(config, CancelToken::new())
    }

    /// Run observing an externally held cancellation token.
    pub fn with_cancel(config: PipelineConfig, cancel: CancelToken) -> Self {
        Self { config, cancel }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Token that stops the run at the next batch boundary
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Execute every stage and return the report.
    ///
    /// Intermediates are released before returning, whether the run
    /// succeeded or not.
    pub fn run(&self) -> std::result::Result<RunReport, PipelineError> {
        let started = Instant::now();
        let config = &self.config;
        config.validate()?;

        let grid = build_grid(&config.grid)?;
        info!(
            rows = grid.rows(),
            cols = grid.cols(),
            cells = grid.mask_count(),
            crs = %grid.crs(),
            "grid ready"
        );

        fs::create_dir_all(&config.output_dir).map_err(|e| PipelineError::output(Error::Io(e)))?;
        let mut scratch = if config.spill_scores {
            Some(ScratchSpace::new(config.scratch_dir.as_deref()).map_err(PipelineError::output)?)
        } else {
            None
        };
        let mut outputs = RunOutputs::default();
        let mut cleanup_failures = Vec::new();

        // Scoring
        let (scored, skipped) = self.score_all(&grid, scratch.as_mut(), &mut outputs)?;
        self.checkpoint()?;

        // Fusion
        let mut criteria = Vec::with_capacity(scored.len());
        let mut spilled = Vec::new();
        for score in scored {
            let raster = match score.slot {
                ScoreSlot::Memory(raster) => raster,
                ScoreSlot::Spilled(path) => {
                    let raster = load_spilled(scratch.as_ref(), &path).map_err(PipelineError::fusion)?;
                    spilled.push(path);
                    raster
                }
            };
            criteria.push(WeightedCriterion::new(score.name, raster).with_weight(score.weight));
        }
        let fusion_started = Instant::now();
        let cost = weighted_sum(&grid, &criteria).map_err(PipelineError::fusion)?;
        drop(criteria);
        debug!(
            elapsed_ms = fusion_started.elapsed().as_millis() as u64,
            "weighted sum"
        );
        if let Some(space) = scratch.as_mut() {
            for path in &spilled {
                if let Err(e) = space.release(path) {
                    warn!(error = %e, "releasing score raster failed");
                    cleanup_failures.push(e.to_string());
                }
            }
        }

        outputs.cost = config.output_dir.join("cost.tif");
        write_geotiff(&cost, &outputs.cost).map_err(PipelineError::output)?;
        info!(path = %outputs.cost.display(), "cost raster written");
        self.checkpoint()?;

        // Corridors
        let corridors = self.corridors(&grid, &cost)?;
        outputs.corridors = config.output_dir.join("corridors.geojson");
        write_geojson(&corridors.to_features(grid.crs()), &outputs.corridors)
            .map_err(PipelineError::output)?;
        info!(
            corridors = corridors.corridors.len(),
            disconnected = corridors.disconnected.len(),
            path = %outputs.corridors.display(),
            "corridors written"
        );

        // Statistics never fail the run
        let statistics = config
            .statistics
            .as_ref()
            .map(|stats| collect_statistics(stats, &grid));

        if let Some(mut space) = scratch.take() {
            for failure in space.release_all() {
                warn!(error = %failure, "scratch cleanup failed");
                cleanup_failures.push(failure.to_string());
            }
        }

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            total_length = corridors.total_length(),
            "run complete"
        );
        Ok(RunReport {
            unit: grid.linear_unit(),
            corridors,
            skipped,
            cleanup_failures,
            statistics,
            outputs,
        })
    }

    fn checkpoint(&self) -> std::result::Result<(), PipelineError> {
        self.cancel.check().map_err(|_| PipelineError::Cancelled)
    }

    /// Score every criterion in parallel, then apply the error policy in
    /// configuration order.
    ///
    /// Every result is checked before anything is written, so an aborting
    /// criterion leaves no score files behind.
    fn score_all(
        &self,
        grid: &Grid,
        mut scratch: Option<&mut ScratchSpace>,
        outputs: &mut RunOutputs,
    ) -> std::result::Result<(Vec<ScoredCriterion>, Vec<SkippedCriterion>), PipelineError> {
        let config = &self.config;
        let results: Vec<Result<Raster<f64>>> = config
            .criteria
            .par_iter()
            .map(|criterion| {
                let started = Instant::now();
                let result = score_criterion(criterion, grid, &self.cancel);
                debug!(
                    criterion = %criterion.name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    ok = result.is_ok(),
                    "criterion scored"
                );
                result
            })
            .collect();

        let mut rasters = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();
        for (index, (criterion, result)) in config.criteria.iter().zip(results).enumerate() {
            match result {
                Ok(raster) => rasters.push((index, criterion, raster)),
                Err(e)
                    if matches!(e, Error::Cancelled)
                        || e.is_configuration()
                        || config.on_criterion_error == CriterionPolicy::Abort =>
                {
                    return Err(PipelineError::criterion(&criterion.name, e));
                }
                Err(e) => {
                    warn!(criterion = %criterion.name, error = %e, "criterion skipped");
                    skipped.push(SkippedCriterion {
                        name: criterion.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        if rasters.is_empty() {
            return Err(PipelineError::fusion(Error::Algorithm(
                "every criterion failed and was skipped".to_string(),
            )));
        }

        let mut scored = Vec::with_capacity(rasters.len());
        for (index, criterion, raster) in rasters {
            let stem = file_stem(&criterion.name);
            if config.retain_scores {
                let path = config.output_dir.join(format!("score_{stem}.tif"));
                write_geotiff(&raster, &path).map_err(PipelineError::output)?;
                outputs.scores.push(path);
            }

            let slot = match scratch.as_deref_mut() {
                Some(space) => ScoreSlot::Spilled(
                    space
                        .store_raster(&format!("score_{index}_{stem}"), &raster)
                        .map_err(PipelineError::output)?,
                ),
                None => ScoreSlot::Memory(raster),
            };
            scored.push(ScoredCriterion {
                name: criterion.name.clone(),
                weight: criterion.weight,
                slot,
            });
        }

        info!(
            scored = scored.len(),
            skipped = skipped.len(),
            "criteria scored"
        );
        Ok((scored, skipped))
    }

    fn corridors(&self, grid: &Grid, cost: &Raster<f64>) -> std::result::Result<CorridorSet, PipelineError> {
        let regions_config = &self.config.regions;
        let habitat = read_geojson(&regions_config.input, regions_config.crs.as_ref())
            .map_err(PipelineError::corridor)?;
        let regions = RegionSet::rasterize(&habitat, regions_config.id_field.as_deref(), grid)
            .map_err(PipelineError::corridor)?;
        info!(regions = regions.len(), "regions rasterized");
        extract_corridors(&regions, cost, &self.config.corridor, &self.cancel).map_err(PipelineError::corridor)
    }
}

/// Build the run grid from the study-area polygons.
pub fn build_grid(config: &GridConfig) -> std::result::Result<Grid, PipelineError> {
    config.crs.require_known("grid")?;
    let boundary = read_geojson(&config.boundary, config.boundary_crs.as_ref())?;
    let boundary = boundary.reprojected(&config.crs)?;
    let polygons = boundary_polygons(&boundary)?;
    Ok(Grid::with_boundary(
        config.crs.clone(),
        config.cell_size,
        polygons,
        config.extent,
    )?)
}

fn boundary_polygons(boundary: &FeatureCollection) -> Result<MultiPolygon<f64>> {
    let mut polygons = Vec::new();
    for (index, feature) in boundary.iter().enumerate() {
        match &feature.geometry {
            Some(Geometry::Polygon(p)) => polygons.push(p.clone()),
            Some(Geometry::MultiPolygon(mp)) => polygons.extend(mp.0.iter().cloned()),
            None => {}
            Some(_) => {
                return Err(Error::InvalidAttribute {
                    field: "geometry".to_string(),
                    feature: index,
                    reason: format!("{} holds a non-polygon geometry", boundary.name),
                });
            }
        }
    }
    Ok(MultiPolygon(polygons))
}

/// Turn one criterion's input into a score raster on `grid`.
pub fn score_criterion(criterion: &CriterionConfig, grid: &Grid, cancel: &CancelToken) -> Result<Raster<f64>> {
    cancel.check()?;
    let name = criterion.name.as_str();
    let crs = criterion.crs.as_ref();
    match &criterion.source {
        CriterionSource::Reclassify {
            input,
            class_field,
            map,
            assignment,
        } => {
            let classes = if is_raster_path(input) {
                let source: Raster<i32> = read_geotiff(input)?;
                resample_to_grid(&source, grid, name)?
            } else {
                let field = class_field.as_deref().ok_or_else(|| {
                    Error::invalid_parameter("class_field", name, "polygon input needs a class field")
                })?;
                let features = read_features(input, crs, name)?;
                polygon_to_raster(&features, field, grid, *assignment)?
            };
            reclassify(&classes, map)
        }
        CriterionSource::Distance { inputs, rescale } => {
            let mut merged = FeatureCollection::new(name, grid.crs().clone());
            for input in inputs {
                merged.merge(&read_features(input, crs, name)?)?;
            }
            distance_and_rescale(&merged, grid, rescale, cancel)
        }
        CriterionSource::Ruggedness {
            elevation,
            window_size,
            rescale,
        } => {
            let dem = resample_bilinear(&read_geotiff::<f64, _>(elevation)?, grid, name)?;
            let params = RuggednessParams {
                window_size: *window_size,
                rescale: *rescale,
            };
            ruggedness(&dem, grid, &params)
        }
        CriterionSource::Raster {
            input,
            rescale: function,
        } => {
            let values = resample_bilinear(&read_geotiff::<f64, _>(input)?, grid, name)?;
            match function {
                Some(function) => rescale(&values, function),
                None => Ok(values),
            }
        }
    }
}

fn read_features(path: &Path, crs: Option<&wildpath_core::CRS>, name: &str) -> Result<FeatureCollection> {
    let mut features = read_geojson(path, crs)?;
    if features.name.is_empty() {
        features.name = name.to_string();
    }
    Ok(features)
}

fn load_spilled(scratch: Option<&ScratchSpace>, path: &Path) -> Result<Raster<f64>> {
    match scratch {
        Some(space) => space.load_raster(path),
        None => read_geotiff(path),
    }
}

fn collect_statistics(config: &StatisticsConfig, grid: &Grid) -> StatisticsReport {
    let mut report = StatisticsReport::default();

    if let Some(path) = &config.elevation {
        let mean = read_geotiff::<f64, _>(path)
            .and_then(|dem| resample_bilinear(&dem, grid, "elevation"))
            .and_then(|dem| study_area_statistics(&dem, grid));
        match mean {
            Ok(Some(stats)) => report.mean_elevation = Some(stats.mean),
            Ok(None) => report
                .failures
                .push("elevation has no value inside the study area".to_string()),
            Err(e) => {
                warn!(error = %e, "mean elevation unavailable");
                report.failures.push(format!("elevation: {e}"));
            }
        }
    }

    if let Some(areas) = &config.class_areas {
        let summary = read_geojson(&areas.input, areas.crs.as_ref())
            .and_then(|fc| fc.reprojected(grid.crs()))
            .and_then(|fc| class_area_summary(&fc, &areas.class_field));
        match summary {
            Ok(summary) => report.class_areas = summary,
            Err(e) => {
                warn!(error = %e, "class areas unavailable");
                report.failures.push(format!("class areas: {e}"));
            }
        }
    }

    report
}
