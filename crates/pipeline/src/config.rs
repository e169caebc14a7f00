//! Run configuration
//!
//! A run is described by one JSON document. Relative paths inside it are
//! resolved against the directory holding the document.
//!
//! ```json
//! {
//!   "grid": { "crs": "EPSG:26911", "cell_size": 25, "boundary": "study_area.geojson" },
//!   "criteria": [
//!     { "name": "landcover", "kind": "reclassify", "input": "landcover.geojson",
//!       "class_field": "LC_class", "map": [[20, 10], [31, 8], [110, 2]] },
//!     { "name": "hydro", "kind": "distance", "inputs": ["hydro.geojson"] },
//!     { "name": "ruggedness", "kind": "ruggedness", "elevation": "dem.tif" }
//!   ],
//!   "regions": { "input": "bear_habitat.geojson" },
//!   "output_dir": "out"
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wildpath_algorithms::corridor::CorridorParams;
use wildpath_algorithms::rasterize::PolygonAssignment;
use wildpath_algorithms::scoring::{ReclassificationMap, RescaleFunction};
use wildpath_core::{Error, Extent, CRS};

use crate::error::PipelineError;

/// Complete description of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub grid: GridConfig,
    pub criteria: Vec<CriterionConfig>,
    pub regions: RegionsConfig,
    #[serde(default)]
    pub corridor: CorridorParams,
    /// What a failing criterion does to the run
    #[serde(default)]
    pub on_criterion_error: CriterionPolicy,
    pub output_dir: PathBuf,
    /// Write every score raster next to the cost raster
    #[serde(default)]
    pub retain_scores: bool,
    /// Hold score rasters on disk between scoring and fusion
    #[serde(default)]
    pub spill_scores: bool,
    /// Parent of the scratch directory; the system temp dir when unset
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
    #[serde(default)]
    pub statistics: Option<StatisticsConfig>,
}

/// The fixed framing of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub crs: CRS,
    pub cell_size: f64,
    /// Study-area polygons (GeoJSON)
    pub boundary: PathBuf,
    /// CRS of the boundary file when it does not declare one
    #[serde(default)]
    pub boundary_crs: Option<CRS>,
    /// Overrides the boundary's bounding box
    #[serde(default)]
    pub extent: Option<Extent>,
}

/// One weighted criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionConfig {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// CRS of vector inputs that do not declare one
    #[serde(default)]
    pub crs: Option<CRS>,
    #[serde(flatten)]
    pub source: CriterionSource,
}

fn default_weight() -> f64 {
    1.0
}

fn default_window_size() -> usize {
    3
}

/// How a criterion turns its input into scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CriterionSource {
    /// Categorical polygons (GeoJSON) or raster (GeoTIFF) through a lookup
    Reclassify {
        input: PathBuf,
        /// Class attribute of polygon input
        #[serde(default)]
        class_field: Option<String>,
        map: ReclassificationMap,
        #[serde(default)]
        assignment: PolygonAssignment,
    },
    /// Distance to the merged features of every input, rescaled
    Distance {
        inputs: Vec<PathBuf>,
        #[serde(default)]
        rescale: RescaleFunction,
    },
    /// Focal elevation range of a DEM, rescaled
    Ruggedness {
        elevation: PathBuf,
        #[serde(default = "default_window_size")]
        window_size: usize,
        #[serde(default)]
        rescale: RescaleFunction,
    },
    /// A raster used as is, or rescaled when a function is given
    Raster {
        input: PathBuf,
        #[serde(default)]
        rescale: Option<RescaleFunction>,
    },
}

/// Whether one failing criterion ends the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionPolicy {
    #[default]
    Abort,
    /// Leave the criterion out of the fusion and record it in the report
    Skip,
}

/// Habitat regions to connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionsConfig {
    pub input: PathBuf,
    /// Integer id attribute; 1-based feature order when unset
    #[serde(default)]
    pub id_field: Option<String>,
    #[serde(default)]
    pub crs: Option<CRS>,
}

/// Optional descriptive statistics for the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// DEM whose mean over the study area is reported
    #[serde(default)]
    pub elevation: Option<PathBuf>,
    /// Polygons whose total area per class is reported
    #[serde(default)]
    pub class_areas: Option<ClassAreaConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassAreaConfig {
    pub input: PathBuf,
    pub class_field: String,
    #[serde(default)]
    pub crs: Option<CRS>,
}

impl PipelineConfig {
    /// Read, resolve and validate a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| PipelineError::Configuration(Error::Io(e)))?;
        let mut config = Self::from_json(&text).map_err(|e| match e {
            PipelineError::Configuration(Error::Other(msg)) => {
                PipelineError::Configuration(Error::Other(format!("{}: {msg}", path.display())))
            }
            other => other,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        tracing::debug!(config = %path.display(), criteria = config.criteria.len(), "configuration loaded");
        Ok(config)
    }

    /// Parse and validate a configuration; paths stay as written.
    pub fn from_json(text: &str) -> Result<Self, PipelineError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| PipelineError::Configuration(Error::Other(e.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    /// Make every relative path absolute with respect to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.grid.boundary);
        resolve(&mut self.regions.input);
        resolve(&mut self.output_dir);
        if let Some(dir) = self.scratch_dir.as_mut() {
            resolve(dir);
        }
        for criterion in &mut self.criteria {
            match &mut criterion.source {
                CriterionSource::Reclassify { input, .. } | CriterionSource::Raster { input, .. } => {
                    resolve(input)
                }
                CriterionSource::Distance { inputs, .. } => inputs.iter_mut().for_each(resolve),
                CriterionSource::Ruggedness { elevation, .. } => resolve(elevation),
            }
        }
        if let Some(stats) = self.statistics.as_mut() {
            if let Some(dem) = stats.elevation.as_mut() {
                resolve(dem);
            }
            if let Some(areas) = stats.class_areas.as_mut() {
                resolve(&mut areas.input);
            }
        }
    }

    /// Checks that need no file access.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |name: &'static str, value: String, reason: &str| {
            PipelineError::Configuration(Error::invalid_parameter(name, value, reason))
        };

        if self.criteria.is_empty() {
            return Err(invalid("criteria", "[]".into(), "at least one criterion is required"));
        }
        let mut names = HashSet::new();
        let mut stems = HashSet::new();
        for criterion in &self.criteria {
            if !names.insert(criterion.name.as_str()) {
                return Err(invalid("criterion name", criterion.name.clone(), "names must be unique"));
            }
            if !stems.insert(file_stem(&criterion.name)) {
                return Err(invalid(
                    "criterion name",
                    criterion.name.clone(),
                    "names must stay unique once mapped to file names",
                ));
            }
            if !criterion.weight.is_finite() || criterion.weight < 0.0 {
                return Err(invalid(
                    "weight",
                    format!("{} = {}", criterion.name, criterion.weight),
                    "weights must be finite and non-negative",
                ));
            }
            match &criterion.source {
                CriterionSource::Distance { inputs, .. } if inputs.is_empty() => {
                    return Err(invalid(
                        "inputs",
                        criterion.name.clone(),
                        "distance criteria need at least one input",
                    ));
                }
                CriterionSource::Reclassify {
                    input,
                    class_field: None,
                    ..
                } if !is_raster_path(input) => {
                    return Err(invalid(
                        "class_field",
                        criterion.name.clone(),
                        "polygon input needs a class field",
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// File-name form of a criterion name: anything outside `[A-Za-z0-9_-]`
/// becomes `_`.
pub(crate) fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// GeoTIFF by extension; everything else is read as GeoJSON.
pub(crate) fn is_raster_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wildpath_algorithms::corridor::PruningPolicy;

    const EXAMPLE: &str = r#"{
        "grid": { "crs": "EPSG:26911", "cell_size": 25, "boundary": "study_area.geojson" },
        "criteria": [
            { "name": "landcover", "kind": "reclassify", "input": "landcover.geojson",
              "class_field": "LC_class", "map": [[20, 10], [31, 8], [110, 2]] },
            { "name": "roads", "kind": "distance", "inputs": ["roads.geojson", "transport.geojson"],
              "weight": 0.5,
              "rescale": { "transform": { "type": "tf_large" }, "from_scale": 10, "to_scale": 1 } },
            { "name": "ruggedness", "kind": "ruggedness", "elevation": "/data/dem.tif" }
        ],
        "regions": { "input": "bear_habitat.geojson" },
        "corridor": { "pruning": "all_pairs" },
        "on_criterion_error": "skip",
        "output_dir": "out"
    }"#;

    #[test]
    fn test_parse_example() {
        let config = PipelineConfig::from_json(EXAMPLE).unwrap();
        assert_eq!(config.grid.crs, CRS::from_epsg(26911));
        assert_eq!(config.criteria.len(), 3);
        assert_eq!(config.criteria[0].weight, 1.0);
        assert_eq!(config.criteria[1].weight, 0.5);
        assert!(matches!(
            &config.criteria[1].source,
            CriterionSource::Distance { inputs, rescale } if inputs.len() == 2 && rescale.from_scale == 10.0
        ));
        assert!(matches!(
            config.criteria[2].source,
            CriterionSource::Ruggedness { window_size: 3, .. }
        ));
        assert_eq!(config.corridor.pruning, PruningPolicy::AllPairs);
        assert_eq!(config.on_criterion_error, CriterionPolicy::Skip);
        assert!(!config.retain_scores);
    }

    #[test]
    fn test_relative_paths_resolve_against_base() {
        let mut config = PipelineConfig::from_json(EXAMPLE).unwrap();
        config.resolve_paths(Path::new("/runs/k-country"));
        assert_eq!(config.output_dir, PathBuf::from("/runs/k-country/out"));
        assert_eq!(config.regions.input, PathBuf::from("/runs/k-country/bear_habitat.geojson"));
        match &config.criteria[2].source {
            CriterionSource::Ruggedness { elevation, .. } => {
                assert_eq!(elevation, &PathBuf::from("/data/dem.tif"));
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let text = EXAMPLE.replace("\"name\": \"roads\"", "\"name\": \"landcover\"");
        let err = PipelineConfig::from_json(&text).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_names_colliding_as_files_rejected() {
        let text = EXAMPLE
            .replace("\"name\": \"landcover\"", "\"name\": \"hydro 1\"")
            .replace("\"name\": \"roads\"", "\"name\": \"hydro_1\"");
        let err = PipelineConfig::from_json(&text).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("hydro_1"));

        let text = EXAMPLE.replace("\"name\": \"roads\"", "\"name\": \"hydro-1\"");
        assert!(PipelineConfig::from_json(&text).is_ok());
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("hydro 1"), "hydro_1");
        assert_eq!(file_stem("roads/rail"), "roads_rail");
        assert_eq!(file_stem("slope-30"), "slope-30");
    }

    #[test]
    fn test_duplicate_map_source_rejected() {
        let text = EXAMPLE.replace("[[20, 10], [31, 8]", "[[20, 10], [20, 8]");
        assert!(PipelineConfig::from_json(&text).is_err());
    }

    #[test]
    fn test_polygon_reclassify_needs_class_field() {
        let text = EXAMPLE.replace("\"class_field\": \"LC_class\",", "");
        assert!(PipelineConfig::from_json(&text).is_err());
    }
}
