//! The user-visible summary of a run

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use format_num::NumberFormat;
use wildpath_algorithms::corridor::CorridorSet;

/// A criterion left out of the fusion under the `skip` policy.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedCriterion {
    pub name: String,
    pub reason: String,
}

/// Files a run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutputs {
    pub cost: PathBuf,
    pub corridors: PathBuf,
    pub scores: Vec<PathBuf>,
}

/// Descriptive statistics of the study area.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticsReport {
    /// Mean of the elevation raster over the study-area mask
    pub mean_elevation: Option<f64>,
    /// Total polygon area per class, in squared grid units
    pub class_areas: BTreeMap<i64, f64>,
    /// Statistics that could not be computed
    pub failures: Vec<String>,
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Linear unit of the grid CRS
    pub unit: &'static str,
    pub corridors: CorridorSet,
    pub skipped: Vec<SkippedCriterion>,
    pub cleanup_failures: Vec<String>,
    pub statistics: Option<StatisticsReport>,
    pub outputs: RunOutputs,
}

impl RunReport {
    pub fn total_length(&self) -> f64 {
        self.corridors.total_length()
    }
}

/// Two decimals with thousands separators and trailing zeros dropped,
/// keeping at least one decimal: `1234.5` → `1,234.5`, `14` → `14.0`.
pub fn format_number(value: f64) -> String {
    let formatted = NumberFormat::new().format(",.2f", value);
    match formatted.strip_suffix('0') {
        Some(trimmed) if !trimmed.ends_with('.') => trimmed.to_string(),
        _ => formatted,
    }
}

fn area_unit(unit: &str) -> String {
    match unit {
        "meters" => "m2".to_string(),
        other => format!("square {other}"),
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "Length of the optimal routes: ")?;
        for corridor in &self.corridors.corridors {
            writeln!(
                f,
                "\tFrom Region {} to Region {}: {} {}",
                corridor.region_a,
                corridor.region_b,
                format_number(corridor.length()),
                self.unit
            )?;
        }
        writeln!(
            f,
            "Total length of the optimal routes: {} {}",
            format_number(self.total_length()),
            self.unit
        )?;

        for pair in &self.corridors.disconnected {
            writeln!(f, "Warning: {pair}")?;
        }
        for skipped in &self.skipped {
            writeln!(f, "Skipped criterion '{}': {}", skipped.name, skipped.reason)?;
        }
        for failure in &self.cleanup_failures {
            writeln!(f, "Cleanup failed: {failure}")?;
        }

        if let Some(stats) = &self.statistics {
            if let Some(mean) = stats.mean_elevation {
                writeln!(
                    f,
                    "The average elevation of the study area is {} {}.",
                    format_number(mean),
                    self.unit
                )?;
            }
            if !stats.class_areas.is_empty() {
                writeln!(f, "The area of each landcover type:")?;
                let unit = area_unit(self.unit);
                for (class, area) in &stats.class_areas {
                    writeln!(
                        f,
                        "\tLandcover type {class} | Total Area: {} {unit}",
                        format_number(*area)
                    )?;
                }
            }
            for failure in &stats.failures {
                writeln!(f, "Statistics unavailable: {failure}")?;
            }
        }
        Ok(())
    }
}
