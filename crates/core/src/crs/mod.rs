//! Coordinate Reference System handling
//!
//! wildpath does not carry a spatial-reference database. A [`CRS`] is an
//! identifier (EPSG code, WKT, PROJ string or a plain name) and only a
//! handful of systems can be reprojected between, see [`CoordinateTransform`].

mod utm;

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub use utm::{utm_to_wgs84, wgs84_to_utm};

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
    /// Free-form name when nothing better is known
    name: Option<String>,
}

impl CRS {
    /// A CRS nobody declared. Never equivalent to anything, itself included.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            ..Self::default()
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            ..Self::default()
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            proj: Some(proj.into()),
            ..Self::default()
        }
    }

    /// Create a CRS known only by name
    pub fn from_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// WGS84 / UTM zone (EPSG:326xx north, 327xx south)
    pub fn utm(zone: u32, north: bool) -> Self {
        Self::from_epsg(if north { 32600 } else { 32700 } + zone)
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// True when no identifier at all was given
    pub fn is_unknown(&self) -> bool {
        self.wkt.is_none() && self.epsg.is_none() && self.proj.is_none() && self.name.is_none()
    }

    /// Fail with [`Error::UnknownSpatialReference`] for an unknown CRS.
    pub fn require_known(&self, dataset: &str) -> Result<()> {
        if self.is_unknown() {
            return Err(Error::UnknownSpatialReference {
                dataset: dataset.to_string(),
            });
        }
        Ok(())
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.name, &other.name) {
            return a.eq_ignore_ascii_case(b);
        }

        false
    }

    /// Whether coordinates are angular (degrees)
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, Some(4326 | 4269 | 4267))
    }

    /// Name of the linear unit distances are reported in
    pub fn linear_unit(&self) -> &'static str {
        if self.is_geographic() {
            "degrees"
        } else if self.epsg.is_some()
            || self
                .name
                .as_deref()
                .is_some_and(|n| n.to_ascii_lowercase().contains("utm"))
        {
            "meters"
        } else {
            "units"
        }
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", &wkt[..wkt.len().min(50)]);
        }
        if let Some(name) = &self.name {
            return name.clone();
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl FromStr for CRS {
    type Err = Infallible;

    /// Parse the spellings found in GeoJSON `crs` members, GIS project files
    /// and configuration: `EPSG:26911`, `urn:ogc:def:crs:EPSG::26911`,
    /// `CRS84`, `WGS 84`, `NAD 1983 UTM Zone 11N`, `WGS 1984 UTM Zone 11N`,
    /// PROJ strings and WKT. Anything else is kept as a named CRS.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("unknown") {
            return Ok(CRS::unknown());
        }
        if trimmed.starts_with("+proj") {
            return Ok(CRS::from_proj(trimmed));
        }
        if ["PROJCS[", "GEOGCS[", "PROJCRS[", "GEOGCRS["]
            .iter()
            .any(|p| trimmed.starts_with(p))
        {
            return Ok(CRS::from_wkt(trimmed));
        }

        let lower = trimmed.to_ascii_lowercase().replace('_', " ");
        if lower.contains("epsg") {
            if let Some(code) = lower.rsplit(':').next().and_then(|c| c.trim().parse().ok()) {
                return Ok(CRS::from_epsg(code));
            }
        }
        if lower.ends_with("crs84") || matches!(lower.as_str(), "wgs 84" | "wgs84" | "gcs wgs 1984") {
            return Ok(CRS::wgs84());
        }
        if let Some(code) = parse_utm_name(&lower) {
            return Ok(CRS::from_epsg(code));
        }

        Ok(CRS::from_name(trimmed))
    }
}

impl From<String> for CRS {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(crs) => crs,
            Err(never) => match never {},
        }
    }
}

impl From<CRS> for String {
    fn from(crs: CRS) -> Self {
        if crs.is_unknown() {
            String::new()
        } else {
            crs.identifier()
        }
    }
}

/// `nad 1983 utm zone 11n` → 26911, `wgs 1984 utm zone 33s` → 32733
fn parse_utm_name(lower: &str) -> Option<u32> {
    let (datum, rest) = lower.split_once("utm zone")?;
    let rest = rest.trim();
    let (digits, hemi) = rest.split_at(rest.find(|c: char| !c.is_ascii_digit())?);
    let zone: u32 = digits.parse().ok()?;
    if !(1..=60).contains(&zone) {
        return None;
    }
    let north = match hemi.trim() {
        "n" | "north" => true,
        "s" | "south" => false,
        _ => return None,
    };
    let datum = datum.replace(['/', ' '], "");
    if datum.starts_with("nad1983") || datum.starts_with("nad83") {
        (north && zone <= 23).then_some(26900 + zone)
    } else if datum.starts_with("wgs1984") || datum.starts_with("wgs84") {
        Some(if north { 32600 } else { 32700 } + zone)
    } else {
        None
    }
}

/// Projections that [`CoordinateTransform`] can convert between.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Projection {
    Geographic,
    Utm { zone: u32, north: bool },
}

impl Projection {
    /// NAD83 is treated as coincident with WGS84.
    fn of(crs: &CRS) -> Option<Self> {
        match crs.epsg()? {
            4326 | 4269 => Some(Projection::Geographic),
            code @ 32601..=32660 => Some(Projection::Utm { zone: code - 32600, north: true }),
            code @ 32701..=32760 => Some(Projection::Utm { zone: code - 32700, north: false }),
            code @ 26901..=26923 => Some(Projection::Utm { zone: code - 26900, north: true }),
            _ => None,
        }
    }

    fn to_geographic(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (x, y),
            Projection::Utm { zone, north } => utm_to_wgs84(x, y, zone, north),
        }
    }

    fn from_geographic(self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (lon, lat),
            Projection::Utm { zone, north } => wgs84_to_utm(lon, lat, zone, north),
        }
    }
}

/// Point transformation between two CRSs.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateTransform {
    steps: Option<(Projection, Projection)>,
}

impl CoordinateTransform {
    /// Build the transform from `from` to `to`.
    ///
    /// Equivalent systems give the identity. Unknown systems and pairs
    /// outside geographic / UTM are configuration errors.
    pub fn new(from: &CRS, to: &CRS) -> Result<Self> {
        from.require_known(&from.identifier())?;
        to.require_known(&to.identifier())?;
        if from.is_equivalent(to) {
            return Ok(Self { steps: None });
        }
        match (Projection::of(from), Projection::of(to)) {
            (Some(a), Some(b)) if a == b => Ok(Self { steps: None }),
            (Some(a), Some(b)) => Ok(Self { steps: Some((a, b)) }),
            _ => Err(Error::UnsupportedReprojection {
                from: from.identifier(),
                to: to.identifier(),
            }),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.steps.is_none()
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        match self.steps {
            None => (x, y),
            Some((from, to)) => {
                let (lon, lat) = from.to_geographic(x, y);
                to.from_geographic(lon, lat)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
    }

    #[test]
    fn test_crs_equivalence() {
        assert!(CRS::from_epsg(4326).is_equivalent(&CRS::wgs84()));
        assert!(!CRS::unknown().is_equivalent(&CRS::unknown()));
        assert!(CRS::from_name("Lambert").is_equivalent(&CRS::from_name("lambert")));
    }

    #[test]
    fn test_parse_spellings() {
        let parse = |s: &str| s.parse::<CRS>().unwrap().epsg();
        assert_eq!(parse("EPSG:26911"), Some(26911));
        assert_eq!(parse("urn:ogc:def:crs:EPSG::32611"), Some(32611));
        assert_eq!(parse("urn:ogc:def:crs:OGC:1.3:CRS84"), Some(4326));
        assert_eq!(parse("NAD 1983 UTM Zone 11N"), Some(26911));
        assert_eq!(parse("NAD_1983_UTM_Zone_11N"), Some(26911));
        assert_eq!(parse("WGS 84 / UTM zone 33S"), Some(32733));
        assert!("".parse::<CRS>().unwrap().is_unknown());
        assert!("Unknown".parse::<CRS>().unwrap().is_unknown());
        assert_eq!("Local grid".parse::<CRS>().unwrap().name(), Some("Local grid"));
    }

    #[test]
    fn test_linear_unit() {
        assert_eq!(CRS::from_epsg(26911).linear_unit(), "meters");
        assert_eq!(CRS::wgs84().linear_unit(), "degrees");
        assert_eq!(CRS::from_name("local").linear_unit(), "units");
    }

    #[test]
    fn test_transform_identity_for_equivalent() {
        let t = CoordinateTransform::new(&CRS::from_epsg(26911), &CRS::from_epsg(26911)).unwrap();
        assert!(t.is_identity());
        assert_eq!(t.apply(1.0, 2.0), (1.0, 2.0));
    }

    #[test]
    fn test_transform_between_zones() {
        let t = CoordinateTransform::new(&CRS::utm(11, true), &CRS::wgs84()).unwrap();
        let (lon, lat) = t.apply(500_000.0, 5_650_000.0);
        assert_abs_diff_eq!(lon, -117.0, epsilon = 1e-6);
        assert!(lat > 50.0 && lat < 52.0);

        let back = CoordinateTransform::new(&CRS::wgs84(), &CRS::from_epsg(26911)).unwrap();
        let (e, n) = back.apply(lon, lat);
        assert_abs_diff_eq!(e, 500_000.0, epsilon = 1e-2);
        assert_abs_diff_eq!(n, 5_650_000.0, epsilon = 1e-2);
    }

    #[test]
    fn test_transform_rejects_unknown_and_unsupported() {
        let err = CoordinateTransform::new(&CRS::unknown(), &CRS::wgs84()).unwrap_err();
        assert!(matches!(err, Error::UnknownSpatialReference { .. }));

        let err = CoordinateTransform::new(&CRS::from_epsg(3857), &CRS::wgs84()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedReprojection { .. }));
    }

    #[test]
    fn test_serde_as_string() {
        let crs: CRS = serde_json::from_str("\"NAD 1983 UTM Zone 11N\"").unwrap();
        assert_eq!(crs.epsg(), Some(26911));
        assert_eq!(serde_json::to_string(&crs).unwrap(), "\"EPSG:26911\"");
    }
}
