use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;

use geo::{Coord, LineString, MultiPolygon, Point, Polygon};
use geojson::{GeoJson, Value as GeoJsonValue};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::feature::{Attributes, Feature, FeatureGeometry, FeatureSet, WGS84};

/// OSM key selecting power infrastructure.
pub const POWER_CATEGORY: &str = "power";

/// Turns a raw regional extract into structured features.
pub trait Extract {
    /// Read every feature tagged with `category` from `path`.
    fn extract(&self, path: &Path, category: &str) -> Result<FeatureSet>;
}

/// Reads GeoJSON directly and converts other OSM containers with `osmium`.
#[derive(Debug, Clone)]
pub struct OsmiumExtractor {
    osmium: PathBuf,
}

impl Default for OsmiumExtractor {
    fn default() -> Self {
        Self::new("osmium")
    }
}

impl OsmiumExtractor {
    pub fn new(osmium: impl Into<PathBuf>) -> Self {
        Self {
            osmium: osmium.into(),
        }
    }

    fn run(&self, command: &mut Command) -> Result<()> {
        debug!("Running {:?}", command);
        let output = command.output().map_err(|e| {
            Error::Extraction(format!("cannot run {}: {}", self.osmium.display(), e))
        })?;
        if !output.status.success() {
            return Err(Error::Extraction(format!(
                "{} failed: {}",
                self.osmium.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    /// Filter `pbf` to `category` objects and export them as GeoJSON.
    fn convert(&self, pbf: &Path, category: &str) -> Result<PathBuf> {
        let stem = pbf
            .file_name()
            .and_then(|s| s.to_str())
            .map(|s| s.split('.').next().unwrap_or(s))
            .unwrap_or("extract");
        let dir = pbf.parent().unwrap_or_else(|| Path::new("."));
        let filtered = dir.join(format!("{}.{}.osm.pbf", stem, category));
        let exported = dir.join(format!("{}.{}.geojson", stem, category));

        self.run(
            Command::new(&self.osmium)
                .arg("tags-filter")
                .arg(pbf)
                .arg(format!("nwr/{}", category))
                .arg("--overwrite")
                .arg("-o")
                .arg(&filtered),
        )?;
        self.run(
            Command::new(&self.osmium)
                .arg("export")
                .arg(&filtered)
                .arg("--geometry-types=point,linestring,polygon")
                .args(["-f", "geojson", "--overwrite", "-o"])
                .arg(&exported),
        )?;
        Ok(exported)
    }
}

impl Extract for OsmiumExtractor {
    fn extract(&self, path: &Path, category: &str) -> Result<FeatureSet> {
        info!("Extracting {} features from {}...", category, path.display());
        let features = if is_geojson(path) {
            load_features(path, category)?
        } else {
            let exported = self.convert(path, category)?;
            load_features(&exported, category)?
        };
        info!("Extracted {} features", features.len());
        Ok(features)
    }
}

fn is_geojson(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("geojson") || e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Load the features of a GeoJSON FeatureCollection that carry `category`.
///
/// Geometry kinds other than point, line-string, polygon and multi-polygon
/// are skipped, as are geometries without coordinates.
pub fn load_features(path: &Path, category: &str) -> Result<FeatureSet> {
    let file = File::open(path)
        .map_err(|e| Error::Extraction(format!("cannot open {}: {}", path.display(), e)))?;
    let reader = BufReader::new(file);
    parse_features(GeoJson::from_reader(reader).map_err(geojson::Error::from)?, category)
}

pub fn parse_features(geojson: GeoJson, category: &str) -> Result<FeatureSet> {
    let GeoJson::FeatureCollection(fc) = geojson else {
        return Err(Error::Extraction(
            "expected a GeoJSON FeatureCollection".to_string(),
        ));
    };

    let total = fc.features.len();
    let mut features = Vec::with_capacity(total);
    let mut skipped = 0;
    for feature in fc.features {
        let properties = feature.properties.unwrap_or_default();
        if !properties.contains_key(category) {
            continue;
        }
        let Some(geometry) = feature.geometry else {
            skipped += 1;
            continue;
        };
        match convert_value(&geometry.value)? {
            Some(geometry) => features.push(Feature::new(geometry, Attributes::from(properties))),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("Skipped {} features with unsupported, empty or missing geometry", skipped);
    }
    debug!("Kept {}/{} features tagged {}", features.len(), total, category);
    Ok(FeatureSet::new(WGS84, features))
}

fn coord(position: &[f64]) -> Result<Coord<f64>> {
    match position {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => Err(Error::Extraction(format!(
            "position needs at least 2 values, got {}",
            position.len()
        ))),
    }
}

fn line(positions: &[Vec<f64>]) -> Result<LineString<f64>> {
    positions
        .iter()
        .map(|p| coord(p))
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>> {
    let Some((exterior, holes)) = rings.split_first() else {
        return Err(Error::Extraction("polygon without exterior ring".to_string()));
    };
    let holes = holes
        .iter()
        .map(|ring| line(ring))
        .collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(line(exterior)?, holes))
}

fn has_exterior(rings: &[Vec<Vec<f64>>]) -> bool {
    rings.first().is_some_and(|exterior| !exterior.is_empty())
}

/// Convert a supported geometry. Unsupported kinds and empty geometries
/// convert to `None` so the caller can skip them.
fn convert_value(value: &GeoJsonValue) -> Result<Option<FeatureGeometry>> {
    let geometry = match value {
        GeoJsonValue::Point(p) => FeatureGeometry::Point(Point::from(coord(p)?)),
        GeoJsonValue::LineString(coords) if coords.is_empty() => return Ok(None),
        GeoJsonValue::LineString(coords) => FeatureGeometry::LineString(line(coords)?),
        GeoJsonValue::Polygon(rings) if !has_exterior(rings) => return Ok(None),
        GeoJsonValue::Polygon(rings) => FeatureGeometry::Polygon(polygon(rings)?),
        GeoJsonValue::MultiPolygon(polygons) => {
            let polygons = polygons
                .iter()
                .filter(|rings| has_exterior(rings))
                .map(|rings| polygon(rings))
                .collect::<Result<Vec<_>>>()?;
            if polygons.is_empty() {
                return Ok(None);
            }
            FeatureGeometry::MultiPolygon(MultiPolygon::new(polygons))
        }
        _ => return Ok(None),
    };
    Ok(Some(geometry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::POWER_KEY;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature",
             "geometry": {"type": "Point", "coordinates": [-149.9, 61.2]},
             "properties": {"power": "substation", "name": "Anchorage"}},
            {"type": "Feature",
             "geometry": {"type": "LineString", "coordinates": [[-149.9, 61.2], [-147.7, 64.8]]},
             "properties": {"power": "line", "voltage": "138000"}},
            {"type": "Feature",
             "geometry": {"type": "Point", "coordinates": [-150.0, 62.0]},
             "properties": {"amenity": "cafe"}},
            {"type": "Feature",
             "geometry": {"type": "MultiLineString", "coordinates": [[[0, 0], [1, 1]]]},
             "properties": {"power": "cable"}},
            {"type": "Feature",
             "geometry": {"type": "MultiPolygon", "coordinates": [[[[0, 0], [1, 0], [1, 1], [0, 0]]]]},
             "properties": {"power": "substation"}}
        ]
    }"#;

    #[test]
    fn test_parse_keeps_category_and_supported_geometry() {
        let geojson: GeoJson = SAMPLE.parse().unwrap();
        let set = parse_features(geojson, POWER_CATEGORY).unwrap();
        assert_eq!(set.crs, WGS84);
        let kinds: Vec<_> = set.iter().map(|f| f.geometry.type_name()).collect();
        assert_eq!(kinds, vec!["Point", "LineString", "MultiPolygon"]);
        assert_eq!(set.features[0].attributes.get_str("name"), Some("Anchorage"));
        assert_eq!(set.features[1].attributes.get_str(POWER_KEY), Some("line"));
    }

    #[test]
    fn test_empty_geometries_are_skipped() {
        let geojson: GeoJson = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature",
                 "geometry": {"type": "LineString", "coordinates": []},
                 "properties": {"power": "substation"}},
                {"type": "Feature",
                 "geometry": {"type": "Polygon", "coordinates": [[]]},
                 "properties": {"power": "substation"}},
                {"type": "Feature",
                 "geometry": {"type": "MultiPolygon", "coordinates": []},
                 "properties": {"power": "substation"}},
                {"type": "Feature",
                 "geometry": {"type": "Point", "coordinates": [-135.0, 60.7]},
                 "properties": {"power": "substation", "name": "Whitehorse"}}
            ]
        }"#
        .parse()
        .unwrap();
        let set = parse_features(geojson, POWER_CATEGORY).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.features[0].attributes.get_str("name"), Some("Whitehorse"));
    }

    #[test]
    fn test_non_collection_is_extraction_error() {
        let geojson: GeoJson = r#"{"type": "Point", "coordinates": [0, 0]}"#.parse().unwrap();
        let err = parse_features(geojson, POWER_CATEGORY).unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn test_extract_reads_geojson_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("alaska-latest.geojson");
        std::fs::write(&path, SAMPLE).unwrap();
        let set = OsmiumExtractor::default()
            .extract(&path, POWER_CATEGORY)
            .unwrap();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_malformed_file_is_extraction_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.geojson");
        std::fs::write(&path, "{ not json").unwrap();
        let err = OsmiumExtractor::default()
            .extract(&path, POWER_CATEGORY)
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn test_missing_osmium_is_extraction_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("x-latest.osm.pbf");
        std::fs::write(&path, b"not a pbf").unwrap();
        let err = OsmiumExtractor::new(temp_dir.path().join("no-such-osmium"))
            .extract(&path, POWER_CATEGORY)
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }
}
