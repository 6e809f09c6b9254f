use std::fs::{create_dir_all, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use geo::{Coord, LineString, Polygon};
use geojson::{Feature as GeoJsonFeature, FeatureCollection, Geometry as GeoJsonGeometry, Value};
use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::feature::{FeatureGeometry, FeatureSet, OSM_ATTR_KEY, OSM_LIC_KEY, OSM_SRC_KEY};

/// ODbL attribution carried by every exported feature.
pub const ATTRIBUTION: [(&str, &str); 3] = [
    (OSM_SRC_KEY, "OpenStreetMap"),
    (OSM_LIC_KEY, "ODbL"),
    (OSM_ATTR_KEY, "© OSM contributors"),
];

pub const VECTOR_EXTENSION: &str = "geojson";

/// Persists a feature set as a vector file.
pub trait WriteVector {
    fn write_vector(&self, features: &FeatureSet, path: &Path) -> Result<()>;
}

/// Writes GeoJSON FeatureCollections.
#[derive(Debug, Default, Clone)]
pub struct GeoJsonWriter {
    pub pretty: bool,
}

fn position(coord: &Coord<f64>) -> Vec<f64> {
    vec![coord.x, coord.y]
}

fn ring(line: &LineString<f64>) -> Vec<Vec<f64>> {
    line.coords().map(position).collect()
}

fn rings(polygon: &Polygon<f64>) -> Vec<Vec<Vec<f64>>> {
    let mut rings = vec![ring(polygon.exterior())];
    rings.extend(polygon.interiors().iter().map(ring));
    rings
}

fn to_geojson(geometry: &FeatureGeometry) -> GeoJsonGeometry {
    let value = match geometry {
        FeatureGeometry::Point(p) => Value::Point(position(&p.0)),
        FeatureGeometry::LineString(l) => Value::LineString(ring(l)),
        FeatureGeometry::Polygon(p) => Value::Polygon(rings(p)),
        FeatureGeometry::MultiPolygon(m) => Value::MultiPolygon(m.iter().map(rings).collect()),
    };
    GeoJsonGeometry::new(value)
}

impl WriteVector for GeoJsonWriter {
    fn write_vector(&self, features: &FeatureSet, path: &Path) -> Result<()> {
        let collection = FeatureCollection {
            bbox: None,
            features: features
                .iter()
                .map(|f| GeoJsonFeature {
                    bbox: None,
                    geometry: Some(to_geojson(&f.geometry)),
                    id: None,
                    properties: Some(f.attributes.as_map().clone()),
                    foreign_members: None,
                })
                .collect(),
            foreign_members: None,
        };

        let file = File::create(path)
            .map_err(|e| Error::Export(format!("cannot create {}: {}", path.display(), e)))?;
        let writer = BufWriter::new(file);
        let written = if self.pretty {
            serde_json::to_writer_pretty(writer, &collection)
        } else {
            serde_json::to_writer(writer, &collection)
        };
        written.map_err(|e| Error::Export(format!("cannot write {}: {}", path.display(), e)))
    }
}

/// Set the attribution attributes on every record, replacing existing values.
pub fn apply_attribution(features: &mut FeatureSet) {
    for feature in &mut features.features {
        for (key, value) in ATTRIBUTION {
            feature.attributes.set(key, value);
        }
    }
}

/// Check that every record carries the attribution block.
pub fn validate_export(features: &FeatureSet) -> Result<()> {
    for (index, feature) in features.iter().enumerate() {
        for (key, value) in ATTRIBUTION {
            if feature.attributes.get_str(key) != Some(value) {
                return Err(Error::Export(format!(
                    "feature {} is missing attribution '{}'",
                    index, key
                )));
            }
        }
    }
    Ok(())
}

/// Writes attributed feature sets and the summary into one output directory.
pub struct ExportBoundary<'a> {
    output_dir: PathBuf,
    writer: &'a dyn WriteVector,
}

impl<'a> ExportBoundary<'a> {
    pub fn new(output_dir: impl Into<PathBuf>, writer: &'a dyn WriteVector) -> Self {
        Self {
            output_dir: output_dir.into(),
            writer,
        }
    }

    pub fn vector_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.{}", name, VECTOR_EXTENSION))
    }

    /// Attribute `features` and write them to `{output_dir}/{name}.geojson`.
    pub fn export(&self, features: &FeatureSet, name: &str) -> Result<PathBuf> {
        let mut attributed = features.clone();
        apply_attribution(&mut attributed);
        validate_export(&attributed)?;

        create_dir_all(&self.output_dir).map_err(|e| {
            Error::Export(format!("cannot create {}: {}", self.output_dir.display(), e))
        })?;
        let path = self.vector_path(name);
        self.writer.write_vector(&attributed, &path)?;
        info!(
            "Exported {} features to {} (with OSM attribution)",
            attributed.len(),
            path.display()
        );
        Ok(path)
    }

    /// Write rows as CSV to `{output_dir}/{name}.csv`.
    pub fn export_csv<T: Serialize>(&self, rows: &[T], name: &str) -> Result<PathBuf> {
        create_dir_all(&self.output_dir).map_err(|e| {
            Error::Export(format!("cannot create {}: {}", self.output_dir.display(), e))
        })?;
        let path = self.output_dir.join(format!("{}.csv", name));
        let mut writer = csv::Writer::from_path(&path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer
            .flush()
            .map_err(|e| Error::Export(format!("cannot flush {}: {}", path.display(), e)))?;
        info!("Summary saved to {}", path.display());
        Ok(path)
    }
}
