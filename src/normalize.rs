use geo::{Buffer, Centroid, Coord, LineString, MapCoords, MultiPolygon, Point, Polygon};
use proj::Proj;
use tracing::{debug, info};

use crate::config::NormalizeOptions;
use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureGeometry, FeatureSet};

/// Forward and inverse transforms between a source and a projected CRS.
pub struct Reprojection {
    forward: Proj,
    inverse: Proj,
}

impl Reprojection {
    pub fn new(from: &str, to: &str) -> Result<Self> {
        Ok(Self {
            forward: Proj::new_known_crs(from, to, None)?,
            inverse: Proj::new_known_crs(to, from, None)?,
        })
    }

    pub fn project(&self, geometry: &FeatureGeometry) -> Result<FeatureGeometry> {
        transform_geometry(&self.forward, geometry)
    }

    pub fn unproject(&self, point: &Point<f64>) -> Result<Point<f64>> {
        Ok(point.try_map_coords(|c| convert(&self.inverse, c))?)
    }
}

fn convert(proj: &Proj, coord: Coord<f64>) -> std::result::Result<Coord<f64>, proj::ProjError> {
    let (x, y) = proj.convert((coord.x, coord.y))?;
    Ok(Coord { x, y })
}

fn transform_geometry(proj: &Proj, geometry: &FeatureGeometry) -> Result<FeatureGeometry> {
    let transformed = match geometry {
        FeatureGeometry::Point(p) => FeatureGeometry::Point(p.try_map_coords(|c| convert(proj, c))?),
        FeatureGeometry::LineString(l) => {
            FeatureGeometry::LineString(l.try_map_coords(|c| convert(proj, c))?)
        }
        FeatureGeometry::Polygon(p) => {
            FeatureGeometry::Polygon(p.try_map_coords(|c| convert(proj, c))?)
        }
        FeatureGeometry::MultiPolygon(m) => {
            FeatureGeometry::MultiPolygon(m.try_map_coords(|c| convert(proj, c))?)
        }
    };
    Ok(transformed)
}

/// An area-typed geometry, ready for centroid extraction.
#[derive(Debug, Clone, PartialEq)]
enum Areal {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl Areal {
    fn centroid(&self) -> Option<Point<f64>> {
        match self {
            Areal::Polygon(p) => p.centroid(),
            Areal::MultiPolygon(m) => m.centroid(),
        }
    }
}

/// Expand points and lines into areas by buffering; areas pass through.
fn to_areal(geometry: FeatureGeometry, buffer_distance: f64) -> Areal {
    match geometry {
        FeatureGeometry::Point(p) => coerce_if_empty(p.buffer(buffer_distance), || {
            LineString::from(vec![p.0])
        }),
        FeatureGeometry::LineString(l) => {
            let buffered = l.buffer(buffer_distance);
            coerce_if_empty(buffered, || l)
        }
        FeatureGeometry::Polygon(p) => Areal::Polygon(p),
        FeatureGeometry::MultiPolygon(m) => Areal::MultiPolygon(m),
    }
}

/// Degenerate inputs can buffer to nothing. Their point sequence then becomes
/// the polygon ring directly.
fn coerce_if_empty(buffered: MultiPolygon<f64>, ring: impl FnOnce() -> LineString<f64>) -> Areal {
    if buffered.0.is_empty() {
        debug!("Buffer produced no area, coercing point sequence into a polygon");
        Areal::Polygon(Polygon::new(ring(), vec![]))
    } else {
        Areal::MultiPolygon(buffered)
    }
}

/// Centroid of `geometry` after buffering, in the geometry's own CRS.
pub fn centroid_of(geometry: FeatureGeometry, buffer_distance: f64) -> Result<Point<f64>> {
    let kind = geometry.type_name();
    to_areal(geometry, buffer_distance)
        .centroid()
        .ok_or_else(|| Error::Normalization(format!("{} geometry has no centroid", kind)))
}

/// Collapse every geometry of `features` to a representative point.
///
/// Geometries are reprojected into `options.target_crs` (when set and
/// different from the set's CRS), points and lines are buffered by
/// `options.buffer_distance`, every area is replaced by its centroid and the
/// result is projected back. Attributes, order and CRS are preserved.
pub fn convert_to_centroids(features: FeatureSet, options: &NormalizeOptions) -> Result<FeatureSet> {
    if features.is_empty() {
        return Ok(features);
    }
    if !options.buffer_distance.is_finite() {
        return Err(Error::Normalization(format!(
            "buffer distance must be finite, got {}",
            options.buffer_distance
        )));
    }

    let original_crs = features.crs.clone();
    let reprojection = match options.target_crs.as_deref() {
        Some(target) if target != original_crs => Some(Reprojection::new(&original_crs, target)?),
        _ => None,
    };

    let total = features.len();
    let mut normalized = Vec::with_capacity(total);
    for feature in features {
        let geometry = match &reprojection {
            Some(r) => r.project(&feature.geometry)?,
            None => feature.geometry,
        };
        let centroid = centroid_of(geometry, options.buffer_distance)?;
        let centroid = match &reprojection {
            Some(r) => r.unproject(&centroid)?,
            None => centroid,
        };
        normalized.push(Feature::new(FeatureGeometry::Point(centroid), feature.attributes));
    }

    info!(
        "Converted {} features to centroids (buffer {} in {})",
        total,
        options.buffer_distance,
        options.target_crs.as_deref().unwrap_or(&original_crs)
    );
    Ok(FeatureSet::new(original_crs, normalized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ARCTIC_POLAR_STEREOGRAPHIC;
    use crate::feature::{Attributes, POWER_KEY, WGS84};
    use geo::{line_string, point, polygon};

    fn planar() -> NormalizeOptions {
        NormalizeOptions {
            buffer_distance: 1.0,
            target_crs: None,
        }
    }

    fn substation(geometry: FeatureGeometry, name: &str) -> Feature {
        let attributes: Attributes = [(POWER_KEY, "substation"), ("name", name)]
            .into_iter()
            .collect();
        Feature::new(geometry, attributes)
    }

    fn assert_close(a: &Point<f64>, b: &Point<f64>, tolerance: f64) {
        assert!(
            (a.x() - b.x()).abs() < tolerance && (a.y() - b.y()).abs() < tolerance,
            "{:?} != {:?}",
            a,
            b
        );
    }

    #[test]
    fn test_empty_set_passes_through() {
        let empty = FeatureSet::empty(WGS84);
        let out = convert_to_centroids(empty.clone(), &NormalizeOptions::default()).unwrap();
        assert_eq!(out, empty);
    }

    #[test]
    fn test_mixed_geometries_become_points() {
        let set = FeatureSet::new(
            "EPSG:3413",
            vec![
                substation(FeatureGeometry::Point(point!(x: 10.0, y: 20.0)), "p"),
                substation(
                    FeatureGeometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)]),
                    "l",
                ),
                substation(
                    FeatureGeometry::Polygon(polygon![
                        (x: 0.0, y: 0.0),
                        (x: 40.0, y: 0.0),
                        (x: 40.0, y: 40.0),
                        (x: 0.0, y: 40.0),
                    ]),
                    "poly",
                ),
                substation(
                    FeatureGeometry::MultiPolygon(MultiPolygon::new(vec![polygon![
                        (x: 100.0, y: 100.0),
                        (x: 110.0, y: 100.0),
                        (x: 110.0, y: 110.0),
                        (x: 100.0, y: 110.0),
                    ]])),
                    "multi",
                ),
            ],
        );

        let out = convert_to_centroids(set.clone(), &planar()).unwrap();
        assert_eq!(out.len(), set.len());
        assert_eq!(out.crs, "EPSG:3413");
        assert!(out.iter().all(|f| f.geometry.is_point()));

        let points: Vec<_> = out.iter().map(|f| *f.geometry.as_point().unwrap()).collect();
        assert_close(&points[0], &point!(x: 10.0, y: 20.0), 1e-6);
        assert_close(&points[1], &point!(x: 50.0, y: 0.0), 1e-6);
        assert_close(&points[2], &point!(x: 20.0, y: 20.0), 1e-9);
        assert_close(&points[3], &point!(x: 105.0, y: 105.0), 1e-9);
    }

    #[test]
    fn test_attributes_and_order_preserved() {
        let set = FeatureSet::new(
            WGS84,
            vec![
                substation(FeatureGeometry::Point(point!(x: 1.0, y: 1.0)), "first"),
                substation(FeatureGeometry::Point(point!(x: 2.0, y: 2.0)), "second"),
            ],
        );
        let out = convert_to_centroids(set, &planar()).unwrap();
        let names: Vec<_> = out
            .iter()
            .map(|f| f.attributes.get_str("name").unwrap())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(out
            .iter()
            .all(|f| f.attributes.get_str(POWER_KEY) == Some("substation")));
    }

    #[test]
    fn test_degenerate_buffer_falls_back_to_point_sequence() {
        let areal = coerce_if_empty(MultiPolygon::new(vec![]), || {
            line_string![(x: 3.0, y: 4.0), (x: 3.0, y: 4.0)]
        });
        assert!(matches!(areal, Areal::Polygon(_)));
        assert_close(&areal.centroid().unwrap(), &point!(x: 3.0, y: 4.0), 1e-12);
    }

    #[test]
    fn test_empty_geometry_has_no_centroid() {
        let err = centroid_of(FeatureGeometry::MultiPolygon(MultiPolygon::new(vec![])), 1.0)
            .unwrap_err();
        assert!(matches!(err, Error::Normalization(_)));
    }

    #[test]
    fn test_non_finite_buffer_is_rejected() {
        let set = FeatureSet::new(
            WGS84,
            vec![substation(FeatureGeometry::Point(point!(x: 0.0, y: 0.0)), "p")],
        );
        let options = NormalizeOptions {
            buffer_distance: f64::NAN,
            target_crs: None,
        };
        assert!(convert_to_centroids(set, &options).is_err());
    }

    #[test]
    fn test_point_round_trips_through_polar_projection() {
        let set = FeatureSet::new(
            WGS84,
            vec![substation(FeatureGeometry::Point(point!(x: 0.0, y: 0.0)), "origin")],
        );
        let options = NormalizeOptions {
            buffer_distance: 1.0,
            target_crs: Some(ARCTIC_POLAR_STEREOGRAPHIC.to_string()),
        };
        let out = convert_to_centroids(set, &options).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.crs, WGS84);
        assert_close(out.features[0].geometry.as_point().unwrap(), &point!(x: 0.0, y: 0.0), 1e-6);
    }

    #[test]
    fn test_arctic_polygon_centroid_stays_inside_bounds() {
        // Substation footprint near Fairbanks, Alaska
        let set = FeatureSet::new(
            WGS84,
            vec![substation(
                FeatureGeometry::Polygon(polygon![
                    (x: -147.72, y: 64.83),
                    (x: -147.70, y: 64.83),
                    (x: -147.70, y: 64.84),
                    (x: -147.72, y: 64.84),
                ]),
                "fairbanks",
            )],
        );
        let out = convert_to_centroids(set, &NormalizeOptions::default()).unwrap();
        let p = out.features[0].geometry.as_point().unwrap();
        assert!(p.x() > -147.72 && p.x() < -147.70, "{:?}", p);
        assert!(p.y() > 64.83 && p.y() < 64.84, "{:?}", p);
    }
}
