use geo::{Geometry, LineString, MultiPolygon, Point, Polygon};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// CRS assigned to features read from OSM extracts.
pub const WGS84: &str = "EPSG:4326";

/// Attribute keys the pipeline relies on.
pub const POWER_KEY: &str = "power";
pub const REGION_KEY: &str = "region";
pub const OSM_SRC_KEY: &str = "osm_src";
pub const OSM_LIC_KEY: &str = "osm_lic";
pub const OSM_ATTR_KEY: &str = "osm_attr";

/// The geometry kinds a power feature can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    Point(Point<f64>),
    LineString(LineString<f64>),
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl FeatureGeometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            FeatureGeometry::Point(_) => "Point",
            FeatureGeometry::LineString(_) => "LineString",
            FeatureGeometry::Polygon(_) => "Polygon",
            FeatureGeometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self, FeatureGeometry::Point(_))
    }

    pub fn as_point(&self) -> Option<&Point<f64>> {
        match self {
            FeatureGeometry::Point(p) => Some(p),
            _ => None,
        }
    }
}

impl TryFrom<Geometry<f64>> for FeatureGeometry {
    type Error = Error;

    fn try_from(geometry: Geometry<f64>) -> Result<Self> {
        match geometry {
            Geometry::Point(p) => Ok(FeatureGeometry::Point(p)),
            Geometry::LineString(l) => Ok(FeatureGeometry::LineString(l)),
            Geometry::Polygon(p) => Ok(FeatureGeometry::Polygon(p)),
            Geometry::MultiPolygon(m) => Ok(FeatureGeometry::MultiPolygon(m)),
            other => Err(Error::Extraction(format!(
                "unsupported geometry type {}",
                geometry_name(&other)
            ))),
        }
    }
}

impl From<FeatureGeometry> for Geometry<f64> {
    fn from(geometry: FeatureGeometry) -> Self {
        match geometry {
            FeatureGeometry::Point(p) => Geometry::Point(p),
            FeatureGeometry::LineString(l) => Geometry::LineString(l),
            FeatureGeometry::Polygon(p) => Geometry::Polygon(p),
            FeatureGeometry::MultiPolygon(m) => Geometry::MultiPolygon(m),
        }
    }
}

fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Key/value attributes of a feature, in GeoJSON property form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(Map<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// String value of `key`, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Set `key`, replacing any previous value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Attributes {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: FeatureGeometry,
    pub attributes: Attributes,
}

impl Feature {
    pub fn new(geometry: FeatureGeometry, attributes: Attributes) -> Self {
        Self {
            geometry,
            attributes,
        }
    }
}

/// Ordered features sharing one coordinate reference system.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub crs: String,
    pub features: Vec<Feature>,
}

impl FeatureSet {
    pub fn new(crs: impl Into<String>, features: Vec<Feature>) -> Self {
        Self {
            crs: crs.into(),
            features,
        }
    }

    pub fn empty(crs: impl Into<String>) -> Self {
        Self::new(crs, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// True if at least one record carries `key`.
    pub fn has_attribute(&self, key: &str) -> bool {
        self.features.iter().any(|f| f.attributes.contains(key))
    }

    /// Set `key` to `value` on every record.
    pub fn assign(&mut self, key: &str, value: &str) {
        for feature in &mut self.features {
            feature.attributes.set(key, value);
        }
    }

    /// Append `other`'s records. Both sets must share a CRS.
    pub fn extend(&mut self, other: FeatureSet) -> Result<()> {
        if other.crs != self.crs {
            return Err(Error::CrsMismatch {
                expected: self.crs.clone(),
                found: other.crs,
            });
        }
        self.features.extend(other.features);
        Ok(())
    }

    /// Concatenate sets in order. `crs` is used when `sets` is empty.
    pub fn concat(crs: &str, sets: Vec<FeatureSet>) -> Result<FeatureSet> {
        let mut combined = FeatureSet::empty(crs);
        let mut sets = sets.into_iter();
        if let Some(first) = sets.next() {
            combined = first;
        }
        for set in sets {
            combined.extend(set)?;
        }
        Ok(combined)
    }
}

impl IntoIterator for FeatureSet {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::point;

    fn tagged(value: &str) -> Feature {
        Feature::new(
            FeatureGeometry::Point(point!(x: 1.0, y: 2.0)),
            [(POWER_KEY, value)].into_iter().collect(),
        )
    }

    #[test]
    fn test_unsupported_geometry_is_rejected() {
        let multi = Geometry::MultiPoint(vec![point!(x: 0.0, y: 0.0)].into());
        let err = FeatureGeometry::try_from(multi).unwrap_err();
        assert!(err.to_string().contains("MultiPoint"));
    }

    #[test]
    fn test_assign_overwrites() {
        let mut set = FeatureSet::new(WGS84, vec![tagged("substation"), tagged("line")]);
        set.assign(REGION_KEY, "alaska");
        set.assign(REGION_KEY, "canada");
        assert!(set
            .iter()
            .all(|f| f.attributes.get_str(REGION_KEY) == Some("canada")));
    }

    #[test]
    fn test_concat_preserves_order() {
        let a = FeatureSet::new(WGS84, vec![tagged("a1"), tagged("a2")]);
        let b = FeatureSet::new(WGS84, vec![tagged("b1")]);
        let combined = FeatureSet::concat(WGS84, vec![a, b]).unwrap();
        let values: Vec<_> = combined
            .iter()
            .map(|f| f.attributes.get_str(POWER_KEY).unwrap())
            .collect();
        assert_eq!(values, vec!["a1", "a2", "b1"]);
    }

    #[test]
    fn test_concat_of_nothing_is_empty() {
        let combined = FeatureSet::concat(WGS84, Vec::new()).unwrap();
        assert!(combined.is_empty());
        assert_eq!(combined.crs, WGS84);
    }

    #[test]
    fn test_extend_rejects_crs_mismatch() {
        let mut a = FeatureSet::new(WGS84, vec![tagged("a")]);
        let b = FeatureSet::new("EPSG:3413", vec![tagged("b")]);
        let err = a.extend(b).unwrap_err();
        assert!(matches!(err, Error::CrsMismatch { .. }));
        assert_eq!(err.kind(), "crs_mismatch");
        assert_eq!(err.to_string(), "CRS mismatch: expected EPSG:4326, found EPSG:3413");
        assert_eq!(a.len(), 1);
    }
}
