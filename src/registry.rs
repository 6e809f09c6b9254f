//! Region identifiers and where their OSM extracts come from.
//!
//! A [`RegionRegistry`] is built once at start-up, either from the built-in
//! Geofabrik table or from a TOML file, and handed to the pipeline.
//!
//! ```toml
//! [[region]]
//! id = "alaska"
//! url = "https://download.geofabrik.de/north-america/us/alaska-latest.osm.pbf"
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Keyword selecting every registered region.
pub const ALL_REGIONS: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Region {
    pub id: String,
    pub url: String,
}

impl Region {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(rename = "region", default)]
    regions: Vec<Region>,
}

/// Immutable, ordered mapping from region id to source URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRegistry {
    regions: Vec<Region>,
}

impl RegionRegistry {
    /// Build a registry, rejecting empty and duplicate ids.
    pub fn new(regions: Vec<Region>) -> Result<Self> {
        let mut seen = HashSet::new();
        for region in &regions {
            if region.id.trim().is_empty() {
                return Err(Error::Config("region id must not be empty".to_string()));
            }
            if region.id == ALL_REGIONS {
                return Err(Error::Config(format!(
                    "'{}' is reserved and cannot be a region id",
                    ALL_REGIONS
                )));
            }
            if !seen.insert(region.id.as_str()) {
                return Err(Error::Config(format!("duplicate region id '{}'", region.id)));
            }
        }
        Ok(Self { regions })
    }

    /// The Arctic regions published by Geofabrik.
    pub fn arctic() -> Self {
        Self {
            regions: vec![
                Region::new(
                    "alaska",
                    "https://download.geofabrik.de/north-america/us/alaska-latest.osm.pbf",
                ),
                Region::new(
                    "canada",
                    "https://download.geofabrik.de/north-america/canada-latest.osm.pbf",
                ),
                Region::new(
                    "greenland",
                    "https://download.geofabrik.de/north-america/greenland-latest.osm.pbf",
                ),
                Region::new(
                    "russia_far_east",
                    "https://download.geofabrik.de/russia/far-eastern-fed-district-latest.osm.pbf",
                ),
            ],
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: RegistryFile =
            toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;
        Self::new(file.regions)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read registry {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn get(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(|r| r.id.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Resolve requested ids to regions in registry order.
    ///
    /// `all` anywhere in the request selects every region. Unknown ids fail
    /// before anything is processed; repeats are collapsed.
    pub fn select<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<Region>> {
        if requested.is_empty() || requested.iter().any(|r| r.as_ref() == ALL_REGIONS) {
            return Ok(self.regions.clone());
        }

        let mut wanted = HashSet::new();
        for id in requested {
            let id = id.as_ref();
            if self.get(id).is_none() {
                let known: Vec<_> = self.ids().collect();
                return Err(Error::Config(format!(
                    "unknown region '{}' (known: {}, or '{}')",
                    id,
                    known.join(", "),
                    ALL_REGIONS
                )));
            }
            wanted.insert(id);
        }

        Ok(self
            .regions
            .iter()
            .filter(|r| wanted.contains(r.id.as_str()))
            .cloned()
            .collect())
    }
}

impl Default for RegionRegistry {
    fn default() -> Self {
        Self::arctic()
    }
}
