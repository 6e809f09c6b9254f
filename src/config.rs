use std::path::PathBuf;

/// NSIDC Sea Ice Polar Stereographic North.
pub const ARCTIC_POLAR_STEREOGRAPHIC: &str = "EPSG:3413";

pub const DEFAULT_BUFFER_DISTANCE: f64 = 1.0;
pub const DEFAULT_STAGING_DIR: &str = "./data/osm/pbf";
pub const DEFAULT_OUTPUT_DIR: &str = "./data/osm/outputs";

/// How geometries are collapsed to centroid points.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    /// Buffer radius for points and lines, in target CRS units.
    pub buffer_distance: f64,
    /// Projected CRS used for buffering; `None` works in the source CRS.
    pub target_crs: Option<String>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            buffer_distance: DEFAULT_BUFFER_DISTANCE,
            target_crs: Some(ARCTIC_POLAR_STEREOGRAPHIC.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Where raw regional extracts are downloaded.
    pub staging_dir: PathBuf,
    /// Where vector outputs and the summary are written.
    pub output_dir: PathBuf,
    pub normalize: NormalizeOptions,
}

impl PipelineConfig {
    pub fn new(staging_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            output_dir: output_dir.into(),
            normalize: NormalizeOptions::default(),
        }
    }

    pub fn with_normalize(mut self, normalize: NormalizeOptions) -> Self {
        self.normalize = normalize;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STAGING_DIR, DEFAULT_OUTPUT_DIR)
    }
}
