use std::path::PathBuf;

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod feature;
pub mod fetch;
pub mod filter;
pub mod normalize;
pub mod pipeline;
pub mod registry;

pub use config::{NormalizeOptions, PipelineConfig};
pub use error::{Error, Result};
pub use feature::{Attributes, Feature, FeatureGeometry, FeatureSet};
pub use pipeline::{Pipeline, PipelineReport, SummaryRow};
pub use registry::{Region, RegionRegistry};

/// Run the pipeline over `requested` regions with the default collaborators:
/// HTTP/file fetching, osmium-backed extraction and GeoJSON output.
pub fn process_regions(
    registry: &RegionRegistry,
    requested: &[String],
    staging_dir: PathBuf,
    output_dir: PathBuf,
    normalize: NormalizeOptions,
) -> Result<PipelineReport> {
    let fetcher = fetch::HttpFetcher::new();
    let extractor = extract::OsmiumExtractor::default();
    let writer = export::GeoJsonWriter::default();
    let config = PipelineConfig::new(staging_dir, output_dir).with_normalize(normalize);

    Pipeline::new(config, &fetcher, &extractor, &writer).run_selected(registry, requested)
}
