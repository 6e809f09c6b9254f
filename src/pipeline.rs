//! Region processing and pan-regional aggregation.
//!
//! Each region runs fetch → extract → filter → normalize → export on its own.
//! [`Pipeline::process_regions`] folds the regions into one [`RegionResult`]
//! each, and [`aggregate`] combines the successful ones into the pan-regional
//! datasets and the summary table.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::export::{apply_attribution, ExportBoundary, WriteVector};
use crate::extract::{Extract, POWER_CATEGORY};
use crate::feature::{FeatureSet, REGION_KEY, WGS84};
use crate::fetch::{staged_file_name, Fetch};
use crate::filter::{filter_substations, filter_transmission_lines};
use crate::normalize::convert_to_centroids;
use crate::registry::{Region, RegionRegistry};

pub const COMBINED_SUBSTATIONS: &str = "panarctic_all_substations";
pub const COMBINED_LINES: &str = "panarctic_lines";
pub const SUMMARY_NAME: &str = "extraction_summary";
pub const TOTAL_ROW: &str = "Total";

/// Substation centroids and transmission lines of one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFeatures {
    pub substations: FeatureSet,
    pub lines: FeatureSet,
}

#[derive(Debug)]
pub enum RegionOutcome {
    Success(RegionFeatures),
    Failure(Error),
}

#[derive(Debug)]
pub struct RegionResult {
    pub region: String,
    pub outcome: RegionOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub region: String,
    pub substations: usize,
    pub transmission_lines: usize,
}

impl SummaryRow {
    pub fn new(region: impl Into<String>, substations: usize, transmission_lines: usize) -> Self {
        Self {
            region: region.into(),
            substations,
            transmission_lines,
        }
    }
}

/// Pan-regional datasets built from the successful regions.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub substations: FeatureSet,
    pub lines: FeatureSet,
    pub summary: Vec<SummaryRow>,
}

/// What a pipeline run produced.
#[derive(Debug)]
pub struct PipelineReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, Error)>,
    pub summary: Vec<SummaryRow>,
    pub outputs: Vec<PathBuf>,
}

/// Per-region counts in `regions` order, followed by the Total row.
pub fn summarize(regions: &[&str], substations: &FeatureSet, lines: &FeatureSet) -> Vec<SummaryRow> {
    fn count_by_region(features: &FeatureSet) -> HashMap<&str, usize> {
        let mut counts = HashMap::new();
        for feature in features.iter() {
            if let Some(region) = feature.attributes.get_str(REGION_KEY) {
                *counts.entry(region).or_insert(0) += 1;
            }
        }
        counts
    }

    let substation_counts = count_by_region(substations);
    let line_counts = count_by_region(lines);

    let mut rows: Vec<SummaryRow> = regions
        .iter()
        .map(|region| {
            SummaryRow::new(
                *region,
                substation_counts.get(region).copied().unwrap_or(0),
                line_counts.get(region).copied().unwrap_or(0),
            )
        })
        .collect();

    let total = rows.iter().fold(SummaryRow::new(TOTAL_ROW, 0, 0), |mut total, row| {
        total.substations += row.substations;
        total.transmission_lines += row.transmission_lines;
        total
    });
    rows.push(total);
    rows
}

/// Tag and concatenate the successful regions, in processing order.
///
/// Returns `None` when no region succeeded.
pub fn aggregate(results: Vec<RegionResult>) -> Result<Option<Aggregate>> {
    let mut regions = Vec::new();
    let mut all_substations = Vec::new();
    let mut all_lines = Vec::new();

    for result in results {
        let RegionOutcome::Success(mut features) = result.outcome else {
            continue;
        };
        features.substations.assign(REGION_KEY, &result.region);
        features.lines.assign(REGION_KEY, &result.region);
        all_substations.push(features.substations);
        all_lines.push(features.lines);
        regions.push(result.region);
    }

    if regions.is_empty() {
        return Ok(None);
    }

    let substations = FeatureSet::concat(WGS84, all_substations)?;
    let lines = FeatureSet::concat(WGS84, all_lines)?;
    let region_ids: Vec<&str> = regions.iter().map(String::as_str).collect();
    let summary = summarize(&region_ids, &substations, &lines);

    Ok(Some(Aggregate {
        substations,
        lines,
        summary,
    }))
}

/// Drives regions through fetch, extraction, filtering, normalization and export.
pub struct Pipeline<'a> {
    config: PipelineConfig,
    fetcher: &'a dyn Fetch,
    extractor: &'a dyn Extract,
    writer: &'a dyn WriteVector,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: PipelineConfig,
        fetcher: &'a dyn Fetch,
        extractor: &'a dyn Extract,
        writer: &'a dyn WriteVector,
    ) -> Self {
        Self {
            config,
            fetcher,
            extractor,
            writer,
        }
    }

    fn exporter(&self) -> ExportBoundary<'a> {
        ExportBoundary::new(&self.config.output_dir, self.writer)
    }

    /// Process one region end to end. Any failing step aborts the region.
    pub fn process_region(&self, region: &Region) -> Result<RegionFeatures> {
        info!("Processing {}", region.id.to_uppercase());

        let staged = self
            .config
            .staging_dir
            .join(staged_file_name(&region.id, &region.url));
        let raw = self.fetcher.fetch(&region.url, &staged)?;

        let power = self.extractor.extract(&raw, POWER_CATEGORY)?;

        let substations = filter_substations(&power)?;
        let substations = convert_to_centroids(substations, &self.config.normalize)?;

        let lines = filter_transmission_lines(&power)?;

        self.exporter()
            .export(&substations, &format!("{}_substations", region.id))?;

        Ok(RegionFeatures { substations, lines })
    }

    /// Run every region in order, recording failures without stopping.
    pub fn process_regions(&self, regions: &[Region]) -> Vec<RegionResult> {
        regions
            .iter()
            .map(|region| {
                let outcome = match self.process_region(region) {
                    Ok(features) => {
                        info!(
                            region = %region.id,
                            "Processed {}: {} substations, {} transmission line segments",
                            region.id,
                            features.substations.len(),
                            features.lines.len()
                        );
                        RegionOutcome::Success(features)
                    }
                    Err(e) => {
                        error!(region = %region.id, kind = e.kind(), "Error processing {}: {}", region.id, e);
                        RegionOutcome::Failure(e)
                    }
                };
                RegionResult {
                    region: region.id.clone(),
                    outcome,
                }
            })
            .collect()
    }

    /// Process the selected regions and write the combined outputs.
    ///
    /// Fails with [`Error::NoRegionSucceeded`] when every region failed; no
    /// combined output is written then. Errors while writing the combined
    /// outputs are returned as-is.
    pub fn run(&self, regions: &[Region]) -> Result<PipelineReport> {
        let ids: Vec<_> = regions.iter().map(|r| r.id.as_str()).collect();
        info!(
            "Processing {} region(s): {}",
            regions.len(),
            ids.join(", ")
        );
        info!("Output directory: {}", self.config.output_dir.display());

        let results = self.process_regions(regions);

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        let mut successes = Vec::new();
        for result in results {
            match result.outcome {
                RegionOutcome::Success(_) => {
                    succeeded.push(result.region.clone());
                    successes.push(result);
                }
                RegionOutcome::Failure(e) => failed.push((result.region, e)),
            }
        }

        let Some(mut combined) = aggregate(successes)? else {
            error!("No data was successfully extracted");
            return Err(Error::NoRegionSucceeded {
                failed: failed.len(),
            });
        };
        if !failed.is_empty() {
            warn!(
                "{} of {} region(s) failed and are excluded from the combined outputs",
                failed.len(),
                regions.len()
            );
        }

        info!("Combining datasets");
        let exporter = self.exporter();
        let mut outputs = Vec::new();
        outputs.push(exporter.export(&combined.substations, COMBINED_SUBSTATIONS)?);

        apply_attribution(&mut combined.lines);
        outputs.push(exporter.export(&combined.lines, COMBINED_LINES)?);

        outputs.push(exporter.export_csv(&combined.summary, SUMMARY_NAME)?);

        Ok(PipelineReport {
            succeeded,
            failed,
            summary: combined.summary,
            outputs,
        })
    }

    /// Resolve `requested` against `registry` and run them.
    pub fn run_selected<S: AsRef<str>>(
        &self,
        registry: &RegionRegistry,
        requested: &[S],
    ) -> Result<PipelineReport> {
        let regions = registry.select(requested)?;
        self.run(&regions)
    }
}
