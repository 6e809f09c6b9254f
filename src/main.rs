use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use panarctic_power::config::{DEFAULT_BUFFER_DISTANCE, DEFAULT_OUTPUT_DIR, DEFAULT_STAGING_DIR};
use panarctic_power::registry::ALL_REGIONS;
use panarctic_power::{process_regions, Error, NormalizeOptions, RegionRegistry, SummaryRow};
use tabwriter::TabWriter;
use tracing::{error, info};

fn cli() -> Command {
    Command::new("Pan-Arctic Power")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Jesper Fjellin")
        .about("Extract OSM power infrastructure for Pan-Arctic analysis")
        .arg(
            Arg::new("regions")
                .short('r')
                .long("regions")
                .num_args(1..)
                .default_value(ALL_REGIONS)
                .help("Regions to process (default: all)"),
        )
        .arg(
            Arg::new("pbf-dir")
                .long("pbf-dir")
                .default_value(DEFAULT_STAGING_DIR)
                .value_parser(value_parser!(PathBuf))
                .help("Directory to store downloaded PBF files"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .default_value(DEFAULT_OUTPUT_DIR)
                .value_parser(value_parser!(PathBuf))
                .help("Output directory for vector files and the summary"),
        )
        .arg(
            Arg::new("registry")
                .long("registry")
                .value_parser(value_parser!(PathBuf))
                .help("TOML file of [[region]] id/url entries replacing the built-in regions"),
        )
        .arg(
            Arg::new("buffer-distance")
                .long("buffer-distance")
                .value_parser(value_parser!(f64))
                .help("Buffer radius for points and lines, in target CRS units (default: 1)"),
        )
        .arg(
            Arg::new("target-crs")
                .long("target-crs")
                .help("Projected CRS for centroid computation, or 'none' (default: EPSG:3413)"),
        )
        .arg(
            Arg::new("list")
                .long("list")
                .action(ArgAction::SetTrue)
                .help("List the registered regions and exit"),
        )
}

fn print_summary(rows: &[SummaryRow]) -> io::Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "region\tsubstations\ttransmission_lines")?;
    for row in rows {
        writeln!(
            writer,
            "{}\t{}\t{}",
            row.region, row.substations, row.transmission_lines
        )?;
    }
    writer.flush()
}

fn print_registry(registry: &RegionRegistry) -> io::Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "REGION\tURL")?;
    for region in registry.iter() {
        writeln!(writer, "{}\t{}", region.id, region.url)?;
    }
    writer.flush()
}

fn run() -> anyhow::Result<ExitCode> {
    let matches = cli().get_matches();

    let registry = match matches.get_one::<PathBuf>("registry") {
        Some(path) => RegionRegistry::from_file(path)
            .with_context(|| format!("Failed to load region registry {}", path.display()))?,
        None => RegionRegistry::arctic(),
    };

    if matches.get_flag("list") {
        print_registry(&registry)?;
        return Ok(ExitCode::SUCCESS);
    }

    let regions: Vec<String> = matches
        .get_many::<String>("regions")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let staging_dir = matches
        .get_one::<PathBuf>("pbf-dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STAGING_DIR));
    let output_dir = matches
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    let normalize = NormalizeOptions {
        buffer_distance: matches
            .get_one::<f64>("buffer-distance")
            .copied()
            .unwrap_or(DEFAULT_BUFFER_DISTANCE),
        target_crs: match matches.get_one::<String>("target-crs") {
            Some(crs) if crs.eq_ignore_ascii_case("none") => None,
            Some(crs) => Some(crs.clone()),
            None => NormalizeOptions::default().target_crs,
        },
    };

    match process_regions(&registry, &regions, staging_dir, output_dir, normalize) {
        Ok(report) => {
            print_summary(&report.summary)?;
            for path in &report.outputs {
                info!("Wrote {}", path.display());
            }
            info!("Extraction complete");
            Ok(ExitCode::SUCCESS)
        }
        Err(Error::NoRegionSucceeded { failed }) => {
            error!("No data was successfully extracted ({} region(s) failed)", failed);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
