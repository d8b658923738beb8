//! polycluster: cluster the polygons of a GeoJSON file by overlap and
//! time proximity.
//!
//! Reads a `FeatureCollection`, runs the clustering pipeline with the
//! given parameters, writes the features back with a `cluster_id`
//! property, and prints per-stage diagnostics. Useful for:
//!
//! - Labeling repeated observations of the same footprint
//! - Tuning the overlap and time thresholds on a real dataset
//! - Measuring per-stage durations on large inputs
//!
//! When `--output` is omitted the annotated GeoJSON goes to stdout and
//! the diagnostics go to stderr.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin polycluster -- [OPTIONS] <INPUT>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::info;
use polycluster_geojson::{Dataset, parse_feature_collection, write_feature_collection};
use polycluster_pipeline::ClusterConfig;
use polycluster_pipeline::diagnostics::{ClusterDiagnostics, WebClock, cluster_with_diagnostics};

/// Spatio-temporal polygon clustering for GeoJSON feature collections.
///
/// Groups polygons whose footprints overlap (and, with `--time-key`,
/// whose timestamps are close) and labels every feature with a cluster
/// id, `-1` for noise.
#[derive(Parser)]
#[command(name = "polycluster", version)]
struct Cli {
    /// Path to the input GeoJSON `FeatureCollection` of polygons.
    input: PathBuf,

    /// Write the annotated GeoJSON to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Feature property holding each item's time (Unix seconds or an
    /// RFC 3339 date-time). Enables temporal filtering.
    #[arg(long)]
    time_key: Option<String>,

    /// Maximum time difference in seconds between neighbors. Only used
    /// with `--time-key`.
    #[arg(long, default_value_t = ClusterConfig::DEFAULT_TIME_THRESHOLD)]
    time_threshold: f64,

    /// Components smaller than this are labeled noise (-1).
    #[arg(long, default_value_t = ClusterConfig::DEFAULT_MIN_CLUSTER_SIZE, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    min_cluster_size: usize,

    /// Minimum intersection-over-union, in percent (0-100).
    #[arg(long, default_value_t = ClusterConfig::DEFAULT_OVERLAP_THRESHOLD)]
    overlap_threshold: f64,

    /// Full cluster config as a JSON string.
    ///
    /// When provided, the individual threshold flags are ignored.
    /// The JSON must be a valid `ClusterConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

/// Build a [`ClusterConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual threshold flags are ignored. Otherwise the time threshold
/// applies only when `--time-key` names a time property.
fn config_from_cli(cli: &Cli) -> Result<ClusterConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(ClusterConfig {
        overlap_threshold: cli.overlap_threshold,
        time_threshold: cli.time_key.as_ref().map(|_| cli.time_threshold),
        min_cluster_size: cli.min_cluster_size,
    })
}

fn read_dataset(cli: &Cli) -> Result<Dataset, String> {
    let text = std::fs::read_to_string(&cli.input)
        .map_err(|e| format!("Error reading {}: {e}", cli.input.display()))?;
    parse_feature_collection(&text, cli.time_key.as_deref())
        .map_err(|e| format!("Error parsing {}: {e}", cli.input.display()))
}

fn write_output(cli: &Cli, geojson: &str) -> Result<(), String> {
    match cli.output {
        Some(ref path) => {
            std::fs::write(path, geojson)
                .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
            eprintln!(
                "GeoJSON written to {} ({} bytes)",
                path.display(),
                geojson.len()
            );
        }
        None => println!("{geojson}"),
    }
    Ok(())
}

fn render_diagnostics(cli: &Cli, diagnostics: &ClusterDiagnostics) -> Result<String, String> {
    if cli.json {
        serde_json::to_string_pretty(diagnostics)
            .map_err(|e| format!("Error serializing diagnostics: {e}"))
    } else {
        Ok(diagnostics.report())
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let dataset = match read_dataset(&cli) {
        Ok(dataset) => dataset,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("Input: {} ({} features)", cli.input.display(), dataset.len());
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    // Diagnostics share stdout only when the GeoJSON goes to a file.
    let report_to_stdout = cli.output.is_some();
    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let (result, diagnostics) =
            match cluster_with_diagnostics(dataset.items(), &config, &WebClock) {
                Ok(outcome) => outcome,
                Err(e) => {
                    eprintln!("Clustering error: {e}");
                    return ExitCode::FAILURE;
                }
            };
        info!(
            "run {}: {} clusters, {} noise items",
            run + 1,
            result.cluster_count,
            result.noise_count()
        );

        match render_diagnostics(&cli, &diagnostics) {
            Ok(text) if report_to_stdout => println!("{text}"),
            Ok(text) => eprintln!("{text}"),
            Err(msg) => {
                eprintln!("{msg}");
                return ExitCode::FAILURE;
            }
        }

        // Write GeoJSON on the first run only.
        if run == 0 {
            let written = write_feature_collection(&dataset, &result.cluster_ids)
                .map_err(|e| format!("Error writing GeoJSON: {e}"))
                .and_then(|geojson| write_output(&cli, &geojson));
            if let Err(msg) = written {
                eprintln!("{msg}");
                return ExitCode::FAILURE;
            }
        }

        all_diagnostics.push(diagnostics);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&ClusterDiagnostics) -> Option<std::time::Duration>;

/// Print aggregated timing across multiple runs to stderr.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[ClusterDiagnostics]) {
    eprintln!();
    eprintln!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        eprintln!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    eprintln!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    eprintln!();
    eprintln!("{:<24} {:>12}", "Stage", "Mean (ms)");
    eprintln!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Neighbor Search", |d| Some(d.neighbor_search.duration)),
        ("Graph", |d| Some(d.graph.duration)),
        ("Temporal Filter", |d| {
            d.temporal_filter.as_ref().map(|s| s.duration)
        }),
        ("Components", |d| Some(d.components.duration)),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extractor)
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        eprintln!("{name:<24} {stage_mean:>10.3}ms");
    }
}
