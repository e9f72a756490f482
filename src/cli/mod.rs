//! Command-line interface for the oven sensor pipeline.

use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::InterpolationMode;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "oven-sync")]
#[command(about = "Oven sensor log resampling, alignment and field reconstruction", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Source and target directories shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct DirArgs {
    /// Source directory (defaults to the current directory)
    source: Option<PathBuf>,
    /// Target directory (defaults to the source directory)
    target: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Nearest,
    Idw,
    Both,
}

impl ModeArg {
    fn modes(self) -> Vec<InterpolationMode> {
        match self {
            ModeArg::Nearest => vec![InterpolationMode::Nearest],
            ModeArg::Idw => vec![InterpolationMode::Idw],
            ModeArg::Both => vec![InterpolationMode::Nearest, InterpolationMode::Idw],
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Split raw hub logs (temperature{hub}.csv) into per-sensor files
    Split {
        #[command(flatten)]
        dirs: DirArgs,
    },

    /// Resample per-sensor files and build the aligned table
    Sync {
        #[command(flatten)]
        dirs: DirArgs,
    },

    /// Normalize the raw process-control log (Calc*.csv)
    Curing {
        #[command(flatten)]
        dirs: DirArgs,
    },

    /// Merge the curing table with the aligned sensor table
    Combine {
        #[command(flatten)]
        dirs: DirArgs,
    },

    /// Reconstruct 3D temperature volumes (VTK) from the aligned table
    Field {
        #[command(flatten)]
        dirs: DirArgs,
        /// Oven layout selector (a or b)
        #[arg(long)]
        oven: Option<String>,
        /// Interpolation mode (defaults to the configured mode)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// First snapshot time (epoch seconds)
        #[arg(long)]
        at: Option<i64>,
        /// Number of snapshots
        #[arg(long)]
        count: Option<usize>,
        /// Seconds between snapshots
        #[arg(long)]
        step: Option<i64>,
    },

    /// Plot the aligned table as a PNG line chart
    Plot {
        #[command(flatten)]
        dirs: DirArgs,
        /// Output PNG file path (defaults to sync-output-plot.png in the target)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert raw hub logs from Celsius to Fahrenheit
    Units {
        #[command(flatten)]
        dirs: DirArgs,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Stop the spinner, log the failure and exit.
fn fail(spinner: &ProgressBar, what: &str, e: impl Display) -> ! {
    spinner.finish_and_clear();
    error!("{} failed: {:#}", what, e);
    std::process::exit(1);
}

/// Resolve source/target defaults and create the target directory.
fn resolve_dirs(dirs: &DirArgs) -> (PathBuf, PathBuf) {
    let source = dirs.source.clone().unwrap_or_else(|| PathBuf::from("."));
    let target = dirs.target.clone().unwrap_or_else(|| source.clone());

    if !target.exists() {
        if let Err(e) = fs::create_dir_all(&target) {
            error!("Failed to create {}: {}", target.display(), e);
            std::process::exit(1);
        }
    }
    info!("Source: {}, target: {}", source.display(), target.display());

    (source, target)
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let mut config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Split { dirs } => {
            let (source, target) = resolve_dirs(&dirs);
            cmd_split(&source, &target, &config);
        }
        Commands::Sync { dirs } => {
            let (source, target) = resolve_dirs(&dirs);
            cmd_sync(&source, &target, &config);
        }
        Commands::Curing { dirs } => {
            let (source, target) = resolve_dirs(&dirs);
            cmd_curing(&source, &target, &config);
        }
        Commands::Combine { dirs } => {
            let (source, target) = resolve_dirs(&dirs);
            cmd_combine(&source, &target, &config);
        }
        Commands::Field { dirs, oven, mode, at, count, step } => {
            if let Some(oven) = oven {
                config.field.oven = oven;
            }
            if let Some(count) = count {
                config.field.snapshot_count = count;
            }
            if let Some(step) = step {
                config.field.snapshot_step_secs = step;
            }
            let (source, target) = resolve_dirs(&dirs);
            cmd_field(&source, &target, mode, at, &config);
        }
        Commands::Plot { dirs, output } => {
            let (source, target) = resolve_dirs(&dirs);
            cmd_plot(&source, &target, output, &config);
        }
        Commands::Units { dirs } => {
            let (source, target) = resolve_dirs(&dirs);
            cmd_units(&source, &target, &config);
        }
    }
}

fn cmd_split(source: &Path, target: &Path, config: &PipelineConfig) {
    use crate::processors::splitting;

    let start = Instant::now();
    let spinner = create_spinner("Splitting hub logs by sensor...");

    let summaries = match splitting::split_hub_files(source, target, config) {
        Ok(s) => s,
        Err(e) => fail(&spinner, "Split", e),
    };
    spinner.finish_and_clear();

    let processed = summaries.iter().filter(|s| s.skipped.is_none()).count();
    let kept: usize = summaries.iter().map(|s| s.kept).sum();
    let dropped: usize = summaries.iter().map(|s| s.dropped).sum();

    print_summary(
        "Split Complete",
        &[
            ("Source", source.display().to_string()),
            ("Target", target.display().to_string()),
            ("Hubs processed", format!("{} of {}", processed, summaries.len())),
            ("Rows kept", kept.to_string()),
            ("Rows dropped", dropped.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_sync(source: &Path, target: &Path, config: &PipelineConfig) {
    use crate::processors::alignment;

    let start = Instant::now();
    println!("Resampling every {} s", config.sampling.period_secs);

    let spinner = create_spinner("Resampling and aligning sensor streams...");

    match alignment::sync_sensor_files(source, target, config) {
        Ok(report) => {
            spinner.finish_and_clear();

            print_summary(
                "Sync Complete",
                &[
                    ("Source", source.display().to_string()),
                    ("Aligned table", report.output.display().to_string()),
                    ("Sensors", report.streams.to_string()),
                    ("Sensors with data", report.with_data.to_string()),
                    ("Columns", report.columns.to_string()),
                    ("Rows", report.rows.to_string()),
                    ("Window", format!("{} .. {}", report.window.start, report.window.end)),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Sync", e),
    }
}

fn cmd_curing(source: &Path, target: &Path, config: &PipelineConfig) {
    use crate::processors::curing;

    let start = Instant::now();
    let spinner = create_spinner("Normalizing curing log...");

    match curing::parse_curing_files(source, target, config) {
        Ok(Some(report)) => {
            spinner.finish_and_clear();

            print_summary(
                "Curing Log Complete",
                &[
                    ("Input file", report.source.display().to_string()),
                    ("Output file", report.output.display().to_string()),
                    ("Channels", report.channels.join(",")),
                    ("Rows", report.rows.to_string()),
                    ("Rows skipped", report.skipped.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Ok(None) => {
            spinner.finish_and_clear();
            warn!("Nothing to do: no Calc*.csv in {}", source.display());
        }
        Err(e) => fail(&spinner, "Curing log", e),
    }
}

fn cmd_combine(source: &Path, target: &Path, config: &PipelineConfig) {
    use crate::processors::cross;

    let start = Instant::now();
    let spinner = create_spinner("Interpolating sensors at curing timestamps...");

    match cross::combine_curing_files(source, target, config) {
        Ok((output, outcome)) => {
            spinner.finish_and_clear();

            print_summary(
                "Combine Complete",
                &[
                    ("Source", source.display().to_string()),
                    ("Output file", output.display().to_string()),
                    ("Rows merged", outcome.table.len().to_string()),
                    ("Out of range", outcome.out_of_range.to_string()),
                    ("Out of order", outcome.out_of_order.to_string()),
                    ("Unparsable", outcome.unparsable.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Combine", e),
    }
}

fn cmd_field(
    source: &Path,
    target: &Path,
    mode: Option<ModeArg>,
    at: Option<i64>,
    config: &PipelineConfig,
) {
    use crate::processors::field::{self, FieldRequest};

    let start = Instant::now();

    let mut request = FieldRequest::from_config(&config.field);
    if let Some(mode) = mode {
        request.modes = mode.modes();
    }
    request.start = at;

    println!("Oven layout: {}", config.field.oven);
    println!("Modes: {:?}", request.modes);
    println!("Snapshots: {} every {} s", request.count, request.step_secs);

    let spinner = create_spinner("Reconstructing temperature field...");

    match field::generate_field_files(source, target, config, &request) {
        Ok(written) => {
            spinner.finish_and_clear();

            let names: Vec<String> = written
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect();

            print_summary(
                "Field Generation Complete",
                &[
                    ("Source", source.display().to_string()),
                    ("Target", target.display().to_string()),
                    ("Volumes written", written.len().to_string()),
                    ("Files", names.join(", ")),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Field generation", e),
    }
}

fn cmd_plot(source: &Path, target: &Path, output: Option<PathBuf>, config: &PipelineConfig) {
    use crate::core::loaders;
    use crate::core::sentinel::SentinelPolicy;
    use crate::processors::alignment::ALIGNED_TABLE_FILE;
    use crate::visualization;

    let start = Instant::now();

    let input = source.join(ALIGNED_TABLE_FILE);
    let output_path = output.unwrap_or_else(|| {
        let mut path = target.join(ALIGNED_TABLE_FILE);
        path.set_extension("png");
        path
    });

    println!("Input: {}", input.display());
    println!("Output: {}", output_path.display());

    let spinner = create_spinner("Loading aligned table...");

    let table = match loaders::load_time_table(&input) {
        Ok(t) => t,
        Err(e) => fail(&spinner, "Loading aligned table", e),
    };

    spinner.set_message("Generating plot...");

    let policy = SentinelPolicy::from_config(&config.sampling);
    match visualization::plot_aligned_table(&output_path, &table, &policy) {
        Ok(()) => {
            spinner.finish_and_clear();

            print_summary(
                "Plot Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Output PNG", output_path.display().to_string()),
                    ("Columns", table.num_columns().to_string()),
                    ("Rows", table.len().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Plot", e),
    }
}

fn cmd_units(source: &Path, target: &Path, config: &PipelineConfig) {
    use crate::processors::splitting;

    let start = Instant::now();
    let spinner = create_spinner("Converting hub logs to Fahrenheit...");

    match splitting::convert_hub_units(source, target, config) {
        Ok(written) => {
            spinner.finish_and_clear();

            print_summary(
                "Unit Conversion Complete",
                &[
                    ("Source", source.display().to_string()),
                    ("Target", target.display().to_string()),
                    ("Files written", written.len().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Unit conversion", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_field_flags() {
        let cli = Cli::parse_from([
            "oven-sync", "-vv", "field", "in", "out", "--oven", "a", "--mode", "idw", "--count", "2",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Field { dirs, oven, mode, count, at, .. } => {
                assert_eq!(dirs.source, Some(PathBuf::from("in")));
                assert_eq!(dirs.target, Some(PathBuf::from("out")));
                assert_eq!(oven.as_deref(), Some("a"));
                assert_eq!(mode, Some(ModeArg::Idw));
                assert_eq!(count, Some(2));
                assert_eq!(at, None);
            }
            _ => panic!("Expected field subcommand"),
        }
    }

    #[test]
    fn test_target_defaults_to_source() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = DirArgs {
            source: Some(dir.path().to_path_buf()),
            target: None,
        };
        let (source, target) = resolve_dirs(&dirs);
        assert_eq!(source, target);

        let nested = dir.path().join("a").join("b");
        let dirs = DirArgs {
            source: None,
            target: Some(nested.clone()),
        };
        let (source, target) = resolve_dirs(&dirs);
        assert_eq!(source, PathBuf::from("."));
        assert!(target.is_dir());
        assert_eq!(target, nested);
    }

    #[test]
    fn test_mode_both_expands() {
        assert_eq!(
            ModeArg::Both.modes(),
            vec![InterpolationMode::Nearest, InterpolationMode::Idw]
        );
    }
}
