//! cosmetic - batch hot/cold pixel correction for astronomical frames

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use cosmetic_ops::DefectItem;
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "cosmetic")]
#[command(author, version, about = "Batch hot/cold pixel correction for astronomical frames")]
#[command(long_about = "
Detects and repairs hot and cold pixels in batches of frames, using a
calibration frame, per-frame statistics, an explicit defect list, or any
combination of them.

Examples:
  cosmetic init cosmetic.yaml                         # Write a default config
  cosmetic run -c cosmetic.yaml                       # Run a config
  cosmetic run 'lights/*.tif' --auto-hot 3 -o out     # Auto-detect hot pixels
  cosmetic run 'lights/*.tif' --reference dark.tif --hot-quantity 500
  cosmetic run frame.tif --defect col:1021 --defect row:12:100-220
  cosmetic threshold dark.tif --sigma 5               # Level/quantity/sigma readout
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,

    /// Also write the log to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Correct a batch of target frames
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Show level, quantity and sigma equivalents for a calibration frame
    #[command(visible_alias = "t")]
    Threshold(ThresholdArgs),

    /// Write a default configuration file
    Init(InitArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Target frames or glob patterns
    targets: Vec<String>,

    /// YAML configuration (command-line flags override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory (default: next to each source)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output file name prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Output file name postfix
    #[arg(long)]
    postfix: Option<String>,

    /// Output file extension
    #[arg(long = "ext")]
    extension: Option<String>,

    /// Replace existing output files
    #[arg(long)]
    overwrite: bool,

    /// Frames are color-filter mosaics
    #[arg(long)]
    cfa: bool,

    /// Correction strength, 0..1
    #[arg(short, long)]
    amount: Option<f64>,

    /// Calibration frame (master dark)
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Hot threshold as a normalized level
    #[arg(long, conflicts_with_all = ["hot_quantity", "hot_sigma"])]
    hot_level: Option<f64>,

    /// Hot threshold as a pixel count
    #[arg(long, conflicts_with = "hot_sigma")]
    hot_quantity: Option<u64>,

    /// Hot threshold in standard deviations above the mean
    #[arg(long)]
    hot_sigma: Option<f64>,

    /// Cold threshold as a normalized level
    #[arg(long, conflicts_with_all = ["cold_quantity", "cold_sigma"])]
    cold_level: Option<f64>,

    /// Cold threshold as a pixel count
    #[arg(long, conflicts_with = "cold_sigma")]
    cold_quantity: Option<u64>,

    /// Cold threshold in standard deviations below the mean
    #[arg(long)]
    cold_sigma: Option<f64>,

    /// Auto-detect hot pixels with this multiplier
    #[arg(long)]
    auto_hot: Option<f64>,

    /// Auto-detect cold pixels with this multiplier
    #[arg(long)]
    auto_cold: Option<f64>,

    /// Defective line: row:N, col:N, optionally :BEGIN-END
    #[arg(long = "defect", value_parser = commands::parse_defect)]
    defects: Vec<DefectItem>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolarityArg {
    Hot,
    Cold,
}

#[derive(Args)]
struct ThresholdArgs {
    /// Calibration frame
    frame: PathBuf,

    /// Frame is a color-filter mosaic
    #[arg(long)]
    cfa: bool,

    /// Only this polarity
    #[arg(short, long)]
    polarity: Option<PolarityArg>,

    /// Threshold as a normalized level
    #[arg(long, conflicts_with_all = ["quantity", "sigma"])]
    level: Option<f64>,

    /// Threshold as a pixel count
    #[arg(long, conflicts_with = "sigma")]
    quantity: Option<u64>,

    /// Threshold in standard deviations from the mean
    #[arg(long)]
    sigma: Option<f64>,
}

#[derive(Args)]
struct InitArgs {
    /// Where to write the configuration
    #[arg(default_value = "cosmetic.yaml")]
    output: PathBuf,

    /// Replace an existing file
    #[arg(short, long)]
    force: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Run(args) => commands::run::run(args, cli.threads, cli.verbose),
        Commands::Threshold(args) => commands::threshold::run(args),
        Commands::Init(args) => commands::init::run(args),
    }
}
