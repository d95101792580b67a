//! Calibration frame threshold readout

use crate::{PolarityArg, ThresholdArgs};
use anyhow::{Context, Result};
use cosmetic_batch::ThresholdSpec;
use cosmetic_batch::config::{DEFAULT_COLD_LEVEL, DEFAULT_HOT_LEVEL};
use cosmetic_batch::reference::load_calibration;
use cosmetic_ops::{FrameStatistics, Polarity, ThresholdSummary};
use tracing::trace;

fn polarities(arg: Option<PolarityArg>) -> Vec<Polarity> {
    match arg {
        Some(PolarityArg::Hot) => vec![Polarity::Hot],
        Some(PolarityArg::Cold) => vec![Polarity::Cold],
        None => vec![Polarity::Hot, Polarity::Cold],
    }
}

fn spec(args: &ThresholdArgs, polarity: Polarity) -> ThresholdSpec {
    let fallback = match polarity {
        Polarity::Hot => DEFAULT_HOT_LEVEL,
        Polarity::Cold => DEFAULT_COLD_LEVEL,
    };
    args.level
        .map(ThresholdSpec::Level)
        .or(args.quantity.map(ThresholdSpec::Quantity))
        .or(args.sigma.map(ThresholdSpec::Sigma))
        .unwrap_or(ThresholdSpec::Level(fallback))
}

/// Summaries of the requested threshold for each polarity.
pub fn summaries(args: &ThresholdArgs, stats: &FrameStatistics) -> Vec<ThresholdSummary> {
    polarities(args.polarity)
        .into_iter()
        .map(|p| ThresholdSummary::from_level(spec(args, p).resolve(p, stats), p, stats))
        .collect()
}

pub fn run(args: ThresholdArgs) -> Result<()> {
    trace!(frame = %args.frame.display(), "threshold::run");

    let codec = cosmetic_io::codec_for_path(&args.frame)
        .with_context(|| format!("Unsupported file: {}", args.frame.display()))?;
    let frame = load_calibration(codec.as_ref(), &args.frame)?;
    let stats = FrameStatistics::compute(&frame, args.cfa);

    println!(
        "{}: {}x{}, {} channel(s)",
        args.frame.display(),
        frame.width(),
        frame.height(),
        frame.channels()
    );
    println!("  Mean:    {:.10}", stats.mean());
    println!("  StdDev:  {:.10}", stats.std_dev());
    println!("  Levels:  {}..{}", stats.min_level(), stats.max_level());
    for summary in summaries(&args, &stats) {
        println!("  {:<5}{}", summary.polarity, summary);
    }
    Ok(())
}
