//! Batch correction command

use crate::RunArgs;
use anyhow::{Context, Result, bail};
use cosmetic_batch::config::{MultiplierConfig, ThresholdConfig};
use cosmetic_batch::{BatchConfig, BatchEvent, BatchRunner, ImageItem, ThresholdSpec};
#[allow(unused_imports)]
use tracing::{debug, info, trace};

fn threshold(level: Option<f64>, quantity: Option<u64>, sigma: Option<f64>) -> Option<ThresholdSpec> {
    level
        .map(ThresholdSpec::Level)
        .or(quantity.map(ThresholdSpec::Quantity))
        .or(sigma.map(ThresholdSpec::Sigma))
}

/// Builds the run configuration: the config file if given, then flags.
fn build_config(args: RunArgs, threads: usize) -> Result<BatchConfig> {
    let mut config = match &args.config {
        Some(path) => BatchConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => BatchConfig::default(),
    };

    if !args.targets.is_empty() {
        config.targets = super::expand_targets(&args.targets)?
            .into_iter()
            .map(ImageItem::new)
            .collect();
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = Some(dir);
    }
    if let Some(prefix) = args.prefix {
        config.prefix = prefix;
    }
    if let Some(postfix) = args.postfix {
        config.postfix = postfix;
    }
    if let Some(ext) = args.extension {
        config.output_extension = ext;
    }
    config.overwrite |= args.overwrite;
    config.cfa |= args.cfa;
    if let Some(amount) = args.amount {
        config.amount = amount;
    }

    if let Some(path) = args.reference {
        config.reference.enabled = true;
        config.reference.path = Some(path);
    }
    if let Some(spec) = threshold(args.hot_level, args.hot_quantity, args.hot_sigma) {
        config.reference.hot = ThresholdConfig::with(spec);
    }
    if let Some(spec) = threshold(args.cold_level, args.cold_quantity, args.cold_sigma) {
        config.reference.cold = ThresholdConfig::with(spec);
    }

    if let Some(k) = args.auto_hot {
        config.auto_detect.enabled = true;
        config.auto_detect.hot = MultiplierConfig::with(k);
    }
    if let Some(k) = args.auto_cold {
        config.auto_detect.enabled = true;
        config.auto_detect.cold = MultiplierConfig::with(k);
    }

    if !args.defects.is_empty() {
        config.defect_list.enabled = true;
        config.defect_list.defects.extend(args.defects);
    }

    if threads > 0 {
        config.threads = threads;
    }
    Ok(config)
}

pub fn run(args: RunArgs, threads: usize, verbose: u8) -> Result<()> {
    trace!(targets = args.targets.len(), config = ?args.config, "run::run");

    let config = build_config(args, threads)?;
    info!(targets = config.targets.len(), threads = config.thread_count(), "Starting cosmetic correction");

    let runner = BatchRunner::new(config);
    let mut observer = |event: &BatchEvent| match event {
        BatchEvent::Written { output, corrected, .. } if verbose > 0 => {
            println!("{} ({} pixels)", output.display(), corrected);
        }
        BatchEvent::TaskFailed { path, index, reason } => {
            eprintln!("Error: {} [{}]: {}", path.display(), index, reason);
        }
        _ => {}
    };
    let report = runner.run_with(&mut observer)?;

    println!("{}", report);
    println!("Total corrected pixels: {}", report.corrected_pixels);

    if report.succeeded == 0 && report.skipped > 0 {
        bail!("No target could be processed");
    }
    Ok(())
}
