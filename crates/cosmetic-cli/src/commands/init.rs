//! Default configuration writer

use crate::InitArgs;
use anyhow::{Context, Result, bail};
use cosmetic_batch::BatchConfig;
use tracing::info;

pub fn run(args: InitArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        bail!("{} already exists (use --force to replace it)", args.output.display());
    }
    BatchConfig::default()
        .save(&args.output)
        .with_context(|| format!("Failed to write: {}", args.output.display()))?;
    info!(path = %args.output.display(), "Wrote default configuration");
    println!("Wrote {}", args.output.display());
    Ok(())
}
