use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use longseg_core::pipeline::PIPELINE_NAME;
use longseg_core::stats::{collect_cohort, TABLE_NAME};

#[derive(Args)]
pub struct StatsArgs {
    /// Folder of the BIDS database
    #[arg(short = 'i', long = "input_directory")]
    pub input_directory: PathBuf,

    /// Destination folder for the cohort stats table
    #[arg(short = 'o', long = "output_directory")]
    pub output_directory: PathBuf,
}

pub fn run(args: &StatsArgs) -> Result<()> {
    let derivatives = args
        .input_directory
        .join("derivatives")
        .join(PIPELINE_NAME);

    let table = collect_cohort(&derivatives)
        .with_context(|| format!("Failed to aggregate stats under {}", derivatives.display()))?;
    if table.is_empty() {
        anyhow::bail!("no segmented sessions found under {}", derivatives.display());
    }

    std::fs::create_dir_all(&args.output_directory)?;
    let output = args.output_directory.join(TABLE_NAME);
    table
        .write_csv(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Wrote {} session row(s), {} column(s) to {}",
        table.rows().len(),
        table.columns().len(),
        output.display()
    );
    Ok(())
}
