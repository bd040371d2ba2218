use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use longseg_core::cohort::discover_subjects;
use longseg_core::exec::SystemRunner;
use longseg_core::pipeline::config::default_workers;
use longseg_core::pipeline::{run_cohort, PipelineConfig, SubjectStatus};
use longseg_core::spacing::NormalizeMode;

use crate::summary;

#[derive(Args)]
pub struct RunArgs {
    /// Folder of the BIDS database
    #[arg(short = 'i', long = "input_directory")]
    pub input_directory: PathBuf,

    /// Number of parallel workers (default: cores - 1)
    #[arg(short = 'n', long = "number_of_workers")]
    pub number_of_workers: Option<usize>,

    /// Path to FreeSurfer binaries
    #[arg(short = 'f', long = "freesurfer_path")]
    pub freesurfer_path: Option<PathBuf>,

    /// Path to FSL binaries
    #[arg(long = "fsl_path", visible_alias = "fsl")]
    pub fsl_path: Option<PathBuf>,

    /// Conform T1w to 1mm isotropic and FLAIR to the protocol spacing
    #[arg(long, conflicts_with = "convert_voxelsize")]
    pub convert_resolution: bool,

    /// Resample follow-up scans to the baseline voxel spacing
    #[arg(long)]
    pub convert_voxelsize: bool,

    /// Delete each subject's scratch directory after processing
    #[arg(long)]
    pub remove_temp: bool,

    /// Pipeline config file (TOML); command-line options are ignored
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        toml::from_str(&contents).context("Invalid pipeline config")?
    } else {
        build_config_from_args(args)
    };

    summary::print_run_header(&config);

    let subjects = discover_subjects(&config.input_dir)
        .with_context(|| format!("Failed to scan {}", config.input_dir.display()))?;

    let pb = ProgressBar::new(subjects.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:24} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );

    let outcomes = run_cohort(
        Arc::new(config),
        Arc::new(SystemRunner),
        |outcome| {
            pb.set_message(format!("sub-{}", outcome.subject));
            pb.inc(1);
        },
    )?;
    pb.finish_with_message("Done");

    summary::print_outcomes(&outcomes);

    let failed = outcomes
        .iter()
        .filter(|o| matches!(o.status, SubjectStatus::Failed(_)))
        .count();
    if failed > 0 {
        anyhow::bail!("{failed} subject(s) failed");
    }
    Ok(())
}

fn build_config_from_args(args: &RunArgs) -> PipelineConfig {
    let mut config = PipelineConfig::new(&args.input_directory);
    config.workers = args.number_of_workers.unwrap_or_else(default_workers);
    if let Some(ref path) = args.freesurfer_path {
        config.freesurfer_path = path.clone();
    }
    if let Some(ref path) = args.fsl_path {
        config.fsl_path = path.clone();
    }
    config.normalize = if args.convert_resolution {
        NormalizeMode::Fixed
    } else if args.convert_voxelsize {
        NormalizeMode::Baseline
    } else {
        NormalizeMode::Off
    };
    config.remove_scratch = args.remove_temp;
    config
}
