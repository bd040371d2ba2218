use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::spacing::NormalizeMode;
use crate::tools::Toolchain;

/// Pipeline name, also the derivatives subdirectory.
pub const PIPELINE_NAME: &str = "samseg-longitudinal-7.3.2";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root of the BIDS database.
    pub input_dir: PathBuf,
    /// Worker count; defaults to available cores minus one.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_freesurfer")]
    pub freesurfer_path: PathBuf,
    #[serde(default = "default_fsl")]
    pub fsl_path: PathBuf,
    #[serde(default)]
    pub normalize: NormalizeMode,
    /// Delete each subject's scratch directory after processing.
    #[serde(default)]
    pub remove_scratch: bool,
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

fn default_freesurfer() -> PathBuf {
    PathBuf::from("/usr/local/freesurfer")
}

fn default_fsl() -> PathBuf {
    PathBuf::from("/usr/local/fsl")
}

impl PipelineConfig {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            workers: default_workers(),
            freesurfer_path: default_freesurfer(),
            fsl_path: default_fsl(),
            normalize: NormalizeMode::default(),
            remove_scratch: false,
        }
    }

    /// Derivatives root owned by this pipeline:
    /// `<input>/derivatives/samseg-longitudinal-7.3.2`.
    pub fn derivatives_dir(&self) -> PathBuf {
        self.input_dir.join("derivatives").join(PIPELINE_NAME)
    }

    pub fn toolchain(&self) -> Toolchain {
        Toolchain::new(&self.freesurfer_path, &self.fsl_path)
    }
}
