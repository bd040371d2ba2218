//! Invocation builders for the FreeSurfer and FSL command-line tools the
//! pipeline orchestrates.

use std::path::{Path, PathBuf};

use crate::exec::ToolInvocation;

/// Threads handed to `run_samseg_long`.
pub const SAMSEG_THREADS: u32 = 4;
/// Lesion mask pattern across timepoints (`--lesion-mask-pattern`).
pub const LESION_MASK_PATTERN: [u32; 2] = [0, 1];
/// BET options passed to SIENA.
pub const SIENA_BET_OPTS: &str = "-f 0.2 -B";

/// Locations of the external toolchains; every invocation gets its
/// environment prepared from these.
#[derive(Clone, Debug)]
pub struct Toolchain {
    pub freesurfer_home: PathBuf,
    pub fsl_dir: PathBuf,
}

impl Toolchain {
    pub fn new(freesurfer_home: impl Into<PathBuf>, fsl_dir: impl Into<PathBuf>) -> Self {
        Self {
            freesurfer_home: freesurfer_home.into(),
            fsl_dir: fsl_dir.into(),
        }
    }

    fn freesurfer(&self, tool: &str) -> ToolInvocation {
        ToolInvocation::new(tool, self.freesurfer_home.join("bin").join(tool))
            .env("FREESURFER_HOME", self.freesurfer_home.display().to_string())
    }

    fn fsl(&self, tool: &str) -> ToolInvocation {
        let bin = self.fsl_dir.join("bin");
        ToolInvocation::new(tool, bin.join(tool))
            .env("FSLDIR", self.fsl_dir.display().to_string())
            .env("FSLOUTPUTTYPE", "NIFTI_GZ")
            .env(
                "PATH",
                format!(
                    "{}:{}",
                    bin.display(),
                    std::env::var("PATH").unwrap_or_default()
                ),
            )
    }

    /// `mri_convert --conform`: resample to 1 mm isotropic.
    pub fn convert_conform(&self, input: &Path, output: &Path) -> ToolInvocation {
        self.freesurfer("mri_convert")
            .arg(input.display().to_string())
            .arg(output.display().to_string())
            .arg("--conform")
            .expect_output(output)
    }

    /// `mri_convert -vs`: resample to an explicit voxel spacing.
    pub fn convert_voxel_size(
        &self,
        input: &Path,
        output: &Path,
        spacing: [f32; 3],
    ) -> ToolInvocation {
        self.freesurfer("mri_convert")
            .arg("-vs")
            .args(spacing.iter().map(|v| v.to_string()))
            .args(["-it", "nii", "-ot", "nii"])
            .arg(input.display().to_string())
            .arg(output.display().to_string())
            .expect_output(output)
    }

    /// `mri_robust_template`: build the subject mean template and map every
    /// timepoint's T1w into its space. Registered names are relative to the
    /// scratch directory.
    pub fn robust_template(
        &self,
        scratch: &Path,
        t1w: &[PathBuf],
        template_name: &str,
        registered: &[String],
    ) -> ToolInvocation {
        let mut invocation = self
            .freesurfer("mri_robust_template")
            .cwd(scratch)
            .arg("--mov")
            .args(t1w.iter().map(|p| p.display().to_string()))
            .arg("--template")
            .arg(template_name)
            .arg("--satit")
            .arg("--mapmov")
            .args(registered.iter().cloned())
            .expect_output(template_name);
        for name in registered {
            invocation = invocation.expect_output(name);
        }
        invocation
    }

    /// `mri_coreg`: compute the FLAIR-to-registered-T1w transform.
    pub fn coreg(&self, scratch: &Path, flair: &Path, reference: &str, transform: &str) -> ToolInvocation {
        self.freesurfer("mri_coreg")
            .cwd(scratch)
            .args(["--mov", &flair.display().to_string()])
            .args(["--ref", reference])
            .args(["--reg", transform])
            .expect_output(transform)
    }

    /// `mri_vol2vol`: apply a transform, producing the registered FLAIR.
    pub fn vol2vol(
        &self,
        scratch: &Path,
        flair: &Path,
        transform: &str,
        output: &str,
        target: &str,
    ) -> ToolInvocation {
        self.freesurfer("mri_vol2vol")
            .cwd(scratch)
            .args(["--mov", &flair.display().to_string()])
            .args(["--reg", transform])
            .args(["--o", output])
            .args(["--targ", target])
            .expect_output(output)
    }

    /// `run_samseg_long`: longitudinal segmentation over all timepoints'
    /// registered (T1w, FLAIR) pairs, writing per-timepoint folders under
    /// `output/`.
    pub fn samseg_long(&self, scratch: &Path, timepoints: &[(String, String)]) -> ToolInvocation {
        let mut invocation = self.freesurfer("run_samseg_long").cwd(scratch);
        for (t1w, flair) in timepoints {
            invocation = invocation.arg("--timepoint").arg(t1w).arg(flair);
        }
        invocation
            .args(["--threads", &SAMSEG_THREADS.to_string()])
            .arg("--pallidum-separate")
            .arg("--lesion")
            .arg("--lesion-mask-pattern")
            .args(LESION_MASK_PATTERN.iter().map(|v| v.to_string()))
            .args(["-o", "output/"])
            .expect_output("output")
    }

    /// FSL `siena`: percentage brain volume change between two timepoints.
    pub fn siena(&self, first: &Path, last: &Path, out_dir: &Path) -> ToolInvocation {
        self.fsl("siena")
            .arg(first.display().to_string())
            .arg(last.display().to_string())
            .args(["-o", &out_dir.display().to_string()])
            .args(["-B", SIENA_BET_OPTS])
            .expect_output(out_dir.join("report.html"))
    }
}
