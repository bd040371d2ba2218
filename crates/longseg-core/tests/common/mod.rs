//! Shared fixtures: a fake tool runner that fabricates expected outputs, and
//! helpers building BIDS trees in temp directories.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use flate2::write::GzEncoder;
use flate2::Compression;
use longseg_core::error::Result;
use longseg_core::exec::{ToolInvocation, ToolOutcome, ToolRunner};

/// Records every invocation and fabricates the files the real tools would
/// produce, so stage drivers can be exercised without FreeSurfer or FSL.
#[derive(Default)]
pub struct FakeRunner {
    pub invocations: Mutex<Vec<ToolInvocation>>,
    /// Report failure (exit code 1) for any invocation whose arguments
    /// contain this substring.
    pub fail_on_arg: Option<String>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(arg: impl Into<String>) -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            fail_on_arg: Some(arg.into()),
        }
    }

    pub fn tool_calls(&self, tool: &str) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.tool == tool)
            .count()
    }
}

impl ToolRunner for FakeRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutcome> {
        self.invocations.lock().unwrap().push(invocation.clone());

        if let Some(ref needle) = self.fail_on_arg {
            if invocation.args.iter().any(|a| a.contains(needle.as_str())) {
                return Ok(ToolOutcome {
                    success: false,
                    code: Some(1),
                    stdout: String::new(),
                    stderr: format!("fake failure on {needle}"),
                });
            }
        }

        match invocation.tool.as_str() {
            "run_samseg_long" => fabricate_samseg_outputs(invocation),
            "siena" => fabricate_siena_report(invocation),
            _ => {
                for output in invocation.resolved_outputs() {
                    touch(&output);
                }
            }
        }

        Ok(ToolOutcome {
            success: true,
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

fn touch(path: &Path) {
    if path.extension().is_none() {
        fs::create_dir_all(path).unwrap();
        return;
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"fake").unwrap();
}

/// One `tpNNN` folder per `--timepoint` argument, each with a segmentation
/// and both stats files.
fn fabricate_samseg_outputs(invocation: &ToolInvocation) {
    let cwd = invocation.cwd.clone().unwrap();
    let timepoints = invocation.args.iter().filter(|a| *a == "--timepoint").count();
    for i in 0..timepoints {
        let tp = cwd.join("output").join(format!("tp{:03}", i + 1));
        fs::create_dir_all(&tp).unwrap();
        fs::write(tp.join("seg.mgz"), b"fake").unwrap();
        fs::write(
            tp.join("samseg.stats"),
            format!(
                "# Measure Left-Thalamus, {}, mm^3\n# Measure Lesions, 1234.0, mm^3\n",
                1000 - i * 20
            ),
        )
        .unwrap();
        fs::write(
            tp.join("sbtiv.stats"),
            format!("# Measure Intra-Cranial, {}, mm^3\n", 1_500_000 - i * 10_000),
        )
        .unwrap();
    }
}

fn fabricate_siena_report(invocation: &ToolInvocation) {
    for output in invocation.resolved_outputs() {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&output, "<b>finalPBVC, from VENT to EDGE: -0.42 %</b>").unwrap();
    }
}

/// Create `<root>/sub-<sub>/ses-<ses>/anat/sub-<sub>_ses-<ses>_{T1w,FLAIR}.nii.gz`
/// for every session.
pub fn make_subject(root: &Path, sub: &str, sessions: &[&str]) -> std::path::PathBuf {
    let subject_dir = root.join(format!("sub-{sub}"));
    for ses in sessions {
        let anat = subject_dir.join(format!("ses-{ses}")).join("anat");
        fs::create_dir_all(&anat).unwrap();
        for modality in ["T1w", "FLAIR"] {
            fs::write(
                anat.join(format!("sub-{sub}_ses-{ses}_{modality}.nii.gz")),
                b"scan",
            )
            .unwrap();
        }
    }
    subject_dir
}

/// Write a minimal single-file NIfTI-1 volume (one uint8 voxel) carrying the
/// given voxel spacing in its header, gzip-compressed.
pub fn write_nifti(path: &Path, spacing: [f32; 3]) {
    let mut header = vec![0u8; 352];
    header[..4].copy_from_slice(&348i32.to_le_bytes());
    let dim: [i16; 8] = [3, 1, 1, 1, 1, 1, 1, 1];
    for (i, d) in dim.iter().enumerate() {
        header[40 + 2 * i..42 + 2 * i].copy_from_slice(&d.to_le_bytes());
    }
    header[70..72].copy_from_slice(&2i16.to_le_bytes()); // uint8
    header[72..74].copy_from_slice(&8i16.to_le_bytes());
    let pixdim: [f32; 8] = [1.0, spacing[0], spacing[1], spacing[2], 0.0, 0.0, 0.0, 0.0];
    for (i, p) in pixdim.iter().enumerate() {
        header[76 + 4 * i..80 + 4 * i].copy_from_slice(&p.to_le_bytes());
    }
    header[108..112].copy_from_slice(&352f32.to_le_bytes()); // vox_offset
    header[344..348].copy_from_slice(b"n+1\0");

    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    encoder.write_all(&header).unwrap();
    encoder.write_all(&[0u8]).unwrap();
    encoder.finish().unwrap();
}

/// Like [`make_subject`], but with real NIfTI scans; each session is
/// `(session, t1w_spacing, flair_spacing)`.
pub fn make_nifti_subject(
    root: &Path,
    sub: &str,
    sessions: &[(&str, [f32; 3], [f32; 3])],
) -> std::path::PathBuf {
    let subject_dir = root.join(format!("sub-{sub}"));
    for (ses, t1w, flair) in sessions {
        let anat = subject_dir.join(format!("ses-{ses}")).join("anat");
        fs::create_dir_all(&anat).unwrap();
        write_nifti(&anat.join(format!("sub-{sub}_ses-{ses}_T1w.nii.gz")), *t1w);
        write_nifti(
            &anat.join(format!("sub-{sub}_ses-{ses}_FLAIR.nii.gz")),
            *flair,
        );
    }
    subject_dir
}
