//! Voxel-spacing normalization across a subject's timepoints.
//!
//! All timepoints must share a spacing before template registration. Three
//! modes: `Off` copies originals verbatim under canonical names, `Baseline`
//! resamples follow-ups to the baseline spacing, `Fixed` conforms to the
//! acquisition-protocol targets (1 mm isotropic T1w, 0.8984x0.8984x1.5 mm
//! FLAIR) after rejecting too-low-resolution subjects.

use std::fs;
use std::path::{Path, PathBuf};

use nifti::{NiftiObject, ReaderOptions};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bids;
use crate::error::{LongsegError, Result};
use crate::exec::{run_checked, ToolRunner};
use crate::session::{Screened, SessionScans, SkipReason, FLAIR_MARKER, T1W_MARKER};
use crate::tools::Toolchain;

/// Aggregate absolute spacing difference above which a scan is resampled.
pub const SPACING_TOLERANCE_MM: f32 = 0.1;

/// Fixed-target FLAIR spacing (sequence parameters of the acquisition
/// protocol; FLAIR is not isotropic).
pub const FLAIR_TARGET_SPACING: [f32; 3] = [0.8984, 0.8984, 1.5];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMode {
    /// Use originals as-is, copied under canonical names.
    #[default]
    Off,
    /// Resample every follow-up whose spacing differs from the baseline.
    Baseline,
    /// Conform to the fixed acquisition targets.
    Fixed,
}

/// Read the voxel spacing of a NIfTI scan from its header.
pub fn read_spacing(path: &Path) -> Result<[f32; 3]> {
    let object = ReaderOptions::new()
        .read_file(path)
        .map_err(|e| LongsegError::NiftiHeader {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    let pixdim = object.header().pixdim;
    Ok([pixdim[1], pixdim[2], pixdim[3]])
}

/// Whether a scan's spacing differs from the reference by more than the
/// aggregate tolerance.
pub fn needs_resample(spacing: [f32; 3], reference: [f32; 3]) -> bool {
    let aggregate: f32 = spacing
        .iter()
        .zip(reference)
        .map(|(s, r)| (s - r).abs())
        .sum();
    aggregate > SPACING_TOLERANCE_MM
}

/// Spacing-qualified sibling path: `…_T1w.nii.gz` -> `…_res-<tag>_T1w.nii.gz`.
pub fn resampled_path(original: &Path, marker: &str, tag: &str) -> PathBuf {
    let name = original
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = format!("{marker}.nii.gz");
    let replaced = name.replace(&suffix, &format!("res-{tag}_{suffix}"));
    original.with_file_name(replaced)
}

fn min3(v: [f32; 3]) -> f32 {
    v.iter().copied().fold(f32::INFINITY, f32::min)
}

fn max3(v: [f32; 3]) -> f32 {
    v.iter().copied().fold(f32::NEG_INFINITY, f32::max)
}

/// Produce the spacing-consistent working list. Postcondition in every mode:
/// exactly one file per session per modality.
pub fn normalize(
    runner: &dyn ToolRunner,
    toolchain: &Toolchain,
    derivatives: &Path,
    mode: NormalizeMode,
    sessions: Vec<SessionScans>,
) -> Result<Screened<Vec<SessionScans>>> {
    match mode {
        NormalizeMode::Off => copy_canonical(derivatives, sessions).map(Ok),
        NormalizeMode::Baseline => normalize_to_baseline(runner, toolchain, sessions).map(Ok),
        NormalizeMode::Fixed => normalize_to_fixed(runner, toolchain, sessions),
    }
}

/// Off mode: copy each original verbatim into the session's derivatives anat
/// directory under its canonical name.
fn copy_canonical(derivatives: &Path, sessions: Vec<SessionScans>) -> Result<Vec<SessionScans>> {
    let mut out = Vec::with_capacity(sessions.len());
    for scans in sessions {
        let anat = bids::anat_dir(derivatives, &scans.subject, &scans.session);
        fs::create_dir_all(&anat)?;
        let stem = bids::stem(&scans.subject, &scans.session);
        let t1w = anat.join(format!("{stem}_{T1W_MARKER}.nii.gz"));
        let flair = anat.join(format!("{stem}_{FLAIR_MARKER}.nii.gz"));
        fs::copy(&scans.t1w, &t1w)?;
        fs::copy(&scans.flair, &flair)?;
        out.push(SessionScans { t1w, flair, ..scans });
    }
    Ok(out)
}

/// Baseline mode: the first session's spacing is the reference per modality;
/// later sessions outside tolerance are resampled to it.
fn normalize_to_baseline(
    runner: &dyn ToolRunner,
    toolchain: &Toolchain,
    sessions: Vec<SessionScans>,
) -> Result<Vec<SessionScans>> {
    let t1w_reference = read_spacing(&sessions[0].t1w)?;
    let flair_reference = read_spacing(&sessions[0].flair)?;

    let mut out = Vec::with_capacity(sessions.len());
    for (index, scans) in sessions.into_iter().enumerate() {
        if index == 0 {
            out.push(scans);
            continue;
        }
        let t1w = resample_if_needed(runner, toolchain, &scans.t1w, T1W_MARKER, t1w_reference)?;
        let flair =
            resample_if_needed(runner, toolchain, &scans.flair, FLAIR_MARKER, flair_reference)?;
        out.push(SessionScans { t1w, flair, ..scans });
    }
    Ok(out)
}

fn resample_if_needed(
    runner: &dyn ToolRunner,
    toolchain: &Toolchain,
    scan: &Path,
    marker: &str,
    reference: [f32; 3],
) -> Result<PathBuf> {
    let spacing = read_spacing(scan)?;
    if !needs_resample(spacing, reference) {
        return Ok(scan.to_path_buf());
    }
    let output = resampled_path(scan, marker, "common");
    debug!(scan = %scan.display(), ?spacing, ?reference, "resampling to baseline spacing");
    run_checked(
        runner,
        &toolchain.convert_voxel_size(scan, &output, reference),
    )?;
    Ok(output)
}

/// Fixed mode: reject too-low-resolution subjects, then conform T1w to 1 mm
/// isotropic and resample FLAIR to the protocol target.
fn normalize_to_fixed(
    runner: &dyn ToolRunner,
    toolchain: &Toolchain,
    sessions: Vec<SessionScans>,
) -> Result<Screened<Vec<SessionScans>>> {
    let mut t1w_spacings = Vec::with_capacity(sessions.len());
    let mut flair_spacings = Vec::with_capacity(sessions.len());
    for scans in &sessions {
        t1w_spacings.push(read_spacing(&scans.t1w)?);
        flair_spacings.push(read_spacing(&scans.flair)?);
    }

    // Acquisition gates: any timepoint below the resolution floor rejects
    // the whole subject.
    if t1w_spacings.iter().any(|s| max3(*s) > 1.1) {
        return Ok(Err(SkipReason::LowResolution { modality: T1W_MARKER }));
    }
    if flair_spacings
        .iter()
        .any(|s| max3(*s) > 1.6 || min3(*s) > 1.0)
    {
        return Ok(Err(SkipReason::LowResolution {
            modality: FLAIR_MARKER,
        }));
    }

    // Conform all T1w when any timepoint is sampled finer than 0.9 mm.
    let conform_t1w = t1w_spacings.iter().any(|s| min3(*s) < 0.9);

    let mut out = Vec::with_capacity(sessions.len());
    for (scans, flair_spacing) in sessions.into_iter().zip(flair_spacings) {
        let t1w = if conform_t1w {
            let output = resampled_path(&scans.t1w, T1W_MARKER, "conform");
            info!(scan = %scans.t1w.display(), "conforming T1w to 1mm isotropic");
            run_checked(runner, &toolchain.convert_conform(&scans.t1w, &output))?;
            output
        } else {
            scans.t1w.clone()
        };
        let flair = if max3(flair_spacing) < 1.4 {
            let output = resampled_path(&scans.flair, FLAIR_MARKER, "common");
            info!(scan = %scans.flair.display(), "resampling FLAIR to protocol spacing");
            run_checked(
                runner,
                &toolchain.convert_voxel_size(&scans.flair, &output, FLAIR_TARGET_SPACING),
            )?;
            output
        } else {
            scans.flair.clone()
        };
        out.push(SessionScans { t1w, flair, ..scans });
    }
    Ok(Ok(out))
}
