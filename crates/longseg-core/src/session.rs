//! Timepoint discovery: collecting and validating the per-session scan set
//! of one subject.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::bids;
use crate::error::Result;

/// Scan filename marker of the primary modality.
pub const T1W_MARKER: &str = "T1w";
/// Scan filename marker of the secondary modality.
pub const FLAIR_MARKER: &str = "FLAIR";

/// One imaging session of a subject with exactly one scan per required
/// modality. Replaces the index-aligned T1w/FLAIR parallel lists: index
/// alignment is structural here, not an invariant to maintain by hand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionScans {
    pub subject: String,
    pub session: String,
    pub t1w: PathBuf,
    pub flair: PathBuf,
}

/// Why a subject was rejected before any external tool ran.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Fewer than two scans of one modality; longitudinal comparison needs a
    /// baseline and at least one follow-up.
    TooFewTimepoints { modality: &'static str, count: usize },
    /// Unequal T1w/FLAIR counts, so sorted-order pairing is undefined.
    ModalityMismatch { t1w: usize, flair: usize },
    /// Scan resolution below the acquisition gates (fixed-target mode only).
    LowResolution { modality: &'static str },
    /// Segmentation produced at most one per-timepoint output folder.
    IncompleteLongitudinalRun { timepoints: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewTimepoints { modality, count } => {
                write!(f, "only {count} {modality} scan(s), need at least 2")
            }
            Self::ModalityMismatch { t1w, flair } => {
                write!(f, "unequal modality counts ({t1w} T1w vs {flair} FLAIR)")
            }
            Self::LowResolution { modality } => {
                write!(f, "{modality} resolution below acquisition gates")
            }
            Self::IncompleteLongitudinalRun { timepoints } => {
                write!(f, "segmentation produced {timepoints} timepoint folder(s)")
            }
        }
    }
}

/// Recursively collect all `*<marker>*.nii.gz` files under a subject
/// directory, sorted lexicographically by path.
pub fn collect_modality(subject_dir: &Path, marker: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(subject_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy().into_owned());
            match name {
                Some(n) => n.contains(marker) && n.ends_with(".nii.gz"),
                None => false,
            }
        })
        .collect();
    files.sort();
    files
}

/// Drop originals shadowed by a resampled variant. Re-runs leave
/// `…_res-<tag>_<Mod>.nii.gz` files beside the originals, and the working
/// list must carry exactly one file per session per modality.
pub fn dedup_resampled(files: Vec<PathBuf>, marker: &str) -> Vec<PathBuf> {
    // session -> has a res- variant?
    let mut resampled: BTreeMap<String, bool> = BTreeMap::new();
    for file in &files {
        let name = file.file_name().map(|n| n.to_string_lossy().into_owned());
        let Some(name) = name else { continue };
        if name.contains("res-") && name.contains(marker) {
            resampled.insert(bids::session_id(file), true);
        }
    }
    files
        .into_iter()
        .filter(|file| {
            let name = match file.file_name() {
                Some(n) => n.to_string_lossy().into_owned(),
                None => return false,
            };
            let is_original = !name.contains("res-");
            let shadowed = *resampled
                .get(&bids::session_id(file))
                .unwrap_or(&false);
            !(is_original && shadowed)
        })
        .collect()
}

/// A value that may instead be a per-subject skip decision.
pub type Screened<T> = std::result::Result<T, SkipReason>;

/// Build the validated per-session scan set for one subject, or a skip
/// reason. Modality lists are paired by sorted order; one-to-one
/// correspondence is assumed from the naming convention, not
/// content-verified.
pub fn collect_sessions(subject_dir: &Path) -> Result<Screened<Vec<SessionScans>>> {
    let t1w = dedup_resampled(collect_modality(subject_dir, T1W_MARKER), T1W_MARKER);
    let flair = dedup_resampled(collect_modality(subject_dir, FLAIR_MARKER), FLAIR_MARKER);

    debug!(
        subject = %bids::subject_id(subject_dir),
        t1w = t1w.len(),
        flair = flair.len(),
        "collected timepoints"
    );

    if t1w.len() < 2 {
        return Ok(Err(SkipReason::TooFewTimepoints {
            modality: T1W_MARKER,
            count: t1w.len(),
        }));
    }
    if flair.len() < 2 {
        return Ok(Err(SkipReason::TooFewTimepoints {
            modality: FLAIR_MARKER,
            count: flair.len(),
        }));
    }
    if t1w.len() != flair.len() {
        return Ok(Err(SkipReason::ModalityMismatch {
            t1w: t1w.len(),
            flair: flair.len(),
        }));
    }

    let sessions = t1w
        .into_iter()
        .zip(flair)
        .map(|(t1w, flair)| SessionScans {
            subject: bids::subject_id(&t1w),
            session: bids::session_id(&t1w),
            t1w,
            flair,
        })
        .collect();
    Ok(Ok(sessions))
}
