//! Output reorganizer: verified moves of every scratch artifact into the
//! BIDS derivatives tree.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::atrophy::PairwiseResult;
use crate::bids;
use crate::error::{LongsegError, Result};
use crate::scratch::ScratchDir;
use crate::session::{Screened, SkipReason};
use crate::stages::{RegisteredSession, TEMPLATE_NAME};

/// Move a file, creating the target directory as needed and verifying the
/// result. A missing source is fatal for the subject; so is a move whose
/// target fails to materialize.
pub fn move_and_check(src: &Path, dest: &Path) -> Result<()> {
    if !src.exists() {
        return Err(LongsegError::MissingSource(src.to_path_buf()));
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(src, dest).is_err() {
        // Cross-device fallback.
        fs::copy(src, dest)?;
        fs::remove_file(src)?;
    }
    if !dest.exists() {
        return Err(LongsegError::MoveFailed {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
        });
    }
    Ok(())
}

fn move_dir(src: &Path, dest: &Path) -> Result<()> {
    if !src.exists() {
        return Err(LongsegError::MissingSource(src.to_path_buf()));
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    // Cross-device fallback, file by file.
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            move_dir(&entry.path(), &target)?;
        } else {
            move_and_check(&entry.path(), &target)?;
        }
    }
    fs::remove_dir_all(src)?;
    if !dest.exists() {
        return Err(LongsegError::MoveFailed {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
        });
    }
    Ok(())
}

/// Per-timepoint output folders (`tp…`) under the scratch output area,
/// sorted so index i matches session i.
pub fn timepoint_folders(output_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut folders = Vec::new();
    for entry in fs::read_dir(output_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir()
            && entry.file_name().to_string_lossy().contains("tp")
        {
            folders.push(entry.path());
        }
    }
    folders.sort();
    Ok(folders)
}

/// Relocate all artifacts of one subject from scratch into the derivatives
/// tree, BIDS-renaming per-timepoint files with their subject and session
/// prefix. Subjects whose segmentation produced at most one timepoint
/// folder are logged and skipped.
pub fn reorganize(
    scratch: &ScratchDir,
    derivatives: &Path,
    registered: &[RegisteredSession],
    pairwise: &[PairwiseResult],
) -> Result<Screened<()>> {
    let subject = &registered[0].scans.subject;
    let subject_dir = bids::subject_dir(derivatives, subject);

    // Subject-level artifacts: mean template and pairwise report folders.
    move_and_check(
        &scratch.join(TEMPLATE_NAME),
        &subject_dir.join(format!("sub-{subject}_{TEMPLATE_NAME}")),
    )?;
    for pair in pairwise {
        // Pairs skipped as already-computed live in the derivatives tree
        // and have nothing to move.
        let Some(pair_dir) = pair.report.parent() else {
            continue;
        };
        if !pair_dir.starts_with(scratch.path()) {
            continue;
        }
        let name = pair_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        move_dir(pair_dir, &subject_dir.join(name))?;
    }

    let folders = timepoint_folders(&scratch.output_dir())?;
    if folders.len() <= 1 {
        warn!(
            subject = %subject,
            timepoints = folders.len(),
            "incomplete longitudinal run, skipping reorganization"
        );
        return Ok(Err(SkipReason::IncompleteLongitudinalRun {
            timepoints: folders.len(),
        }));
    }

    for (session, folder) in registered.iter().zip(&folders) {
        let anat = bids::anat_dir(derivatives, &session.scans.subject, &session.scans.session);
        let stem = bids::stem(&session.scans.subject, &session.scans.session);

        // Registration artifacts keep their names (already BIDS-derived).
        for name in [
            &session.t1w_registered,
            &session.flair_registered,
            &session.flair_transform,
        ] {
            move_and_check(&scratch.join(name), &anat.join(name))?;
        }

        // Segmentation outputs get the subject/session prefix.
        for entry in fs::read_dir(folder)? {
            let entry = entry?;
            let filename = entry.file_name().to_string_lossy().into_owned();
            move_and_check(&entry.path(), &anat.join(format!("{stem}_{filename}")))?;
        }
    }

    info!(subject = %subject, timepoints = folders.len(), "reorganized outputs");
    Ok(Ok(()))
}
