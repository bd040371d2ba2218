//! Registration and segmentation stage driver.
//!
//! Strict per-subject sequence inside the scratch directory: template
//! registration over all T1w scans, per-timepoint FLAIR coregistration,
//! then one longitudinal segmentation over all registered pairs. Every
//! step is an external operation checked through [`crate::exec`].

use std::fs;
use std::path::Path;

use tracing::info;

use crate::bids;
use crate::error::Result;
use crate::exec::{run_checked, ToolRunner};
use crate::scratch::ScratchDir;
use crate::session::SessionScans;
use crate::tools::Toolchain;

/// Name of the subject mean template produced by registration.
pub const TEMPLATE_NAME: &str = "mean.mgz";

/// One session's registration artifacts, named deterministically from the
/// working-list filename by suffix substitution (never from a counter).
/// Names are relative to the scratch directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisteredSession {
    pub scans: SessionScans,
    /// Registered-to-template T1w (`…space-common_T1w.mgz`).
    pub t1w_registered: String,
    /// FLAIR-to-T1w transform (`…space-common_FLAIR.lta`).
    pub flair_transform: String,
    /// Registered FLAIR in the template frame (`…space-common_FLAIR.mgz`).
    pub flair_registered: String,
}

fn substitute(path: &Path, from: &str, to: &str) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().replace(from, to))
        .unwrap_or_default()
}

/// Derive the registration artifact names for one session.
pub fn registration_names(scans: SessionScans) -> RegisteredSession {
    let t1w_registered = substitute(&scans.t1w, "T1w.nii.gz", "space-common_T1w.mgz");
    let flair_transform = substitute(&scans.flair, "FLAIR.nii.gz", "space-common_FLAIR.lta");
    let flair_registered = substitute(&scans.flair, "FLAIR.nii.gz", "space-common_FLAIR.mgz");
    RegisteredSession {
        scans,
        t1w_registered,
        flair_transform,
        flair_registered,
    }
}

/// Run the full registration/segmentation sequence for one subject.
pub fn run_stages(
    runner: &dyn ToolRunner,
    toolchain: &Toolchain,
    scratch: &ScratchDir,
    derivatives: &Path,
    sessions: Vec<SessionScans>,
) -> Result<Vec<RegisteredSession>> {
    let registered: Vec<RegisteredSession> =
        sessions.into_iter().map(registration_names).collect();

    // 1. Template registration: mean template plus one registered T1w per
    //    timepoint.
    let t1w_inputs: Vec<_> = registered.iter().map(|r| r.scans.t1w.clone()).collect();
    let t1w_names: Vec<_> = registered.iter().map(|r| r.t1w_registered.clone()).collect();
    info!(
        subject = %registered[0].scans.subject,
        timepoints = registered.len(),
        "template registration"
    );
    run_checked(
        runner,
        &toolchain.robust_template(scratch.path(), &t1w_inputs, TEMPLATE_NAME, &t1w_names),
    )?;

    // 2. Coregister each FLAIR to its registered T1w and resample it into
    //    the template frame. The session's derivatives anat dir is created
    //    here, ahead of reorganization.
    for session in &registered {
        run_checked(
            runner,
            &toolchain.coreg(
                scratch.path(),
                &session.scans.flair,
                &session.t1w_registered,
                &session.flair_transform,
            ),
        )?;
        run_checked(
            runner,
            &toolchain.vol2vol(
                scratch.path(),
                &session.scans.flair,
                &session.flair_transform,
                &session.flair_registered,
                &session.t1w_registered,
            ),
        )?;
        fs::create_dir_all(bids::anat_dir(
            derivatives,
            &session.scans.subject,
            &session.scans.session,
        ))?;
    }

    // 3. Longitudinal segmentation over all registered pairs.
    let timepoints: Vec<(String, String)> = registered
        .iter()
        .map(|r| (r.t1w_registered.clone(), r.flair_registered.clone()))
        .collect();
    info!(subject = %registered[0].scans.subject, "longitudinal segmentation");
    run_checked(runner, &toolchain.samseg_long(scratch.path(), &timepoints))?;

    Ok(registered)
}
