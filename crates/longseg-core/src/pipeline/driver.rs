//! Per-subject pipeline driver and isolation boundary.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use tracing::{error, info, info_span};

use crate::atrophy::run_pairwise;
use crate::bids;
use crate::error::Result;
use crate::exec::ToolRunner;
use crate::reorg::reorganize;
use crate::scratch::ScratchDir;
use crate::session::{collect_sessions, Screened};
use crate::spacing::normalize;
use crate::stages::run_stages;

use super::config::PipelineConfig;
use super::outcome::{SubjectOutcome, SubjectStatus};

/// Run the whole pipeline for one subject. Any error, and any panic, aborts
/// only this subject; the caller proceeds with its next one.
pub fn process_subject(
    config: &PipelineConfig,
    runner: &dyn ToolRunner,
    subject_dir: &Path,
) -> SubjectOutcome {
    let mut subject = bids::subject_id(subject_dir);
    if subject.is_empty() {
        // Resolver silent-failure signal; fall back to the directory name
        // for reporting.
        subject = subject_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
    let span = info_span!("subject", id = %subject);
    let _guard = span.enter();

    let result = catch_unwind(AssertUnwindSafe(|| {
        run_subject_stages(config, runner, subject_dir)
    }));
    let status = match result {
        Ok(Ok(Ok(sessions))) => {
            info!(timepoints = sessions, "subject complete");
            SubjectStatus::Completed { sessions }
        }
        Ok(Ok(Err(reason))) => {
            info!(%reason, "subject skipped");
            SubjectStatus::Skipped(reason)
        }
        Ok(Err(e)) => {
            error!(error = %e, "subject failed, proceeding with next");
            SubjectStatus::Failed(e.to_string())
        }
        Err(panic) => {
            let cause = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic in subject pipeline".to_string());
            error!(cause = %cause, "subject panicked, proceeding with next");
            SubjectStatus::Failed(cause)
        }
    };
    SubjectOutcome { subject, status }
}

fn run_subject_stages(
    config: &PipelineConfig,
    runner: &dyn ToolRunner,
    subject_dir: &Path,
) -> Result<Screened<usize>> {
    let derivatives = config.derivatives_dir();
    let toolchain = config.toolchain();

    let sessions = match collect_sessions(subject_dir)? {
        Ok(sessions) => sessions,
        Err(reason) => return Ok(Err(reason)),
    };
    let subject = sessions[0].subject.clone();

    let sessions = match normalize(runner, &toolchain, &derivatives, config.normalize, sessions)? {
        Ok(sessions) => sessions,
        Err(reason) => return Ok(Err(reason)),
    };

    // Scratch is created only once all screening has passed, so skipped
    // subjects leave no tree behind; on success it is removed explicitly
    // with verification.
    let scratch = ScratchDir::create(&derivatives, &subject, config.remove_scratch)?;

    let registered = run_stages(runner, &toolchain, &scratch, &derivatives, sessions)?;
    let working: Vec<_> = registered.iter().map(|r| r.scans.clone()).collect();

    let pairwise = run_pairwise(runner, &toolchain, &scratch, &derivatives, &working)?;

    if let Err(reason) = reorganize(&scratch, &derivatives, &registered, &pairwise)? {
        return Ok(Err(reason));
    }

    if config.remove_scratch {
        scratch.remove()?;
    }
    Ok(Ok(registered.len()))
}
