//! Pairwise atrophy driver: SIENA percentage brain volume change between
//! timepoint pairs, with idempotent skip of already-computed pairs.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::bids;
use crate::error::{LongsegError, Result};
use crate::exec::{run_checked, ToolRunner};
use crate::scratch::ScratchDir;
use crate::session::SessionScans;
use crate::tools::Toolchain;

/// SIENA report filename inside a pair directory.
pub const REPORT_NAME: &str = "report.html";

/// Result for one ordered timepoint pair.
#[derive(Clone, Debug)]
pub struct PairwiseResult {
    pub ses_a: String,
    pub ses_b: String,
    /// Percentage brain volume change parsed from the report.
    pub pbvc: f64,
    pub report: PathBuf,
}

/// Ordered pairs to compare: every adjacent `(i, i+1)` plus `(first, last)`
/// when not already adjacent.
pub fn pair_indices(timepoints: usize) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize)> = (0..timepoints.saturating_sub(1))
        .map(|i| (i, i + 1))
        .collect();
    if timepoints > 2 {
        pairs.push((0, timepoints - 1));
    }
    pairs
}

/// Pair-specific directory name, e.g. `diff_20200101vs20210101`.
pub fn pair_dir_name(ses_a: &str, ses_b: &str) -> String {
    format!("diff_{ses_a}vs{ses_b}")
}

static PBVC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PBVC[^-0-9]*(-?\d+(?:\.\d+)?)").unwrap());

/// Extract the PBVC scalar from a SIENA `report.html`. A report without a
/// recognizable PBVC figure means the naming convention changed, which is an
/// error rather than a silent zero.
pub fn parse_pbvc(report: &Path) -> Result<f64> {
    let text = std::fs::read_to_string(report)?;
    let caps = PBVC_RE
        .captures(&text)
        .ok_or_else(|| LongsegError::StatsParse {
            path: report.to_path_buf(),
            message: "no PBVC figure found in report".to_string(),
        })?;
    caps[1].parse().map_err(|_| LongsegError::StatsParse {
        path: report.to_path_buf(),
        message: format!("unparseable PBVC value {:?}", &caps[1]),
    })
}

/// Run SIENA over every timepoint pair of one subject, writing each pair
/// into its own scratch subdirectory. A pair whose report already exists in
/// the derivatives tree is not recomputed; its scalar is re-read from the
/// existing report.
pub fn run_pairwise(
    runner: &dyn ToolRunner,
    toolchain: &Toolchain,
    scratch: &ScratchDir,
    derivatives: &Path,
    sessions: &[SessionScans],
) -> Result<Vec<PairwiseResult>> {
    let mut results = Vec::new();
    for (a, b) in pair_indices(sessions.len()) {
        let (first, last) = (&sessions[a], &sessions[b]);
        let dir_name = pair_dir_name(&first.session, &last.session);
        let final_report = bids::subject_dir(derivatives, &first.subject)
            .join(&dir_name)
            .join(REPORT_NAME);

        if final_report.exists() {
            info!(pair = %dir_name, "pairwise report present, skipping");
            match parse_pbvc(&final_report) {
                Ok(pbvc) => results.push(PairwiseResult {
                    ses_a: first.session.clone(),
                    ses_b: last.session.clone(),
                    pbvc,
                    report: final_report,
                }),
                Err(e) => warn!(pair = %dir_name, error = %e, "existing report unreadable"),
            }
            continue;
        }

        let pair_dir = scratch.join(&dir_name);
        std::fs::create_dir_all(&pair_dir)?;
        info!(pair = %dir_name, "computing percentage brain volume change");
        run_checked(runner, &toolchain.siena(&first.t1w, &last.t1w, &pair_dir))?;
        let report = pair_dir.join(REPORT_NAME);
        let pbvc = parse_pbvc(&report)?;
        results.push(PairwiseResult {
            ses_a: first.session.clone(),
            ses_b: last.session.clone(),
            pbvc,
            report,
        });
    }
    Ok(results)
}
