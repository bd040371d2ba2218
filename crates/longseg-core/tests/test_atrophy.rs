use std::fs;

use longseg_core::atrophy::{pair_dir_name, pair_indices, parse_pbvc, run_pairwise, REPORT_NAME};
use longseg_core::scratch::ScratchDir;
use longseg_core::session::collect_sessions;
use longseg_core::tools::Toolchain;

mod common;

// ---------------------------------------------------------------------------
// Pair selection and report parsing
// ---------------------------------------------------------------------------

#[test]
fn test_adjacent_pairs_plus_first_last() {
    assert_eq!(pair_indices(2), vec![(0, 1)]);
    assert_eq!(pair_indices(3), vec![(0, 1), (1, 2), (0, 2)]);
    assert_eq!(pair_indices(4), vec![(0, 1), (1, 2), (2, 3), (0, 3)]);
}

#[test]
fn test_no_pairs_below_two_timepoints() {
    assert!(pair_indices(0).is_empty());
    assert!(pair_indices(1).is_empty());
}

#[test]
fn test_pbvc_parsed_from_report_text() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join(REPORT_NAME);
    fs::write(&report, "<b>finalPBVC, from VENT to EDGE: -0.42 %</b>").unwrap();
    assert_eq!(parse_pbvc(&report).unwrap(), -0.42);
}

#[test]
fn test_missing_pbvc_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join(REPORT_NAME);
    fs::write(&report, "<html>nothing here</html>").unwrap();
    assert!(parse_pbvc(&report).is_err());
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[test]
fn test_pairwise_runs_once_per_pair() {
    let dir = tempfile::tempdir().unwrap();
    let subject = common::make_subject(dir.path(), "ab12", &["20200101", "20210101"]);
    let derivatives = dir.path().join("derivatives");
    let scratch = ScratchDir::create(&derivatives, "ab12", false).unwrap();
    let sessions = collect_sessions(&subject).unwrap().unwrap();

    let runner = common::FakeRunner::new();
    let toolchain = Toolchain::new("/opt/freesurfer", "/opt/fsl");
    let results = run_pairwise(&runner, &toolchain, &scratch, &derivatives, &sessions).unwrap();

    assert_eq!(runner.tool_calls("siena"), 1);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].ses_a, "20200101");
    assert_eq!(results[0].ses_b, "20210101");
    assert_eq!(results[0].pbvc, -0.42);
    assert!(results[0].report.starts_with(scratch.path()));
}

#[test]
fn test_existing_report_is_not_recomputed() {
    let dir = tempfile::tempdir().unwrap();
    let subject = common::make_subject(dir.path(), "ab12", &["20200101", "20210101"]);
    let derivatives = dir.path().join("derivatives");

    // A previous run already placed the pair report in the derivatives tree.
    let pair_dir = derivatives
        .join("sub-ab12")
        .join(pair_dir_name("20200101", "20210101"));
    fs::create_dir_all(&pair_dir).unwrap();
    fs::write(pair_dir.join(REPORT_NAME), "PBVC: -1.5 %").unwrap();

    let scratch = ScratchDir::create(&derivatives, "ab12", false).unwrap();
    let sessions = collect_sessions(&subject).unwrap().unwrap();

    let runner = common::FakeRunner::new();
    let toolchain = Toolchain::new("/opt/freesurfer", "/opt/fsl");
    let results = run_pairwise(&runner, &toolchain, &scratch, &derivatives, &sessions).unwrap();

    assert_eq!(runner.tool_calls("siena"), 0, "pair must not be recomputed");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].pbvc, -1.5);
    assert!(results[0].report.starts_with(&pair_dir));
}
