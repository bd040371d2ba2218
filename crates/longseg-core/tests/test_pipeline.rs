use std::fs;
use std::path::Path;
use std::sync::Arc;

use longseg_core::pipeline::{run_cohort, PipelineConfig, SubjectStatus, PIPELINE_NAME};
use longseg_core::session::SkipReason;
use longseg_core::spacing::NormalizeMode;
use longseg_core::stats::TABLE_NAME;

mod common;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn test_config_file_needs_only_the_input_dir() {
    let config: PipelineConfig = toml::from_str(r#"input_dir = "/data/bids""#).unwrap();
    assert_eq!(config.input_dir, Path::new("/data/bids"));
    assert_eq!(config.normalize, NormalizeMode::Off);
    assert!(!config.remove_scratch);
    assert!(config.workers >= 1);
    assert_eq!(
        config.derivatives_dir(),
        Path::new("/data/bids/derivatives").join(PIPELINE_NAME)
    );
}

#[test]
fn test_normalize_mode_is_spelled_snake_case() {
    let config: PipelineConfig =
        toml::from_str("input_dir = \"/d\"\nnormalize = \"fixed\"\n").unwrap();
    assert_eq!(config.normalize, NormalizeMode::Fixed);
}

fn config(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::new(root);
    config.workers = 2;
    config
}

fn assert_subject_derivatives(derivatives: &Path, sub: &str) {
    let subject_dir = derivatives.join(format!("sub-{sub}"));
    assert!(subject_dir.join(format!("sub-{sub}_mean.mgz")).exists());
    assert!(subject_dir
        .join("diff_20200101vs20210101")
        .join("report.html")
        .exists());
    for ses in ["20200101", "20210101"] {
        let anat = subject_dir.join(format!("ses-{ses}")).join("anat");
        let stem = format!("sub-{sub}_ses-{ses}");
        assert!(anat.join(format!("{stem}_space-common_T1w.mgz")).exists());
        assert!(anat.join(format!("{stem}_space-common_FLAIR.mgz")).exists());
        assert!(anat.join(format!("{stem}_space-common_FLAIR.lta")).exists());
        assert!(anat.join(format!("{stem}_seg.mgz")).exists());
        assert!(anat.join(format!("{stem}_samseg.stats")).exists());
        assert!(anat.join(format!("{stem}_sbtiv.stats")).exists());
    }
}

// ---------------------------------------------------------------------------
// Whole-cohort runs
// ---------------------------------------------------------------------------

#[test]
fn test_cohort_run_produces_full_derivatives_tree() {
    let dir = tempfile::tempdir().unwrap();
    common::make_subject(dir.path(), "03", &["20200101", "20210101"]);
    common::make_subject(dir.path(), "04", &["20200101", "20210101"]);

    let config = Arc::new(config(dir.path()));
    let runner = Arc::new(common::FakeRunner::new());
    let mut delivered = 0usize;
    let outcomes = run_cohort(Arc::clone(&config), runner, |_| delivered += 1).unwrap();

    assert_eq!(delivered, 2);
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].subject, "03");
    assert_eq!(outcomes[1].subject, "04");
    for outcome in &outcomes {
        assert!(matches!(
            outcome.status,
            SubjectStatus::Completed { sessions: 2 }
        ));
    }

    let derivatives = dir.path().join("derivatives").join(PIPELINE_NAME);
    assert_subject_derivatives(&derivatives, "03");
    assert_subject_derivatives(&derivatives, "04");
    // Scratch persists unless removal was requested.
    assert!(derivatives.join("sub-03/temp").is_dir());

    let csv = fs::read_to_string(derivatives.join(TABLE_NAME)).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 5, "header plus one row per session");
    assert!(lines[0].starts_with("sub-ID,ses-ID,"));
    assert!(lines[0].contains("PBVC"));
    assert!(lines.iter().any(|l| l.starts_with("04,20210101,")));
}

#[test]
fn test_subject_with_one_timepoint_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    common::make_subject(dir.path(), "03", &["20200101"]);

    let config = Arc::new(config(dir.path()));
    let runner = Arc::new(common::FakeRunner::new());
    let outcomes = run_cohort(config, runner, |_| {}).unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(
        outcomes[0].status,
        SubjectStatus::Skipped(SkipReason::TooFewTimepoints { count: 1, .. })
    ));
}

// ---------------------------------------------------------------------------
// Fault isolation
// ---------------------------------------------------------------------------

#[test]
fn test_one_failing_subject_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    common::make_subject(dir.path(), "03", &["20200101", "20210101"]);
    common::make_subject(dir.path(), "04", &["20200101", "20210101"]);

    let config = Arc::new(config(dir.path()));
    let runner = Arc::new(common::FakeRunner::failing_on("sub-03"));
    let outcomes = run_cohort(Arc::clone(&config), runner, |_| {}).unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(matches!(outcomes[0].status, SubjectStatus::Failed(_)));
    assert!(matches!(
        outcomes[1].status,
        SubjectStatus::Completed { sessions: 2 }
    ));

    // The survivor's tree and the stats table are intact.
    let derivatives = config.derivatives_dir();
    assert_subject_derivatives(&derivatives, "04");
    let csv = fs::read_to_string(derivatives.join(TABLE_NAME)).unwrap();
    assert_eq!(csv.lines().count(), 3, "header plus the survivor's sessions");
}

#[test]
fn test_gate_skipped_subject_leaves_no_scratch() {
    let dir = tempfile::tempdir().unwrap();
    common::make_nifti_subject(
        dir.path(),
        "03",
        &[
            ("20200101", [1.2, 1.2, 1.2], [0.9, 0.9, 1.5]),
            ("20210101", [1.2, 1.2, 1.2], [0.9, 0.9, 1.5]),
        ],
    );

    let mut config = config(dir.path());
    config.normalize = NormalizeMode::Fixed;
    let config = Arc::new(config);
    let runner = Arc::new(common::FakeRunner::new());
    let outcomes = run_cohort(Arc::clone(&config), runner, |_| {}).unwrap();

    assert!(matches!(
        outcomes[0].status,
        SubjectStatus::Skipped(SkipReason::LowResolution { .. })
    ));
    assert!(!config.derivatives_dir().join("sub-03/temp").exists());
}

// ---------------------------------------------------------------------------
// Scratch lifecycle
// ---------------------------------------------------------------------------

#[test]
fn test_scratch_removed_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    common::make_subject(dir.path(), "03", &["20200101", "20210101"]);

    let mut config = config(dir.path());
    config.remove_scratch = true;
    let config = Arc::new(config);
    let runner = Arc::new(common::FakeRunner::new());
    let outcomes = run_cohort(Arc::clone(&config), runner, |_| {}).unwrap();

    assert!(matches!(
        outcomes[0].status,
        SubjectStatus::Completed { .. }
    ));
    assert!(!config.derivatives_dir().join("sub-03/temp").exists());
    assert_subject_derivatives(&config.derivatives_dir(), "03");
}
