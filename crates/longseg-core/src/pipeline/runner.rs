//! Cohort runner: static partitioning over a fixed worker pool.

use std::sync::mpsc;
use std::sync::Arc;

use tracing::{info, warn};

use crate::cohort::{discover_subjects, split_shards};
use crate::error::Result;
use crate::exec::ToolRunner;
use crate::stats::{collect_cohort, TABLE_NAME};

use super::config::PipelineConfig;
use super::driver::process_subject;
use super::outcome::{RunSummary, SubjectOutcome};

/// Process the whole cohort. The subject list is partitioned once into one
/// contiguous shard per worker; each worker runs its shard to completion
/// with no work stealing, so subjects map to workers deterministically.
/// Outcomes are delivered to `on_outcome` as they complete and returned
/// sorted by subject at the end, together with the cohort stats table
/// written to the derivatives root.
pub fn run_cohort(
    config: Arc<PipelineConfig>,
    runner: Arc<dyn ToolRunner>,
    mut on_outcome: impl FnMut(&SubjectOutcome),
) -> Result<Vec<SubjectOutcome>> {
    let derivatives = config.derivatives_dir();
    std::fs::create_dir_all(&derivatives)?;

    let subjects = discover_subjects(&config.input_dir)?;
    let workers = config.workers.max(1);
    info!(subjects = subjects.len(), workers, "starting cohort run");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| crate::error::LongsegError::Pipeline(e.to_string()))?;

    let (tx, rx) = mpsc::channel::<SubjectOutcome>();
    for shard in split_shards(&subjects, workers) {
        let tx = tx.clone();
        let config = Arc::clone(&config);
        let runner = Arc::clone(&runner);
        pool.spawn(move || {
            for subject_dir in shard {
                let outcome = process_subject(&config, runner.as_ref(), &subject_dir);
                if tx.send(outcome).is_err() {
                    return;
                }
            }
        });
    }
    drop(tx);

    let mut outcomes = Vec::with_capacity(subjects.len());
    for outcome in rx {
        on_outcome(&outcome);
        outcomes.push(outcome);
    }
    outcomes.sort_by(|a, b| a.subject.cmp(&b.subject));

    let summary = RunSummary::tally(&outcomes);
    info!(
        completed = summary.completed,
        skipped = summary.skipped,
        failed = summary.failed,
        "cohort run finished"
    );

    // Batch aggregation over whatever the run produced.
    let table = collect_cohort(&derivatives)?;
    if table.is_empty() {
        warn!("no segmented sessions found, skipping stats table");
    } else {
        let path = derivatives.join(TABLE_NAME);
        table.write_csv(&path)?;
        info!(rows = table.rows().len(), path = %path.display(), "wrote cohort stats table");
    }

    Ok(outcomes)
}
