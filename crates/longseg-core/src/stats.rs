//! Per-session statistics parsing and cohort-level aggregation.
//!
//! SAMSEG writes two scalar-statistics files per segmented session
//! (`…_samseg.stats`, `…_sbtiv.stats`) of `# Measure <label>, <value>,
//! <unit>` lines. Rows are pivoted into one record per (subject, session)
//! and concatenated across the cohort with a column-union schema; nothing
//! here writes into the per-session files, so aggregation is safe to re-run
//! at any time.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::atrophy::{self, REPORT_NAME};
use crate::bids;
use crate::error::{LongsegError, Result};

/// Label prefix stripped when pivoting.
const MEASURE_PREFIX: &str = "# Measure ";

/// Cohort table filename.
pub const TABLE_NAME: &str = "volume_stats.csv";

/// Column under which the pairwise change metric is merged.
pub const PBVC_COLUMN: &str = "PBVC";

/// Parse one stats file into `(label, value)` pairs, stripping the
/// `# Measure ` prefix. Units are dropped at this point.
pub fn parse_stats_file(path: &Path) -> Result<Vec<(String, f64)>> {
    let text = std::fs::read_to_string(path)?;
    let mut measures = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.splitn(3, ',');
        let label = fields.next().unwrap_or_default().trim();
        let value = fields.next().ok_or_else(|| LongsegError::StatsParse {
            path: path.to_path_buf(),
            message: format!("no value field in line {line:?}"),
        })?;
        let label = label.strip_prefix(MEASURE_PREFIX).unwrap_or(label);
        let value: f64 = value.trim().parse().map_err(|_| LongsegError::StatsParse {
            path: path.to_path_buf(),
            message: format!("unparseable value in line {line:?}"),
        })?;
        measures.push((label.to_string(), value));
    }
    Ok(measures)
}

/// One cohort-table row.
#[derive(Clone, Debug, Default)]
pub struct StatsRow {
    pub subject: String,
    pub session: String,
    pub values: BTreeMap<String, f64>,
}

/// Dynamic-schema cohort table: one row per (subject, session), columns the
/// union of all labels encountered.
#[derive(Clone, Debug, Default)]
pub struct CohortTable {
    rows: Vec<StatsRow>,
}

impl CohortTable {
    pub fn push(&mut self, row: StatsRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[StatsRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Union of statistic names across all rows, sorted.
    pub fn columns(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .rows
            .iter()
            .flat_map(|r| r.values.keys().map(String::as_str))
            .collect();
        set.into_iter().map(String::from).collect()
    }

    /// Write the table as delimited text; absent values stay empty.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let columns = self.columns();
        let mut writer = csv::Writer::from_path(path)?;
        let mut header = vec!["sub-ID".to_string(), "ses-ID".to_string()];
        header.extend(columns.iter().cloned());
        writer.write_record(&header)?;
        for row in &self.rows {
            let mut record = vec![row.subject.clone(), row.session.clone()];
            for column in &columns {
                record.push(
                    row.values
                        .get(column)
                        .map(|v| v.to_string())
                        .unwrap_or_default(),
                );
            }
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Read and merge both stats files of one segmented session.
pub fn session_row(derivatives: &Path, subject: &str, session: &str) -> Result<StatsRow> {
    let anat = bids::anat_dir(derivatives, subject, session);
    let stem = bids::stem(subject, session);
    let mut values = BTreeMap::new();
    for suffix in ["samseg.stats", "sbtiv.stats"] {
        for (label, value) in parse_stats_file(&anat.join(format!("{stem}_{suffix}")))? {
            values.insert(label, value);
        }
    }
    Ok(StatsRow {
        subject: subject.to_string(),
        session: session.to_string(),
        values,
    })
}

/// All successfully segmented (subject, session) pairs under a derivatives
/// tree, identified by their `*_seg.mgz` file, sorted.
pub fn segmented_sessions(derivatives: &Path) -> Vec<(String, String)> {
    let mut segs: Vec<PathBuf> = WalkDir::new(derivatives)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().ends_with("_seg.mgz"))
                .unwrap_or(false)
        })
        .collect();
    segs.sort();
    segs.iter()
        .map(|p| (bids::subject_id(p), bids::session_id(p)))
        .collect()
}

/// Build the cohort table from a derivatives tree: one row per segmented
/// session, with the PBVC of each session relative to its predecessor
/// merged from the pairwise report directories.
pub fn collect_cohort(derivatives: &Path) -> Result<CohortTable> {
    let mut table = CohortTable::default();
    let mut previous: Option<(String, String)> = None;
    for (subject, session) in segmented_sessions(derivatives) {
        let mut row = session_row(derivatives, &subject, &session)?;
        if let Some((prev_subject, prev_session)) = &previous {
            if *prev_subject == subject {
                let report = bids::subject_dir(derivatives, &subject)
                    .join(atrophy::pair_dir_name(prev_session, &session))
                    .join(REPORT_NAME);
                if report.exists() {
                    // An unreadable report costs this row its PBVC cell, not
                    // the whole cohort table.
                    match atrophy::parse_pbvc(&report) {
                        Ok(pbvc) => {
                            row.values.insert(PBVC_COLUMN.to_string(), pbvc);
                        }
                        Err(e) => warn!(
                            report = %report.display(),
                            error = %e,
                            "pair report unreadable, leaving PBVC empty"
                        ),
                    }
                }
            }
        }
        debug!(subject = %subject, session = %session, columns = row.values.len(), "stats row");
        previous = Some((subject, session));
        table.push(row);
    }
    Ok(table)
}
