use std::fmt;

use crate::session::SkipReason;

/// Per-subject result collected by the driver; replaces the original
/// log-line-only failure reporting.
#[derive(Clone, Debug)]
pub enum SubjectStatus {
    Completed { sessions: usize },
    Skipped(SkipReason),
    Failed(String),
}

impl fmt::Display for SubjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { sessions } => write!(f, "completed ({sessions} timepoints)"),
            Self::Skipped(reason) => write!(f, "skipped: {reason}"),
            Self::Failed(cause) => write!(f, "failed: {cause}"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SubjectOutcome {
    pub subject: String,
    pub status: SubjectStatus,
}

/// End-of-run tally over all subject outcomes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn tally(outcomes: &[SubjectOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome.status {
                SubjectStatus::Completed { .. } => summary.completed += 1,
                SubjectStatus::Skipped(_) => summary.skipped += 1,
                SubjectStatus::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.failed
    }
}
