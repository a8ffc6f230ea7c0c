use std::time::Duration;

use crate::error::Error;

#[derive(Clone, Debug)]
pub enum CaseOutcome {
    Passed,
    Failed(Error),
    Skipped,
}

impl CaseOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, CaseOutcome::Passed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CaseOutcome::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, CaseOutcome::Skipped)
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            CaseOutcome::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Terminal record of one case. The index is the case's registration
/// position, kept so duplicate titles stay distinguishable in the summary.
#[derive(Clone, Debug)]
pub struct CaseResult {
    index: usize,
    title: String,
    outcome: CaseOutcome,
    duration: Duration,
}

impl CaseResult {
    pub fn passed(index: usize, title: String, duration: Duration) -> CaseResult {
        CaseResult {
            index,
            title,
            outcome: CaseOutcome::Passed,
            duration,
        }
    }

    pub fn failed(index: usize, title: String, error: Error, duration: Duration) -> CaseResult {
        CaseResult {
            index,
            title,
            outcome: CaseOutcome::Failed(error),
            duration,
        }
    }

    pub fn skipped(index: usize, title: String) -> CaseResult {
        CaseResult {
            index,
            title,
            outcome: CaseOutcome::Skipped,
            duration: Duration::ZERO,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn title(&self) -> &str {
        self.title.as_str()
    }

    pub fn outcome(&self) -> &CaseOutcome {
        &self.outcome
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}
