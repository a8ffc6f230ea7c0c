use std::time::Duration;

use crate::scheduling::case_result::CaseResult;

/// Deterministic aggregate report of a completed suite run. Entries are
/// ordered by title (registration position breaks ties between duplicate
/// titles), so two runs with identical inputs produce identical output no
/// matter how completion interleaved.
#[derive(Debug)]
pub struct Summary {
    suite_name: String,
    run_id: String,
    wall_time: Duration,
    passed_count: usize,
    failed_count: usize,
    skipped_count: usize,
    results: Vec<CaseResult>,
}

impl Summary {
    pub(crate) fn new(
        suite_name: String,
        run_id: String,
        wall_time: Duration,
        passed_count: usize,
        failed_count: usize,
        skipped_count: usize,
        results: Vec<CaseResult>,
    ) -> Summary {
        Summary {
            suite_name,
            run_id,
            wall_time,
            passed_count,
            failed_count,
            skipped_count,
            results,
        }
    }

    pub fn suite_name(&self) -> &str {
        self.suite_name.as_str()
    }

    pub fn run_id(&self) -> &str {
        self.run_id.as_str()
    }

    pub fn wall_time(&self) -> Duration {
        self.wall_time
    }

    pub fn passed_count(&self) -> usize {
        self.passed_count
    }

    pub fn failed_count(&self) -> usize {
        self.failed_count
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped_count
    }

    pub fn results(&self) -> &[CaseResult] {
        self.results.as_slice()
    }

    pub fn failures(&self) -> Vec<&CaseResult> {
        self.results
            .iter()
            .filter(|result| result.outcome().is_failed())
            .collect()
    }

    pub fn has_any_case_failed(&self) -> bool {
        self.failed_count > 0
    }
}
