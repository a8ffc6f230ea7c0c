use std::time::Duration;

use crate::scheduling::case_result::{CaseOutcome, CaseResult};
use crate::scheduling::summary::Summary;

/// Aggregates case results into a Summary. Pure: given the same results the
/// output is identical regardless of the order they arrived in.
pub fn summarize(
    suite_name: String,
    run_id: String,
    wall_time: Duration,
    mut results: Vec<CaseResult>,
) -> Summary {
    results.sort_by(|a, b| {
        a.title()
            .cmp(b.title())
            .then_with(|| a.index().cmp(&b.index()))
    });

    let mut passed_count = 0;
    let mut failed_count = 0;
    let mut skipped_count = 0;

    for result in results.as_slice() {
        match result.outcome() {
            CaseOutcome::Passed => passed_count += 1,
            CaseOutcome::Failed(_) => failed_count += 1,
            CaseOutcome::Skipped => skipped_count += 1,
        }
    }

    Summary::new(
        suite_name,
        run_id,
        wall_time,
        passed_count,
        failed_count,
        skipped_count,
        results,
    )
}
