use crate::error::Error;
use crate::scheduling::case_result::CaseOutcome;
use crate::scheduling::summary::Summary;

/// Outputs the suite summary into an useful format.
pub fn output(summary: Summary) -> Result<(), Error> {
    log::info!(
        "# suite '{}' run '{}' results #",
        summary.suite_name(),
        summary.run_id()
    );

    for result in summary.results() {
        match result.outcome() {
            CaseOutcome::Passed => log::info!(
                "OK   - case '{}' ({}ms)",
                result.title(),
                result.duration().as_millis()
            ),
            CaseOutcome::Failed(error) => {
                log::info!("FAIL - case '{}' : {}", result.title(), error)
            }
            CaseOutcome::Skipped => log::info!("SKIP - case '{}'", result.title()),
        }
    }

    log::info!(
        "{} passed, {} failed, {} skipped in {}ms",
        summary.passed_count(),
        summary.failed_count(),
        summary.skipped_count(),
        summary.wall_time().as_millis()
    );

    Ok(())
}
