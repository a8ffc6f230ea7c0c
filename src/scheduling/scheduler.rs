use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{Error, ErrorKind};
use crate::scheduling::case::SuppressionTag;
use crate::scheduling::case_result::CaseResult;
use crate::scheduling::reporter;
use crate::scheduling::run_instance::RunInstance;
use crate::scheduling::suite::Suite;
use crate::scheduling::summary::Summary;

const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// How long in-flight cases get to settle after the suite deadline before
/// their tasks are abandoned.
const TIMEOUT_GRACE: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    timeout: Option<Duration>,
    max_concurrency: Option<usize>,
}

impl RunOptions {
    pub fn new() -> RunOptions {
        RunOptions::default()
    }

    /// Overrides the suite's own timeout budget.
    pub fn with_timeout(mut self, timeout: Duration) -> RunOptions {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> RunOptions {
        self.max_concurrency = Some(max_concurrency);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn max_concurrency(&self) -> Option<usize> {
        self.max_concurrency
    }
}

/// Executes a suite's cases, respecting suppression tags and the suite
/// timeout budget, maximizing concurrency where safe.
///
/// Untagged cases form a free pool bounded by the in-flight cap. Each
/// suppression tag gets its own ordered queue, drained by a single dedicated
/// worker, so two cases sharing a tag can never overlap. Lane workers draw
/// from the same permit pool, keeping the cap global.
pub struct ParallelScheduler {
    options: RunOptions,
    summary_sender: Sender<Summary>,
}

impl ParallelScheduler {
    pub fn new(options: RunOptions, summary_sender: Sender<Summary>) -> ParallelScheduler {
        ParallelScheduler {
            options,
            summary_sender,
        }
    }

    /// Executes the given suite and then proceeds to send a Summary through
    /// the summary sender. Error is returned for configuration and runtime
    /// faults instead of case related ones: per-case failures and timeouts
    /// are captured into the Summary, never thrown.
    pub async fn execute(&mut self, suite: Suite) -> Result<(), Error> {
        self.validate(&suite)?;

        let run_id = uuid::Uuid::new_v4().to_string();
        let suite_name = suite.name().to_string();
        let timeout = self.options.timeout().unwrap_or(suite.timeout());
        let max_concurrency = self.max_concurrency();
        let total = suite.case_count();
        let titles: Vec<String> = suite
            .cases()
            .iter()
            .map(|case| case.title().to_string())
            .collect();

        log::info!(
            "# suite '{}' run '{}' started: {} cases, {} max in-flight #",
            suite_name,
            run_id,
            total,
            max_concurrency
        );

        let started = Instant::now();
        let deadline = started + timeout;

        let (result_sender, mut result_receiver) = mpsc::channel::<CaseResult>(total.max(1));
        let mut collected: Vec<Option<CaseResult>> = Vec::with_capacity(total);
        collected.resize_with(total, || None);

        let mut remaining = 0;
        let mut free = Vec::new();
        let mut lanes = BTreeMap::new();

        for (index, case) in suite.into_cases().into_iter().enumerate() {
            if case.skip() {
                log::info!("case '{}' skipped", case.title());
                collected[index] = Some(CaseResult::skipped(index, case.title().to_string()));
                continue;
            }

            remaining += 1;
            let tag = case.suppression_tag().cloned();
            let instance = RunInstance::new(index, case, result_sender.clone());

            match tag {
                Some(tag) => lanes
                    .entry(tag)
                    .or_insert_with(Vec::new)
                    .push(instance),
                None => free.push(instance),
            }
        }

        drop(result_sender);

        let semaphore = Arc::new(Semaphore::new(max_concurrency));
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(free.len() + lanes.len());

        for instance in free {
            handles.push(ParallelScheduler::dispatch_free(
                instance,
                semaphore.clone(),
                cancelled.clone(),
            ));
        }

        for (tag, queue) in lanes {
            handles.push(ParallelScheduler::dispatch_lane(
                tag,
                queue,
                semaphore.clone(),
                cancelled.clone(),
            ));
        }

        let timed_out = ParallelScheduler::collect_until(
            &mut result_receiver,
            &mut collected,
            &mut remaining,
            deadline,
        )
        .await;

        if timed_out {
            log::warn!(
                "suite '{}' exceeded its budget of {}ms, abandoning unfinished cases",
                suite_name,
                timeout.as_millis()
            );

            cancelled.store(true, Ordering::Release);
            ParallelScheduler::collect_until(
                &mut result_receiver,
                &mut collected,
                &mut remaining,
                Instant::now() + TIMEOUT_GRACE,
            )
            .await;

            for handle in handles.as_slice() {
                handle.abort();
            }
        }

        for handle in handles {
            let _ = handle.await;
        }

        let wall_time = started.elapsed();
        let results = collected
            .into_iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Some(result) => result,
                None => CaseResult::failed(
                    index,
                    titles[index].clone(),
                    ParallelScheduler::unfinished_case_error(timed_out, timeout),
                    Duration::ZERO,
                ),
            })
            .collect();

        let summary = reporter::summarize(suite_name, run_id, wall_time, results);

        match self.summary_sender.send(summary).await {
            Ok(_) => Ok(()),
            Err(error) => Err(Error::new(
                ErrorKind::InternalFailure,
                format!("failed to send suite summary: {}", error),
            )),
        }
    }

    fn validate(&self, suite: &Suite) -> Result<(), Error> {
        if suite.name().is_empty() {
            return Err(Error::new(
                ErrorKind::ConfigurationFailure,
                "suite name must not be empty",
            ));
        }

        if self.options.timeout().unwrap_or(suite.timeout()).is_zero() {
            return Err(Error::new(
                ErrorKind::ConfigurationFailure,
                "suite timeout budget must be greater than zero",
            ));
        }

        if let Some(0) = self.options.max_concurrency() {
            return Err(Error::new(
                ErrorKind::ConfigurationFailure,
                "max concurrency must be greater than zero",
            ));
        }

        for (index, case) in suite.cases().iter().enumerate() {
            if case.title().is_empty() {
                return Err(Error::new(
                    ErrorKind::ConfigurationFailure,
                    format!("case at position {} has an empty title", index),
                ));
            }
        }

        Ok(())
    }

    fn max_concurrency(&self) -> usize {
        match self.options.max_concurrency() {
            Some(max_concurrency) => max_concurrency,
            None => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(DEFAULT_MAX_CONCURRENCY),
        }
    }

    fn dispatch_free(
        instance: RunInstance,
        semaphore: Arc<Semaphore>,
        cancelled: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            if cancelled.load(Ordering::Acquire) {
                return;
            }

            let title = instance.title().to_string();

            match instance.run().await {
                Ok(()) => log::info!("case '{}' run instance finished", title),
                Err(error) => log::error!("case '{}' run instance failed: {}", title, error),
            }
        })
    }

    fn dispatch_lane(
        tag: SuppressionTag,
        queue: Vec<RunInstance>,
        semaphore: Arc<Semaphore>,
        cancelled: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            for instance in queue {
                if cancelled.load(Ordering::Acquire) {
                    break;
                }

                let _permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                if cancelled.load(Ordering::Acquire) {
                    break;
                }

                let title = instance.title().to_string();

                match instance.run().await {
                    Ok(()) => log::info!("[{}] case '{}' run instance finished", tag, title),
                    Err(error) => {
                        log::error!("[{}] case '{}' run instance failed: {}", tag, title, error)
                    }
                }
            }
        })
    }

    /// Drains results until every pending case reported or the deadline
    /// passed. Returns whether the deadline was hit.
    async fn collect_until(
        result_receiver: &mut Receiver<CaseResult>,
        collected: &mut [Option<CaseResult>],
        remaining: &mut usize,
        deadline: Instant,
    ) -> bool {
        while *remaining > 0 {
            match tokio::time::timeout_at(deadline, result_receiver.recv()).await {
                Ok(Some(result)) => {
                    let index = result.index();

                    if collected[index].is_none() {
                        *remaining -= 1;
                    }

                    collected[index] = Some(result);
                }
                Ok(None) => break,
                Err(_) => return true,
            }
        }

        false
    }

    fn unfinished_case_error(timed_out: bool, timeout: Duration) -> Error {
        if timed_out {
            Error::new(
                ErrorKind::TimeoutFailure,
                format!(
                    "case did not complete within the suite budget of {}ms",
                    timeout.as_millis()
                ),
            )
        } else {
            Error::new(
                ErrorKind::InternalFailure,
                "case result channel closed before the case reported",
            )
        }
    }
}

/// Sole entry point for outside callers: runs the suite to completion and
/// returns its Summary.
pub async fn run_suite(suite: Suite, options: RunOptions) -> Result<Summary, Error> {
    let (summary_sender, mut summary_receiver) = mpsc::channel::<Summary>(1);
    let mut scheduler = ParallelScheduler::new(options, summary_sender);

    scheduler.execute(suite).await?;

    match summary_receiver.recv().await {
        Some(summary) => Ok(summary),
        None => Err(Error::new(
            ErrorKind::InternalFailure,
            "scheduler finished without producing a summary",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::case::TestCase;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Mutex;

    fn suite(cases: Vec<TestCase>) -> Suite {
        Suite::new("example", Duration::from_secs(5), cases)
    }

    fn passing_case(title: &str) -> TestCase {
        TestCase::new(title, || async { Ok(()) })
    }

    fn tracked_case(
        title: &str,
        delay: Duration,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    ) -> TestCase {
        TestCase::new(title, move || async move {
            let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn recording_case(
        title: &str,
        tag: Option<&str>,
        delay: Duration,
        events: Arc<Mutex<Vec<String>>>,
    ) -> TestCase {
        let start_label = format!("{}:start", title);
        let end_label = format!("{}:end", title);

        let mut case = TestCase::new(title, move || async move {
            events.lock().unwrap().push(start_label);
            tokio::time::sleep(delay).await;
            events.lock().unwrap().push(end_label);
            Ok(())
        });

        if let Some(tag) = tag {
            case = case.with_suppression_tag(SuppressionTag::new(tag));
        }

        case
    }

    #[tokio::test]
    async fn free_cases_run_concurrently() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let cases = (0..4)
            .map(|number| {
                tracked_case(
                    &format!("case {}", number),
                    Duration::from_millis(100),
                    in_flight.clone(),
                    max_in_flight.clone(),
                )
            })
            .collect();

        let summary = run_suite(
            suite(cases),
            RunOptions::new().with_max_concurrency(4),
        )
        .await
        .unwrap();

        assert_eq!(summary.passed_count(), 4);
        assert!(max_in_flight.load(Ordering::SeqCst) >= 2);
        // wall time tracks the longest case, not the sum of all four
        assert!(summary.wall_time() < Duration::from_millis(350));
    }

    #[tokio::test]
    async fn in_flight_cap_is_respected() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let cases = (0..4)
            .map(|number| {
                tracked_case(
                    &format!("case {}", number),
                    Duration::from_millis(20),
                    in_flight.clone(),
                    max_in_flight.clone(),
                )
            })
            .collect();

        let summary = run_suite(
            suite(cases),
            RunOptions::new().with_max_concurrency(1),
        )
        .await
        .unwrap();

        assert_eq!(summary.passed_count(), 4);
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cases_sharing_a_tag_run_sequentially_in_registration_order() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let cases = vec![
            recording_case("a", Some("x"), Duration::from_millis(30), events.clone()),
            recording_case("b", Some("x"), Duration::from_millis(30), events.clone()),
            recording_case("c", Some("x"), Duration::from_millis(30), events.clone()),
        ];

        run_suite(suite(cases), RunOptions::new()).await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(
            events.as_slice(),
            &[
                "a:start", "a:end", "b:start", "b:end", "c:start", "c:end"
            ]
        );
    }

    #[tokio::test]
    async fn distinct_tags_may_overlap() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let cases = vec![
            tracked_case(
                "first lane",
                Duration::from_millis(100),
                in_flight.clone(),
                max_in_flight.clone(),
            )
            .with_suppression_tag(SuppressionTag::new("x")),
            tracked_case(
                "second lane",
                Duration::from_millis(100),
                in_flight.clone(),
                max_in_flight.clone(),
            )
            .with_suppression_tag(SuppressionTag::new("y")),
        ];

        let summary = run_suite(
            suite(cases),
            RunOptions::new().with_max_concurrency(4),
        )
        .await
        .unwrap();

        assert_eq!(summary.passed_count(), 2);
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn skipped_cases_never_invoke_their_callback() {
        let invoked = Arc::new(AtomicBool::new(false));
        let invoked_clone = invoked.clone();
        let case = TestCase::new("ignored", move || async move {
            invoked_clone.store(true, Ordering::SeqCst);
            Ok(())
        })
        .with_skip(true);

        let summary = run_suite(suite(vec![case]), RunOptions::new())
            .await
            .unwrap();

        assert!(!invoked.load(Ordering::SeqCst));
        assert_eq!(summary.skipped_count(), 1);
        assert!(summary.results()[0].outcome().is_skipped());
        assert_eq!(summary.results()[0].duration(), Duration::ZERO);
    }

    #[tokio::test]
    async fn failing_cases_do_not_abort_siblings() {
        let cases = vec![
            TestCase::new("erroring", || async {
                Err(Error::new(ErrorKind::CaseFailure, "assert failed"))
            }),
            TestCase::new("panicking", || async { panic!("exploded") }),
            passing_case("healthy"),
        ];

        let summary = run_suite(suite(cases), RunOptions::new())
            .await
            .unwrap();

        assert_eq!(summary.passed_count(), 1);
        assert_eq!(summary.failed_count(), 2);

        for failure in summary.failures() {
            let error = failure.outcome().error().expect("failure must carry an error");
            assert!(!error.message().is_empty());
        }
    }

    #[tokio::test]
    async fn summary_ordering_is_independent_of_completion_order() {
        // the slowest case has the alphabetically smallest title
        let cases = vec![
            recording_case(
                "alpha",
                None,
                Duration::from_millis(80),
                Arc::new(Mutex::new(Vec::new())),
            ),
            recording_case(
                "beta",
                None,
                Duration::from_millis(20),
                Arc::new(Mutex::new(Vec::new())),
            ),
            passing_case("gamma"),
        ];

        let summary = run_suite(suite(cases), RunOptions::new())
            .await
            .unwrap();

        let titles: Vec<&str> = summary
            .results()
            .iter()
            .map(|result| result.title())
            .collect();

        assert_eq!(titles, vec!["alpha", "beta", "gamma"]);
    }

    #[tokio::test]
    async fn mixed_suite_reports_every_case() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let cases = vec![
            recording_case("a", Some("x"), Duration::from_millis(20), events.clone()),
            recording_case("b", Some("x"), Duration::from_millis(20), events.clone()),
            passing_case("c"),
            passing_case("d").with_skip(true),
        ];

        let summary = run_suite(suite(cases), RunOptions::new())
            .await
            .unwrap();

        assert_eq!(summary.results().len(), 4);
        assert_eq!(summary.passed_count(), 3);
        assert_eq!(summary.skipped_count(), 1);

        let events = events.lock().unwrap();
        assert_eq!(
            events.as_slice(),
            &["a:start", "a:end", "b:start", "b:end"]
        );
    }

    #[tokio::test]
    async fn suite_timeout_marks_unfinished_cases_failed() {
        let cases = vec![
            recording_case(
                "running",
                Some("z"),
                Duration::from_millis(500),
                Arc::new(Mutex::new(Vec::new())),
            ),
            recording_case(
                "queued",
                Some("z"),
                Duration::from_millis(10),
                Arc::new(Mutex::new(Vec::new())),
            ),
        ];

        let started = Instant::now();
        let summary = run_suite(
            suite(cases),
            RunOptions::new().with_timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap();

        // the run settles near the budget instead of waiting out the case
        assert!(started.elapsed() < Duration::from_millis(400));
        assert_eq!(summary.failed_count(), 2);

        for failure in summary.failures() {
            let error = failure.outcome().error().expect("failure must carry an error");
            assert_eq!(error.kind(), ErrorKind::TimeoutFailure);
        }
    }

    #[tokio::test]
    async fn duplicate_titles_run_independently() {
        let cases = vec![passing_case("same"), passing_case("same")];

        let summary = run_suite(suite(cases), RunOptions::new())
            .await
            .unwrap();

        assert_eq!(summary.results().len(), 2);
        assert_eq!(summary.passed_count(), 2);
        assert_eq!(summary.results()[0].index(), 0);
        assert_eq!(summary.results()[1].index(), 1);
    }

    #[tokio::test]
    async fn empty_suite_name_fails_fast() {
        let invoked = Arc::new(AtomicBool::new(false));
        let invoked_clone = invoked.clone();
        let case = TestCase::new("only", move || async move {
            invoked_clone.store(true, Ordering::SeqCst);
            Ok(())
        });

        let error = run_suite(
            Suite::new("", Duration::from_secs(1), vec![case]),
            RunOptions::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ConfigurationFailure);
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn zero_timeout_budget_fails_fast() {
        let error = run_suite(
            Suite::new("example", Duration::ZERO, vec![passing_case("only")]),
            RunOptions::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ConfigurationFailure);
    }

    #[tokio::test]
    async fn zero_max_concurrency_fails_fast() {
        let error = run_suite(
            suite(vec![passing_case("only")]),
            RunOptions::new().with_max_concurrency(0),
        )
        .await
        .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ConfigurationFailure);
    }

    #[tokio::test]
    async fn empty_case_title_fails_fast() {
        let error = run_suite(suite(vec![passing_case("")]), RunOptions::new())
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ConfigurationFailure);
    }

    #[tokio::test]
    async fn empty_suite_yields_an_empty_summary() {
        let summary = run_suite(suite(Vec::new()), RunOptions::new())
            .await
            .unwrap();

        assert!(summary.results().is_empty());
        assert!(!summary.has_any_case_failed());
    }
}
