use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::Error;

pub type CaseFuture = Pin<Box<dyn Future<Output = Result<(), Error>> + Send>>;
pub type CaseCallback = Box<dyn FnOnce() -> CaseFuture + Send>;

/// Label forcing mutual exclusion: cases sharing a tag never run concurrently.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SuppressionTag(String);

impl SuppressionTag {
    pub fn new(name: impl Into<String>) -> SuppressionTag {
        SuppressionTag(name.into())
    }

    pub fn name(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for SuppressionTag {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A single schedulable test case. The callback is opaque to the scheduler:
/// it is invoked at most once, on a fresh task, and reports through its
/// returned result only.
pub struct TestCase {
    title: String,
    skip: bool,
    suppress_parallel: Option<SuppressionTag>,
    timeout: Option<Duration>,
    callback: CaseCallback,
}

impl TestCase {
    pub fn new<F, Fut>(title: impl Into<String>, callback: F) -> TestCase
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        TestCase {
            title: title.into(),
            skip: false,
            suppress_parallel: None,
            timeout: None,
            callback: Box::new(move || Box::pin(callback())),
        }
    }

    pub fn with_skip(mut self, skip: bool) -> TestCase {
        self.skip = skip;
        self
    }

    pub fn with_suppression_tag(mut self, tag: SuppressionTag) -> TestCase {
        self.suppress_parallel = Some(tag);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> TestCase {
        self.timeout = Some(timeout);
        self
    }

    pub fn title(&self) -> &str {
        self.title.as_str()
    }

    pub fn skip(&self) -> bool {
        self.skip
    }

    pub fn suppression_tag(&self) -> Option<&SuppressionTag> {
        self.suppress_parallel.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) fn into_parts(self) -> (String, Option<Duration>, CaseCallback) {
        (self.title, self.timeout, self.callback)
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TestCase")
            .field("title", &self.title)
            .field("skip", &self.skip)
            .field("suppress_parallel", &self.suppress_parallel)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
