use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::future::FutureExt;
use tokio::sync::mpsc::Sender;
use tokio::time::Instant;

use crate::error::{Error, ErrorKind};
use crate::scheduling::case::{CaseCallback, TestCase};
use crate::scheduling::case_result::CaseResult;

/// A single case instance that is run by the ParallelScheduler.
pub struct RunInstance {
    index: usize,
    title: String,
    timeout: Option<Duration>,
    callback: CaseCallback,
    result_sender: Sender<CaseResult>,
}

impl RunInstance {
    pub fn new(index: usize, case: TestCase, result_sender: Sender<CaseResult>) -> RunInstance {
        let (title, timeout, callback) = case.into_parts();

        RunInstance {
            index,
            title,
            timeout,
            callback,
            result_sender,
        }
    }

    pub fn title(&self) -> &str {
        self.title.as_str()
    }

    /// Invokes the callback on a fresh context, maps panics and deadline
    /// overruns to failures, and reports the terminal result through the
    /// result sender. Error is returned for reporting faults only, never
    /// for case outcomes.
    pub async fn run(self) -> Result<(), Error> {
        let started = Instant::now();
        let guarded = AssertUnwindSafe((self.callback)()).catch_unwind();

        let settled = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, guarded).await {
                Ok(settled) => RunInstance::settle(settled),
                Err(_) => Err(Error::new(
                    ErrorKind::TimeoutFailure,
                    format!("case exceeded its budget of {}ms", timeout.as_millis()),
                )),
            },
            None => RunInstance::settle(guarded.await),
        };

        let duration = started.elapsed();
        let result = match settled {
            Ok(()) => CaseResult::passed(self.index, self.title, duration),
            Err(error) => CaseResult::failed(self.index, self.title, error, duration),
        };

        match self.result_sender.send(result).await {
            Ok(_) => Ok(()),
            Err(error) => Err(Error::new(
                ErrorKind::InternalFailure,
                format!("failed to send result: {}", error),
            )),
        }
    }

    fn settle(outcome: Result<Result<(), Error>, Box<dyn Any + Send>>) -> Result<(), Error> {
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(error),
            Err(payload) => Err(Error::new(
                ErrorKind::CaseFailure,
                format!("case panicked: {}", RunInstance::panic_message(payload)),
            )),
        }
    }

    fn panic_message(payload: Box<dyn Any + Send>) -> String {
        match payload.downcast_ref::<&str>() {
            Some(message) => (*message).to_string(),
            None => match payload.downcast_ref::<String>() {
                Some(message) => message.clone(),
                None => "unknown panic payload".to_string(),
            },
        }
    }
}
