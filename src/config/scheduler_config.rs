use std::env::VarError;

use crate::error::{Error, ErrorKind};
use crate::scheduling::scheduler::RunOptions;

const MAX_CONCURRENCY_ENV: &str = "SUITE_MAX_CONCURRENCY";

/// Builds the run options from the environment. The in-flight cap is
/// optional; when absent the scheduler falls back to the host's available
/// parallelism.
pub fn try_generate_config() -> Result<RunOptions, Error> {
    let max_concurrency = match std::env::var(MAX_CONCURRENCY_ENV) {
        Ok(value) => match value.parse::<usize>() {
            Ok(0) => {
                return Err(Error::new(
                    ErrorKind::ConfigurationFailure,
                    format!("'{}' must be greater than zero", MAX_CONCURRENCY_ENV),
                ));
            }
            Ok(max_concurrency) => Some(max_concurrency),
            Err(error) => {
                return Err(Error::new(
                    ErrorKind::ConfigurationFailure,
                    format!("failed to parse '{}': {}", MAX_CONCURRENCY_ENV, error),
                ));
            }
        },
        Err(VarError::NotPresent) => None,
        Err(error) => {
            return Err(Error::new(
                ErrorKind::ConfigurationFailure,
                format!("failed to read '{}': {}", MAX_CONCURRENCY_ENV, error),
            ));
        }
    };

    let mut run_options = RunOptions::new();

    if let Some(max_concurrency) = max_concurrency {
        run_options = run_options.with_max_concurrency(max_concurrency);
    }

    Ok(run_options)
}
