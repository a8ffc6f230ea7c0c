pub mod config;
pub mod error;
pub mod scheduling;

pub use error::{Error, ErrorKind};
pub use scheduling::case::{SuppressionTag, TestCase};
pub use scheduling::case_result::{CaseOutcome, CaseResult};
pub use scheduling::registry::TestCaseRegistry;
pub use scheduling::scheduler::{run_suite, ParallelScheduler, RunOptions};
pub use scheduling::suite::Suite;
pub use scheduling::summary::Summary;
