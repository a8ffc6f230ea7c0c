use std::time::Duration;

use crate::error::{Error, ErrorKind};
use crate::scheduling::case::TestCase;
use crate::scheduling::suite::Suite;

/// Accumulates cases from one or more producers before scheduling begins.
/// Registration order is preserved; sealing hands the cases over exactly
/// once, after which any further mutation is rejected.
pub struct TestCaseRegistry {
    cases: Vec<TestCase>,
    sealed: bool,
}

impl TestCaseRegistry {
    pub fn new() -> TestCaseRegistry {
        TestCaseRegistry {
            cases: Vec::new(),
            sealed: false,
        }
    }

    pub fn register(&mut self, cases: impl IntoIterator<Item = TestCase>) -> Result<(), Error> {
        if self.sealed {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "cases may not be registered once scheduling has started",
            ));
        }

        self.cases.extend(cases);
        Ok(())
    }

    pub fn case_count(&self) -> usize {
        self.cases.len()
    }

    pub fn seal(&mut self) -> Result<Vec<TestCase>, Error> {
        if self.sealed {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "registry has already been sealed",
            ));
        }

        self.sealed = true;
        Ok(std::mem::take(&mut self.cases))
    }

    pub fn into_suite(
        mut self,
        name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Suite, Error> {
        let cases = self.seal()?;
        Ok(Suite::new(name, timeout, cases))
    }
}

impl Default for TestCaseRegistry {
    fn default() -> TestCaseRegistry {
        TestCaseRegistry::new()
    }
}
