use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};
use crate::scheduling::case::{SuppressionTag, TestCase};
use crate::scheduling::registry::TestCaseRegistry;
use crate::scheduling::script_case::ScriptCase;
use crate::scheduling::suite::Suite;

#[derive(Deserialize, Serialize)]
pub struct SuiteSpec {
    name: String,
    timeout_ms: u64,
    cases: Vec<CaseSpec>,
}

#[derive(Deserialize, Serialize)]
pub struct CaseSpec {
    name: String,
    #[serde(default)]
    skip: bool,
    #[serde(default)]
    suppress_parallel: Option<String>,
    command: String,
    #[serde(default)]
    arguments: Vec<String>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

pub async fn read(files: &[&str]) -> Result<Vec<Suite>, Error> {
    let mut suites = Vec::with_capacity(files.len());

    for file in files {
        let file_content = match tokio::fs::read(file).await {
            Ok(file_content) => file_content,
            Err(error) => {
                return Err(Error::new(
                    ErrorKind::InternalFailure,
                    format!("failed to read suite file '{}': {}", file, error),
                ));
            }
        };

        let spec: SuiteSpec = match serde_json::from_slice(file_content.as_slice()) {
            Ok(spec) => spec,
            Err(error) => {
                return Err(Error::new(
                    ErrorKind::ConfigurationFailure,
                    format!("failed to deserialize suite file '{}': {}", file, error),
                ));
            }
        };

        suites.push(build_suite(spec)?);
    }

    Ok(suites)
}

fn build_suite(spec: SuiteSpec) -> Result<Suite, Error> {
    let SuiteSpec {
        name,
        timeout_ms,
        cases,
    } = spec;

    let mut registry = TestCaseRegistry::new();

    for case_spec in cases {
        let script = ScriptCase::new(case_spec.command, case_spec.arguments);
        let mut case =
            TestCase::new(case_spec.name, move || script.run()).with_skip(case_spec.skip);

        if let Some(tag) = case_spec.suppress_parallel {
            case = case.with_suppression_tag(SuppressionTag::new(tag));
        }

        if let Some(timeout_ms) = case_spec.timeout_ms {
            case = case.with_timeout(Duration::from_millis(timeout_ms));
        }

        registry.register([case])?;
    }

    registry.into_suite(name, Duration::from_millis(timeout_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SUITE_JSON: &str = r#"{
        "name": "commands",
        "timeout_ms": 5000,
        "cases": [
            { "name": "list", "command": "ls" },
            {
                "name": "exclusive",
                "command": "sh",
                "arguments": ["-c", "exit 0"],
                "suppress_parallel": "workdir",
                "timeout_ms": 1000
            },
            { "name": "ignored", "command": "ls", "skip": true }
        ]
    }"#;

    #[tokio::test]
    async fn suite_files_are_deserialized_into_suites() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("suite.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SUITE_JSON.as_bytes()).unwrap();

        let path = path.to_str().unwrap();
        let suites = read(&[path]).await.unwrap();

        assert_eq!(suites.len(), 1);
        assert_eq!(suites[0].name(), "commands");
        assert_eq!(suites[0].timeout(), Duration::from_millis(5000));
        assert_eq!(suites[0].case_count(), 3);

        let cases = suites[0].cases();
        assert!(!cases[0].skip());
        assert!(cases[0].suppression_tag().is_none());
        assert_eq!(cases[1].suppression_tag().unwrap().name(), "workdir");
        assert_eq!(cases[1].timeout(), Some(Duration::from_millis(1000)));
        assert!(cases[2].skip());
    }

    #[tokio::test]
    async fn malformed_suite_file_is_a_configuration_failure() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("broken.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"{ not json").unwrap();

        let path = path.to_str().unwrap();
        let error = read(&[path]).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ConfigurationFailure);
    }

    #[tokio::test]
    async fn missing_suite_file_is_an_internal_failure() {
        let error = read(&["/nonexistent/suite.json"]).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InternalFailure);
    }
}
