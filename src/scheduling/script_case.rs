use tokio::process::Command;

use crate::error::{Error, ErrorKind};

/// A case backed by an external command: passes iff the command exits
/// successfully. Spawn failures and non-zero exits are case failures, never
/// suite aborts.
pub struct ScriptCase {
    command: String,
    arguments: Vec<String>,
}

impl ScriptCase {
    pub fn new(command: impl Into<String>, arguments: Vec<String>) -> ScriptCase {
        ScriptCase {
            command: command.into(),
            arguments,
        }
    }

    pub fn command(&self) -> &str {
        self.command.as_str()
    }

    pub async fn run(self) -> Result<(), Error> {
        let result = match Command::new(&self.command).args(&self.arguments).spawn() {
            Ok(mut process) => process.wait().await,
            Err(error) => {
                return Err(Error::new(
                    ErrorKind::CaseFailure,
                    format!("failed to spawn command '{}': {}", self.command, error),
                ))
            }
        };

        match result {
            Ok(exit_status) => {
                if exit_status.success() {
                    Ok(())
                } else {
                    Err(Error::new(
                        ErrorKind::CaseFailure,
                        format!("command '{}' failed: '{}'", self.command, exit_status),
                    ))
                }
            }
            Err(error) => Err(Error::new(
                ErrorKind::InternalFailure,
                format!("failed to wait for command to end: {}", error),
            )),
        }
    }
}
