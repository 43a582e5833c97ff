// Local command executor
// reason: tokio::process spawns the tokenized argv directly, no shell involved
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

use netmon_core::domain::{CommandOutput, ObservationPoint, SIGNALED};
use netmon_core::port::{tokenize, CommandExecutor, ExecutionError, TimeProvider};

/// Runs probe commands as child processes of this machine
///
/// The command line is split with shell word rules and the first token is
/// spawned with the rest as arguments. No timeout is applied: the call
/// returns when the child exits.
pub struct LocalExecutor {
    time_provider: Arc<dyn TimeProvider>,
}

impl LocalExecutor {
    /// Create a new local executor
    ///
    /// # Example
    /// ```ignore
    /// let executor = LocalExecutor::new(Arc::new(SystemTimeProvider));
    /// let output = executor.execute("ping -c 3 localhost").await?;
    /// ```
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self { time_provider }
    }

    /// Spawn child process and wait for output
    async fn spawn_and_wait(
        &self,
        args: &[String],
    ) -> Result<std::process::Output, ExecutionError> {
        let (program, rest) = args.split_first().ok_or(ExecutionError::EmptyCommand)?;

        Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ExecutionError::Spawn(format!("{}: {}", program, e)))
    }
}

#[async_trait]
impl CommandExecutor for LocalExecutor {
    async fn execute(&self, command_line: &str) -> Result<CommandOutput, ExecutionError> {
        let args = tokenize(command_line)?;
        let start = self.time_provider.now();

        info!(args = ?args, "Starting local command");

        let output = self.spawn_and_wait(&args).await?;
        let exit_status = output.status.code().unwrap_or(SIGNALED);
        let duration_ms = (self.time_provider.now() - start).num_milliseconds();

        if !output.stderr.is_empty() {
            debug!(
                program = %args[0],
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Local command wrote to stderr"
            );
        }

        info!(
            program = %args[0],
            exit_status,
            duration_ms,
            stdout_bytes = output.stdout.len(),
            "Local command completed"
        );

        Ok(CommandOutput {
            exit_status,
            stdout: output.stdout,
            args,
        })
    }

    fn observation_point(&self) -> ObservationPoint {
        ObservationPoint::LocalExec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netmon_core::port::time_provider::SystemTimeProvider;
    use tokio_test::assert_ok;

    fn executor() -> LocalExecutor {
        LocalExecutor::new(Arc::new(SystemTimeProvider))
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_success() {
        let output = assert_ok!(executor().execute("echo 'hello   world' again").await);

        assert_eq!(output.exit_status, 0);
        assert_eq!(output.args, ["echo", "hello   world", "again"]);
        assert_eq!(String::from_utf8_lossy(&output.stdout), "hello   world again\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let output = assert_ok!(executor().execute("sh -c 'exit 3'").await);
        assert_eq!(output.exit_status, 3);
        assert!(output.stdout.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_no_shell_interpretation() {
        let output = assert_ok!(executor().execute("echo ';' '$(id)' '&&' true").await);
        assert_eq!(String::from_utf8_lossy(&output.stdout), "; $(id) && true\n");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let result = executor()
            .execute("netmon-definitely-not-a-real-binary --flag")
            .await;
        match result {
            Err(ExecutionError::Spawn(msg)) => {
                assert!(msg.starts_with("netmon-definitely-not-a-real-binary"))
            }
            other => panic!("expected spawn error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bad_command_lines() {
        assert_eq!(
            executor().execute("").await.unwrap_err(),
            ExecutionError::EmptyCommand
        );
        assert!(matches!(
            executor().execute("echo \"open").await,
            Err(ExecutionError::Tokenize(_))
        ));
    }

    #[test]
    fn test_observation_point() {
        assert_eq!(executor().observation_point(), ObservationPoint::LocalExec);
        assert!(executor().vantage().is_none());
    }
}
