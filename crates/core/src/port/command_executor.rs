// Command Executor Port
// Abstraction over where a probe command runs (local process or remote session)

use crate::domain::{CommandOutput, ObservationPoint};
use async_trait::async_trait;
use thiserror::Error;

/// Execution errors (fatal to the probe that hit them)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Empty command line")]
    EmptyCommand,

    #[error("Cannot tokenize command line: {0}")]
    Tokenize(String),

    #[error("Spawn failed: {0}")]
    Spawn(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Remote channel error: {0}")]
    Channel(String),

    #[error("Argument cannot be passed safely to the remote shell: {0}")]
    RemoteQuoting(String),
}

impl ExecutionError {
    /// True when the shared remote session can no longer be trusted
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, ExecutionError::Channel(_))
    }
}

/// Split a command line with shell word rules (quotes respected, no expansion)
pub fn tokenize(command_line: &str) -> Result<Vec<String>, ExecutionError> {
    let args = shell_words::split(command_line)
        .map_err(|e| ExecutionError::Tokenize(format!("{}: {}", e, command_line)))?;
    if args.is_empty() {
        return Err(ExecutionError::EmptyCommand);
    }
    Ok(args)
}

/// Command Executor trait
///
/// Implementations:
/// - LocalExecutor: spawns a child process without a shell
/// - SshSession: runs the command on the vantage host
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a command line and wait for it to finish
    ///
    /// A non-zero exit status is a normal result, not an error.
    ///
    /// # Errors
    /// - ExecutionError::Tokenize / EmptyCommand if the line cannot be split
    /// - ExecutionError::Spawn if the program cannot be started
    /// - ExecutionError::Channel if the remote session broke
    async fn execute(&self, command_line: &str) -> Result<CommandOutput, ExecutionError>;

    /// Tag stored on every observation this backend produces
    fn observation_point(&self) -> ObservationPoint;

    /// Host the commands actually run on, for remote backends
    fn vantage(&self) -> Option<&str> {
        None
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted outcome for one program
    #[derive(Debug, Clone)]
    pub enum MockResponse {
        Exit { code: i32, stdout: String },
        SpawnFail(String),
        ChannelFail(String),
    }

    impl MockResponse {
        pub fn exit(code: i32, stdout: impl Into<String>) -> Self {
            MockResponse::Exit {
                code,
                stdout: stdout.into(),
            }
        }
    }

    /// Mock executor keyed by program name (first token)
    pub struct MockCommandExecutor {
        point: ObservationPoint,
        vantage: Option<String>,
        responses: Mutex<HashMap<String, MockResponse>>,
        fallback: MockResponse,
        calls: Mutex<Vec<String>>,
    }

    impl MockCommandExecutor {
        pub fn new(point: ObservationPoint) -> Self {
            Self {
                point,
                vantage: None,
                responses: Mutex::new(HashMap::new()),
                fallback: MockResponse::exit(0, ""),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn local() -> Self {
            Self::new(ObservationPoint::LocalExec)
        }

        pub fn remote(vantage: impl Into<String>) -> Self {
            let mut mock = Self::new(ObservationPoint::RemoteExec);
            mock.vantage = Some(vantage.into());
            mock
        }

        pub fn respond(self, program: impl Into<String>, response: MockResponse) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(program.into(), response);
            self
        }

        /// Command lines received so far
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CommandExecutor for MockCommandExecutor {
        async fn execute(&self, command_line: &str) -> Result<CommandOutput, ExecutionError> {
            self.calls.lock().unwrap().push(command_line.to_string());

            let args = tokenize(command_line)?;
            let response = self
                .responses
                .lock()
                .unwrap()
                .get(&args[0])
                .cloned()
                .unwrap_or_else(|| self.fallback.clone());

            match response {
                MockResponse::Exit { code, stdout } => Ok(CommandOutput {
                    exit_status: code,
                    stdout: stdout.into_bytes(),
                    args,
                }),
                MockResponse::SpawnFail(msg) => Err(ExecutionError::Spawn(msg)),
                MockResponse::ChannelFail(msg) => Err(ExecutionError::Channel(msg)),
            }
        }

        fn observation_point(&self) -> ObservationPoint {
            self.point
        }

        fn vantage(&self) -> Option<&str> {
            self.vantage.as_deref()
        }
    }
}
