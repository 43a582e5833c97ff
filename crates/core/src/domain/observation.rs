// Observation Domain Model
// The normalized result record produced by any probe, on any backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::normalize::normalize_bytes;
use super::platform::Platform;

/// Return code of an observation that has not been executed yet
pub const NOT_EXECUTED: i32 = -1;

/// Return code recorded when the command could not be run at all
pub const SPAWN_FAILED: i32 = 127;

/// Return code recorded when the process ended without an exit code (killed by a signal)
pub const SIGNALED: i32 = -2;

/// Where a command actually ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationPoint {
    LocalExec,
    RemoteExec,
}

impl ObservationPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationPoint::LocalExec => "local_exec",
            ObservationPoint::RemoteExec => "remote_exec",
        }
    }
}

impl std::fmt::Display for ObservationPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw process result, identical in shape for every backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_status: i32,
    pub stdout: Vec<u8>,
    /// Tokens handed to the process
    pub args: Vec<String>,
}

/// Observation under construction (returncode is still `NOT_EXECUTED`)
#[derive(Debug, Clone)]
pub struct PendingObservation {
    name: String,
    host: String,
    args: Vec<String>,
    observation_point: ObservationPoint,
    platform: Option<Platform>,
    vantage: Option<String>,
}

impl PendingObservation {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        observation_point: ObservationPoint,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            args: Vec::new(),
            observation_point,
            platform: None,
            vantage: None,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_vantage(mut self, vantage: impl Into<String>) -> Self {
        self.vantage = Some(vantage.into());
        self
    }

    /// Tokens known before execution (used when the backend never reports its own)
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn returncode(&self) -> i32 {
        NOT_EXECUTED
    }

    /// Finish with the output of an executed command
    pub fn complete(self, output: CommandOutput, time: DateTime<Utc>) -> Observation {
        Observation {
            name: self.name,
            host: self.host,
            args: output.args,
            returncode: output.exit_status,
            stdout: normalize_bytes(&output.stdout),
            observation_point: self.observation_point,
            time,
            platform: self.platform,
            vantage: self.vantage,
            error: None,
        }
    }

    /// Finish without execution: the command could not be run
    pub fn fail(self, error: impl std::fmt::Display, time: DateTime<Utc>) -> Observation {
        Observation {
            name: self.name,
            host: self.host,
            args: self.args,
            returncode: SPAWN_FAILED,
            stdout: String::new(),
            observation_point: self.observation_point,
            time,
            platform: self.platform,
            vantage: self.vantage,
            error: Some(error.to_string()),
        }
    }
}

/// Completed, immutable observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    name: String,
    host: String,
    args: Vec<String>,
    returncode: i32,
    stdout: String,
    observation_point: ObservationPoint,
    time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    platform: Option<Platform>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    vantage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    error: Option<String>,
}

impl Observation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn returncode(&self) -> i32 {
        self.returncode
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn observation_point(&self) -> ObservationPoint {
        self.observation_point
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn platform(&self) -> Option<Platform> {
        self.platform
    }

    /// Remote machine the command ran on (remote observations only)
    pub fn vantage(&self) -> Option<&str> {
        self.vantage.as_deref()
    }

    /// Why the command could not be executed, if it could not
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.returncode == 0
    }

    pub fn is_executed(&self) -> bool {
        self.returncode != NOT_EXECUTED
    }

    /// Replace the raw exit status with a derived verdict
    pub(crate) fn with_returncode(mut self, returncode: i32) -> Self {
        self.returncode = returncode;
        self
    }
}
