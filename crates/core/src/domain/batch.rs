// Batch Domain Model
// Everything gathered in one scheduling cycle

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::observation::{Observation, ObservationPoint};
use super::platform::Platform;

/// A probe that had no command template for the platform it would run on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedProbe {
    pub name: String,
    pub host: String,
    pub observation_point: ObservationPoint,
    pub platform: Platform,
}

/// Observations of one cycle, in execution order
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub observations: Vec<Observation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedProbe>,
    /// Set when the remote phase could not run or was abandoned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
    /// Set when shutdown stopped the cycle before every probe ran
    pub interrupted: bool,
}

impl Batch {
    pub fn new(id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            started_at,
            observations: Vec::new(),
            skipped: Vec::new(),
            remote_error: None,
            interrupted: false,
        }
    }

    pub fn push(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observations with a non-zero return code, in their original order
    pub fn failures(&self) -> Vec<&Observation> {
        self.observations
            .iter()
            .filter(|o| o.returncode() != 0)
            .collect()
    }
}
