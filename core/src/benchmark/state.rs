//! Benchmark lifecycle states

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a benchmark
///
/// ```text
/// Uninitialized --configure--> Configured --start--> Running --(plan done)--> Finished
/// Running | Finished --stop--> Stopped
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkState {
    /// No configuration yet
    #[default]
    Uninitialized,
    /// Configured, not started
    Configured,
    /// Workers are being scaled
    Running,
    /// The step plan completed; workers keep running until stopped
    Finished,
    /// Workers and receiver are shut down
    Stopped,
}

impl BenchmarkState {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Stopped => "stopped",
        }
    }

    /// Whether the benchmark owns live workers
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Finished)
    }
}

impl fmt::Display for BenchmarkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown state name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown benchmark state: {0}")]
pub struct UnknownState(pub String);

impl FromStr for BenchmarkState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uninitialized" => Ok(Self::Uninitialized),
            "configured" => Ok(Self::Configured),
            "running" => Ok(Self::Running),
            "finished" => Ok(Self::Finished),
            "stopped" => Ok(Self::Stopped),
            other => Err(UnknownState(other.to_string())),
        }
    }
}
