//! Worker status value object.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Liveness status of a worker, as recorded in the Durable Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// Has at least one job currently in `PROCESSING`.
    #[default]
    Active,
    /// Running and heartbeating, but has no jobs checked out.
    Idle,
    /// Shut down cleanly (as opposed to going stale).
    Stopped,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Idle => write!(f, "idle"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
