//! Job priority value object.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority level for queued jobs.
///
/// Priority determines where a job lands in the queue relative to jobs
/// scheduled around the same time — it biases the ordering, it does not
/// override it. See [`Priority::score_offset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Jumps ahead of every other priority at a comparable timestamp.
    Critical,
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    /// Additive offset (in milliseconds) applied to a job's scheduled
    /// timestamp to produce its queue score.
    ///
    /// `score = scheduled_at_ms + offset`. Critical jobs get no offset so
    /// that two critical jobs still order by timestamp; lower-priority
    /// jobs get a positive offset, pushing them later in the sorted set
    /// without needing a second sort key.
    #[must_use]
    pub const fn score_offset(&self) -> f64 {
        match self {
            Self::Critical => 0.0,
            Self::High => 1_000.0,
            Self::Normal => 10_000.0,
            Self::Low => 100_000.0,
        }
    }

    /// All priority levels, highest first.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Critical, Self::High, Self::Normal, Self::Low]
    }

    /// Lowercase `snake_case` name, matching the serde representation —
    /// used as the key in `QueueConfig::priority_offsets`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Normal => write!(f, "normal"),
            Self::Low => write!(f, "low"),
        }
    }
}
