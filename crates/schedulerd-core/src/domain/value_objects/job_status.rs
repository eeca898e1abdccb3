//! Job status value object — the state machine driving job processing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a job.
///
/// ```text
/// PENDING -> QUEUED -> PROCESSING -> COMPLETED
///                           |-> RETRYING -> QUEUED
///                           |-> FAILED (after exhausting retries, routed to the dead letter queue)
/// PENDING | QUEUED | RETRYING -> CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created but not yet placed in the queue index.
    #[default]
    Pending,
    /// Present in the queue index, waiting for a worker to claim it.
    Queued,
    /// Claimed by a worker and currently executing.
    Processing,
    /// Finished successfully.
    Completed,
    /// A handler attempt failed and another attempt is scheduled.
    Retrying,
    /// Exhausted its retry budget; moved to the dead letter queue.
    Failed,
    /// Cancelled before it finished running.
    Cancelled,
}

impl JobStatus {
    /// Checks whether a transition from `self` to `next` is legal.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Queued)
                | (Self::Pending, Self::Cancelled)
                | (Self::Queued, Self::Processing)
                | (Self::Queued, Self::Cancelled)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Retrying)
                | (Self::Processing, Self::Failed)
                | (Self::Retrying, Self::Queued)
                | (Self::Retrying, Self::Cancelled)
        )
    }

    /// Checks whether this status is terminal (no further transitions are legal).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Checks whether a job in this status currently occupies a worker slot.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Queued => write!(f, "queued"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Retrying => write!(f, "retrying"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_move_to_queued_or_cancelled_only() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Queued));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Cancelled));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn processing_cannot_be_cancelled_directly() {
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Cancelled));
    }

    #[test]
    fn retrying_returns_to_queued() {
        assert!(JobStatus::Retrying.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Retrying.can_transition_to(JobStatus::Processing));
    }

    #[test]
    fn terminal_statuses_have_no_outgoing_transitions() {
        for terminal in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in [
                JobStatus::Pending,
                JobStatus::Queued,
                JobStatus::Processing,
                JobStatus::Completed,
                JobStatus::Retrying,
                JobStatus::Failed,
                JobStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn only_processing_is_running() {
        assert!(JobStatus::Processing.is_running());
        assert!(!JobStatus::Queued.is_running());
    }
}
