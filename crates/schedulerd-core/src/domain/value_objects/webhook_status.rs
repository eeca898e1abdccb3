//! Webhook delivery status value object.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery status of an outbound webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    /// Not yet attempted.
    #[default]
    Pending,
    /// The synchronous first attempt failed; queued for the background retry loop.
    Retrying,
    /// Delivered and acknowledged with a 2xx response.
    Success,
    /// Exhausted its retry budget without a successful delivery.
    Failed,
}

impl WebhookStatus {
    /// Checks whether this status is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Retrying => write!(f, "retrying"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
