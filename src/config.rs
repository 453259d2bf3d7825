use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Client orchestrator tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base polling interval; also the backoff floor after activity.
    pub poll_interval: Duration,
    /// Cap for the exponential backoff.
    pub max_poll_interval: Duration,
    /// Backoff multiplier applied after each idle poll.
    pub backoff_factor: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_poll_interval: Duration::from_secs(60),
            backoff_factor: 2,
        }
    }
}
