/// Engine settings shared by every host (CLI, desktop shell, tests).
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Upper bound for a single store call; a slower call counts as failed.
    #[serde(default = "default_persist_timeout_ms")]
    pub persist_timeout_ms: u64,
    /// Toast on successful stage changes. Reorders never toast.
    #[serde(default = "default_true")]
    pub notify_transition_success: bool,
}

fn default_persist_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl EngineConfig {
    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.persist_timeout_ms.max(1))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            persist_timeout_ms: default_persist_timeout_ms(),
            notify_transition_success: true,
        }
    }
}
