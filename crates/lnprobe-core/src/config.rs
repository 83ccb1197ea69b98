use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Defaults applied to probe requests that leave a setting unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Whole-session deadline in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Per-attempt deadline in milliseconds. Unset means an attempt may use
    /// whatever session time remains.
    #[serde(default)]
    pub path_timeout_ms: Option<u64>,
    /// Stop as exhausted after this many route attempts.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_probe_timeout_ms() -> u64 {
    60_000
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            path_timeout_ms: None,
            max_attempts: None,
        }
    }
}

impl ProbeConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn path_timeout(&self) -> Option<Duration> {
        self.path_timeout_ms.map(Duration::from_millis)
    }
}
