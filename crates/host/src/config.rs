//! Host runtime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for a [`SessionHost`](crate::SessionHost) and the sessions it
/// starts. Loaded from JSON/TOML by embedding binaries; the defaults suit
/// tests and small deployments.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Logging label for the host's root context.
    pub label: String,
    /// Seconds an app instance lingers with no pins before closing.
    pub app_idle_close_secs: u64,
    /// Depth of each session's commit routing queue.
    pub commit_queue_depth: usize,
    /// Depth of each session's transport outbox.
    pub outbox_depth: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            label: "plexus-host".to_string(),
            app_idle_close_secs: 10,
            commit_queue_depth: 16,
            outbox_depth: 16,
        }
    }
}

impl HostConfig {
    /// The app idle-close tunable as a duration.
    pub fn app_idle_close(&self) -> Duration {
        Duration::from_secs(self.app_idle_close_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: HostConfig =
            serde_json::from_str(r#"{ "label": "edge", "outbox_depth": 4 }"#).unwrap();
        assert_eq!(cfg.label, "edge");
        assert_eq!(cfg.outbox_depth, 4);
        assert_eq!(cfg.commit_queue_depth, HostConfig::default().commit_queue_depth);
        assert_eq!(cfg.app_idle_close(), Duration::from_secs(10));
    }
}
