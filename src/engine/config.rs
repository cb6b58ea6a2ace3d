use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for sampling, persistence and restoration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Quiet period after the last scroll before a position is written.
    pub save_debounce_ms: u64,

    /// Pause between a forced flush and the remount during a mode switch.
    pub settle_delay_ms: u64,

    /// Restoration backoff is `restore_backoff_ms * attempt`.
    pub restore_backoff_ms: u64,
    pub restore_max_attempts: u32,

    /// Length of the snippet captured around the anchor.
    pub snippet_chars: usize,
    /// Snippet prefix that takes part in the dedup signature.
    pub signature_chars: usize,
    /// Snippet prefix searched for when the offset no longer resolves.
    pub search_prefix_chars: usize,

    /// Distance of the probe point from the viewport's leading corner.
    pub probe_inset_px: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: 3_000,
            settle_delay_ms: 50,
            restore_backoff_ms: 100,
            restore_max_attempts: 5,
            snippet_chars: 80,
            signature_chars: 20,
            search_prefix_chars: 30,
            probe_inset_px: 8.0,
        }
    }
}

impl EngineConfig {
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn restore_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.restore_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_linearly() {
        let config = EngineConfig::default();
        assert_eq!(config.restore_backoff(1), Duration::from_millis(100));
        assert_eq!(config.restore_backoff(4), Duration::from_millis(400));
    }

    #[test]
    fn partial_overrides_keep_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"saveDebounceMs": 500}"#).unwrap();
        assert_eq!(config.save_debounce(), Duration::from_millis(500));
        assert_eq!(config.restore_max_attempts, 5);
        assert_eq!(config.snippet_chars, 80);
    }
}
