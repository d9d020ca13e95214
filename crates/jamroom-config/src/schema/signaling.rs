use serde::{Deserialize, Serialize};

/// Signaling channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// How many recently delivered message keys are remembered for dedup.
    pub dedup_capacity: usize,
    /// Capacity of the channel handing decoded signals to the manager.
    pub subscription_buffer: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            dedup_capacity: 100,
            subscription_buffer: 256,
        }
    }
}
