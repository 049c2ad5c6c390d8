use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT_1H_BYTES: u64 = 500;
const DEFAULT_LIMIT_24H_BYTES: u64 = 1500;
const DEFAULT_ROTATION_INTERVAL_MINUTES: u64 = 60;
const DEFAULT_EXPIRY_CHECK_INTERVAL_MINUTES: u64 = 60;

/// Policy thresholds and trigger intervals, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub limit_1h_bytes: u64,
    pub limit_24h_bytes: u64,
    pub rotation_interval_minutes: u64,
    pub expiry_check_interval_minutes: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            limit_1h_bytes: DEFAULT_LIMIT_1H_BYTES,
            limit_24h_bytes: DEFAULT_LIMIT_24H_BYTES,
            rotation_interval_minutes: DEFAULT_ROTATION_INTERVAL_MINUTES,
            expiry_check_interval_minutes: DEFAULT_EXPIRY_CHECK_INTERVAL_MINUTES,
        }
    }
}

impl PolicyConfig {
    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(self.rotation_interval_minutes * 60)
    }

    pub fn expiry_check_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_check_interval_minutes * 60)
    }
}
