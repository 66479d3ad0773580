//! Runtime configuration of the [Driver](crate::Driver).

use crate::DEFAULT_MAX_UNSAFE_PAYLOADS_BYTES;
use std::time::Duration;

/// Tuning knobs of the driver loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct DriverConfig {
    /// The bound on a single pipeline step. An elapsed step counts as a temporary failure.
    pub step_timeout: Duration,
    /// The first backoff after a temporary failure.
    pub backoff_base: Duration,
    /// The cap on the exponential backoff.
    pub backoff_max: Duration,
    /// How long the driver idles once the pipeline ran out of L1 data.
    pub idle_interval: Duration,
    /// The byte budget of the unsafe payload queue.
    pub max_unsafe_payloads_bytes: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(20),
            backoff_base: Duration::from_millis(250),
            backoff_max: Duration::from_secs(10),
            idle_interval: Duration::from_secs(2),
            max_unsafe_payloads_bytes: DEFAULT_MAX_UNSAFE_PAYLOADS_BYTES,
        }
    }
}

impl DriverConfig {
    /// Returns the delay before the retry following `failures` consecutive temporary failures.
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = 1u32.checked_shl(failures.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }
}
