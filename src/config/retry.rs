use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Capped exponential delay policy used by the retrying strategies
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct DelayRetryPolicy {
    /// Number of retries after the first attempt (0 disables retrying)
    #[serde(default = "default_retry_count")]
    pub retry_count: usize,

    /// Delay before the first retry (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound of any single delay (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for DelayRetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl DelayRetryPolicy {
    pub fn new(
        retry_count: usize,
        base_delay_ms: u64,
        max_delay_ms: u64,
    ) -> Self {
        Self {
            retry_count,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    pub fn delay_for(
        &self,
        attempt: usize,
    ) -> Duration {
        let shift = attempt.saturating_sub(1).min(32) as u32;
        let delay = self.base_delay_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "retry base_delay_ms must be > 0".to_string(),
            )));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry max_delay_ms {}ms must not be below base_delay_ms {}ms",
                self.max_delay_ms, self.base_delay_ms
            ))));
        }

        Ok(())
    }
}

fn default_retry_count() -> usize {
    3
}
fn default_base_delay_ms() -> u64 {
    10
}
fn default_max_delay_ms() -> u64 {
    1000
}
