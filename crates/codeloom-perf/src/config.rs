use codeloom_core::{CodeloomError, CodeloomResult};
use serde::{Deserialize, Serialize};

/// Flat configuration for one performance run.
///
/// Every field has a default so partial TOML fragments load cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerfConfig {
    /// Number of synthetic messages to push through the queue.
    #[serde(default = "default_message_count")]
    pub message_count: usize,
    /// Number of simultaneous producers (and consumers).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Size in bytes of each synthetic payload.
    #[serde(default = "default_payload_size")]
    pub payload_size: usize,
    /// Retry limit handed to the queue under test.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Probability in [0, 1] that a message's first delivery is nacked.
    #[serde(default)]
    pub failure_injection_rate: f64,
    /// Seed for the failure-injection generator; a fixed seed reproduces
    /// identical injected failures.
    #[serde(default)]
    pub seed: u64,
}

fn default_message_count() -> usize {
    1000
}

fn default_concurrency() -> usize {
    4
}

fn default_payload_size() -> usize {
    64
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for PerfConfig {
    fn default() -> Self {
        Self {
            message_count: default_message_count(),
            concurrency: default_concurrency(),
            payload_size: default_payload_size(),
            max_attempts: default_max_attempts(),
            failure_injection_rate: 0.0,
            seed: 0,
        }
    }
}

impl PerfConfig {
    /// Check value ranges before a run.
    pub fn validate(&self) -> CodeloomResult<()> {
        if !(0.0..=1.0).contains(&self.failure_injection_rate) {
            return Err(CodeloomError::Config(format!(
                "failure_injection_rate must be in [0, 1], got {}",
                self.failure_injection_rate
            )));
        }
        if self.concurrency == 0 {
            return Err(CodeloomError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate a configuration from a TOML document.
    pub fn from_toml_str(raw: &str) -> CodeloomResult<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| CodeloomError::Config(format!("failed to parse perf config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}
