//! Consensus and runtime configuration (spec §6 "Configuration").
//!
//! Centralizes every tunable named in the spec. Constructed through the
//! fluent [`ConfigBuilder`], generalizing the teacher's difficulty/reward
//! builder into the full set of protocol constants; fields stay `pub` for
//! ergonomic read access, mutation goes through the builder so validation
//! stays centralized. Loading a config from disk is an external
//! collaborator's job (spec §1); this struct is `serde`-derived so that
//! loader can deserialize it without this crate caring about the file
//! format.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a node derives its quorum-set threshold from the known validator
/// set (spec §9 Open Questions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdMode {
    /// `threshold = validators.len()`, the historic 100%-agreement
    /// default, preserved until governance is specified.
    LegacyFullAgreement,
    /// `threshold = floor(2n/3) + 1`.
    Bft,
}

/// Runtime configuration shared across the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Expected quorum size (spec §6 `validators`).
    pub validators: u32,
    /// Enrollment cycle length in blocks (spec §6 `validator_cycle`).
    pub validator_cycle: u32,
    /// Minimum active validator count at every height (spec §3, `MinValidatorCount`).
    pub min_validator_count: u32,
    /// Threshold for a freeze output to be enrollment-eligible (spec §6 `min_freeze_amount`).
    pub min_freeze_amount: u64,
    /// Blocks until a freeze output matures (`MaturityDelay`, spec §4.4).
    pub maturity_delay: u64,
    /// Fixed transaction count per non-genesis block (spec §6 `tx_in_block`).
    pub tx_in_block: u32,
    /// Delay between peer-client retries (spec §6 `retry_delay`).
    pub retry_delay: Duration,
    /// Maximum retry attempts before a call is escalated to the ban manager (spec §6 `max_retries`).
    pub max_retries: u32,
    /// Per-call transport timeout (spec §6 `timeout`).
    pub timeout: Duration,
    /// Failures before a peer is banned (spec §6 `max_failed_requests`).
    pub max_failed_requests: u32,
    /// How long a ban lasts (spec §6 `ban_duration`).
    pub ban_duration: Duration,
    /// Quorum-set threshold policy (spec §9 Open Question).
    pub threshold_mode: ThresholdMode,
    /// Human-readable network name (e.g. "main", "test").
    pub network: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            validators: 2,
            validator_cycle: 20,
            min_validator_count: 2,
            min_freeze_amount: 40_000_000_000,
            maturity_delay: 2_016,
            tx_in_block: 8,
            retry_delay: Duration::from_millis(500),
            max_retries: 3,
            timeout: Duration::from_secs(5),
            max_failed_requests: 32,
            ban_duration: Duration::from_secs(60 * 60),
            threshold_mode: ThresholdMode::LegacyFullAgreement,
            network: "main".into(),
        }
    }
}

/// Fluent builder for [`Config`].
pub struct ConfigBuilder {
    inner: Config,
}

impl ConfigBuilder {
    /// Starts a new builder pre-populated with [`Config::default`].
    pub fn new() -> Self {
        Self {
            inner: Config::default(),
        }
    }

    pub fn validators(mut self, count: u32) -> Self {
        self.inner.validators = count;
        self
    }

    pub fn validator_cycle(mut self, cycle: u32) -> Self {
        self.inner.validator_cycle = cycle;
        self
    }

    pub fn min_validator_count(mut self, count: u32) -> Self {
        self.inner.min_validator_count = count;
        self
    }

    pub fn min_freeze_amount(mut self, amount: u64) -> Self {
        self.inner.min_freeze_amount = amount;
        self
    }

    pub fn maturity_delay(mut self, delay: u64) -> Self {
        self.inner.maturity_delay = delay;
        self
    }

    pub fn tx_in_block(mut self, count: u32) -> Self {
        self.inner.tx_in_block = count;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.inner.retry_delay = delay;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.inner.max_retries = retries;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.inner.timeout = timeout;
        self
    }

    pub fn max_failed_requests(mut self, count: u32) -> Self {
        self.inner.max_failed_requests = count;
        self
    }

    pub fn ban_duration(mut self, duration: Duration) -> Self {
        self.inner.ban_duration = duration;
        self
    }

    pub fn threshold_mode(mut self, mode: ThresholdMode) -> Self {
        self.inner.threshold_mode = mode;
        self
    }

    pub fn network<S: Into<String>>(mut self, name: S) -> Self {
        self.inner.network = name.into();
        self
    }

    /// Consumes the builder returning an immutable configuration value.
    pub fn finish(self) -> Config {
        self.inner
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .validators(16)
            .tx_in_block(4)
            .threshold_mode(ThresholdMode::Bft)
            .network("test")
            .finish();
        assert_eq!(cfg.validators, 16);
        assert_eq!(cfg.tx_in_block, 4);
        assert_eq!(cfg.threshold_mode, ThresholdMode::Bft);
        assert_eq!(cfg.network, "test");
    }

    #[test]
    fn default_matches_reference_protocol_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.min_validator_count, 2);
        assert_eq!(cfg.tx_in_block, 8);
        assert_eq!(cfg.threshold_mode, ThresholdMode::LegacyFullAgreement);
    }
}
