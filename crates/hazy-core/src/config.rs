//! Emulation configuration.
//!
//! All configuration is pure data. Every level offers the same three presets
//! (`good_condition`, `recommended`, `worst_case`) and a `validate` method;
//! constructors and `set_config` validate before anything is applied.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Every decider weight is zero, so no outcome can ever be selected.
    #[error("decider weights sum to zero")]
    NoOutcomes,

    /// Latency lower bound exceeds upper bound.
    #[error("min latency {min_ms}ms exceeds max latency {max_ms}ms")]
    LatencyBounds {
        /// Configured lower bound.
        min_ms: u64,
        /// Configured upper bound.
        max_ms: u64,
    },

    /// A tuning range has its minimum above its maximum.
    #[error("invalid {name} range: {min}..={max}")]
    TuningRange {
        /// Which tuning parameter.
        name: &'static str,
        /// Configured minimum.
        min: u32,
        /// Configured maximum.
        max: u32,
    },
}

/// Relative weights of the per-packet outcomes.
///
/// Weights are relative, not percentages: `{original: 98, drop: 2}` drops
/// roughly one packet in fifty. A zero weight excludes the outcome entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeciderConfig {
    /// Deliver the packet unchanged.
    pub original_chance: u32,
    /// Drop the packet.
    pub drop_chance: u32,
    /// Deliver the packet more than once.
    pub duplicate_chance: u32,
    /// Deliver the packet late enough to land behind later traffic.
    pub reorder_chance: u32,
    /// Replace the payload with random bytes.
    pub tamper_chance: u32,
}

impl DeciderConfig {
    /// Every packet is delivered unchanged.
    pub const fn passthrough() -> Self {
        Self {
            original_chance: 1,
            drop_chance: 0,
            duplicate_chance: 0,
            reorder_chance: 0,
            tamper_chance: 0,
        }
    }

    /// Rare drops and mild reordering/duplication.
    pub const fn good_condition() -> Self {
        Self {
            original_chance: 100_000,
            drop_chance: 1,
            duplicate_chance: 30,
            reorder_chance: 30,
            tamper_chance: 0,
        }
    }

    /// A noticeably lossy link.
    pub const fn recommended() -> Self {
        Self {
            original_chance: 10_000,
            drop_chance: 30,
            duplicate_chance: 10,
            reorder_chance: 20,
            tamper_chance: 0,
        }
    }

    /// Heavy loss, duplication and reordering.
    pub const fn worst_case() -> Self {
        Self {
            original_chance: 200,
            drop_chance: 5,
            duplicate_chance: 5,
            reorder_chance: 5,
            tamper_chance: 0,
        }
    }

    /// Sum of all weights.
    pub fn total(&self) -> u64 {
        [
            self.original_chance,
            self.drop_chance,
            self.duplicate_chance,
            self.reorder_chance,
            self.tamper_chance,
        ]
        .iter()
        .map(|w| u64::from(*w))
        .sum()
    }

    /// Reject a configuration in which no outcome can be selected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total() == 0 {
            return Err(ConfigError::NoOutcomes);
        }
        Ok(())
    }
}

impl Default for DeciderConfig {
    fn default() -> Self {
        Self::recommended()
    }
}

/// Latency bounds for one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyConfig {
    /// Lowest target latency the drift may choose.
    pub min_latency_ms: u64,
    /// Highest target latency the drift may choose. Also the starting latency.
    pub max_latency_ms: u64,
    /// Upper bound (inclusive) of the per-packet jitter.
    pub jitter_ms: u64,
}

impl LatencyConfig {
    /// No latency and no jitter.
    pub const fn zero() -> Self {
        Self { min_latency_ms: 0, max_latency_ms: 0, jitter_ms: 0 }
    }

    /// Round-trip figures of a good connection.
    pub const fn good_condition() -> Self {
        Self { min_latency_ms: 11, max_latency_ms: 44, jitter_ms: 2 }
    }

    /// Round-trip figures of an average connection.
    pub const fn recommended() -> Self {
        Self { min_latency_ms: 33, max_latency_ms: 72, jitter_ms: 6 }
    }

    /// Round-trip figures of a bad connection.
    pub const fn worst_case() -> Self {
        Self { min_latency_ms: 130, max_latency_ms: 180, jitter_ms: 31 }
    }

    /// Split a round-trip configuration into the share of one direction.
    #[must_use]
    pub const fn one_way(self) -> Self {
        Self {
            min_latency_ms: self.min_latency_ms / 2,
            max_latency_ms: self.max_latency_ms / 2,
            jitter_ms: self.jitter_ms / 2,
        }
    }

    /// Reject inverted bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_latency_ms > self.max_latency_ms {
            return Err(ConfigError::LatencyBounds {
                min_ms: self.min_latency_ms,
                max_ms: self.max_latency_ms,
            });
        }
        Ok(())
    }
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self::recommended().one_way()
    }
}

/// Correlated loss bursts.
///
/// A burst lasts `burst_min_ms + uniform[0, burst_span_ms)` and the quiet
/// period between bursts lasts `inter_burst_min_ms + uniform[0,
/// inter_burst_span_ms)`. A zero `burst_span_ms` disables bursts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurstConfig {
    /// Random part of the burst length.
    pub burst_span_ms: u64,
    /// Fixed part of the burst length.
    pub burst_min_ms: u64,
    /// Random part of the quiet period.
    pub inter_burst_span_ms: u64,
    /// Fixed part of the quiet period.
    pub inter_burst_min_ms: u64,
}

impl BurstConfig {
    /// No bursts.
    pub const fn disabled() -> Self {
        Self { burst_span_ms: 0, burst_min_ms: 0, inter_burst_span_ms: 0, inter_burst_min_ms: 0 }
    }

    /// No bursts.
    pub const fn good_condition() -> Self {
        Self::disabled()
    }

    /// Short outages every 10-30 seconds.
    pub const fn recommended() -> Self {
        Self {
            burst_span_ms: 120,
            burst_min_ms: 40,
            inter_burst_span_ms: 20_000,
            inter_burst_min_ms: 10_000,
        }
    }

    /// Long outages every 3-9 seconds.
    pub const fn worst_case() -> Self {
        Self {
            burst_span_ms: 400,
            burst_min_ms: 100,
            inter_burst_span_ms: 6_000,
            inter_burst_min_ms: 3_000,
        }
    }

    /// Whether bursts can ever happen.
    pub const fn is_enabled(&self) -> bool {
        self.burst_span_ms != 0
    }
}

/// Magnitudes of the duplicate and reorder treatments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpairmentTuning {
    /// Fewest extra copies of a duplicated packet.
    pub duplicate_extra_min: u32,
    /// Most extra copies of a duplicated packet.
    pub duplicate_extra_max: u32,
    /// Latency added to a reordered packet, per multiplier step.
    pub reorder_interval_ms: u64,
    /// Smallest reorder multiplier.
    pub reorder_multiplier_min: u32,
    /// Largest reorder multiplier.
    pub reorder_multiplier_max: u32,
}

impl ImpairmentTuning {
    /// Reject inverted ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duplicate_extra_min > self.duplicate_extra_max {
            return Err(ConfigError::TuningRange {
                name: "duplicate_extra",
                min: self.duplicate_extra_min,
                max: self.duplicate_extra_max,
            });
        }
        if self.reorder_multiplier_min > self.reorder_multiplier_max {
            return Err(ConfigError::TuningRange {
                name: "reorder_multiplier",
                min: self.reorder_multiplier_min,
                max: self.reorder_multiplier_max,
            });
        }
        Ok(())
    }
}

impl Default for ImpairmentTuning {
    fn default() -> Self {
        Self {
            duplicate_extra_min: 1,
            duplicate_extra_max: 3,
            reorder_interval_ms: 16,
            reorder_multiplier_min: 1,
            reorder_multiplier_max: 3,
        }
    }
}

/// Everything one direction needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionConfig {
    /// Per-packet outcome weights.
    pub decider: DeciderConfig,
    /// One-way latency bounds.
    pub latency: LatencyConfig,
    /// Loss bursts.
    pub burst: BurstConfig,
    /// Duplicate/reorder magnitudes.
    pub tuning: ImpairmentTuning,
}

impl DirectionConfig {
    /// Every packet delivered unchanged, immediately, with no bursts.
    pub fn passthrough() -> Self {
        Self {
            decider: DeciderConfig::passthrough(),
            latency: LatencyConfig::zero(),
            burst: BurstConfig::disabled(),
            tuning: ImpairmentTuning::default(),
        }
    }

    /// Good connection (one-way share).
    pub fn good_condition() -> Self {
        Self {
            decider: DeciderConfig::good_condition(),
            latency: LatencyConfig::good_condition().one_way(),
            burst: BurstConfig::good_condition(),
            tuning: ImpairmentTuning::default(),
        }
    }

    /// Average connection (one-way share).
    pub fn recommended() -> Self {
        Self {
            decider: DeciderConfig::recommended(),
            latency: LatencyConfig::recommended().one_way(),
            burst: BurstConfig::recommended(),
            tuning: ImpairmentTuning::default(),
        }
    }

    /// Bad connection (one-way share).
    pub fn worst_case() -> Self {
        Self {
            decider: DeciderConfig::worst_case(),
            latency: LatencyConfig::worst_case().one_way(),
            burst: BurstConfig::worst_case(),
            tuning: ImpairmentTuning::default(),
        }
    }

    /// Validate every part.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.decider.validate()?;
        self.latency.validate()?;
        self.tuning.validate()
    }
}

/// Configuration of both directions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazyConfig {
    /// Traffic arriving from the network.
    pub inbound: DirectionConfig,
    /// Traffic written by the application.
    pub outbound: DirectionConfig,
}

impl HazyConfig {
    /// Same configuration for both directions.
    pub const fn symmetric(direction: DirectionConfig) -> Self {
        Self { inbound: direction, outbound: direction }
    }

    /// Both directions pass traffic through untouched.
    pub fn passthrough() -> Self {
        Self::symmetric(DirectionConfig::passthrough())
    }

    /// Good connection in both directions.
    pub fn good_condition() -> Self {
        Self::symmetric(DirectionConfig::good_condition())
    }

    /// Average connection in both directions.
    pub fn recommended() -> Self {
        Self::symmetric(DirectionConfig::recommended())
    }

    /// Bad connection in both directions.
    pub fn worst_case() -> Self {
        Self::symmetric(DirectionConfig::worst_case())
    }

    /// Validate both directions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.inbound.validate()?;
        self.outbound.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        for config in
            [
                HazyConfig::passthrough(),
                HazyConfig::good_condition(),
                HazyConfig::recommended(),
                HazyConfig::worst_case(),
            ]
        {
            assert_eq!(config.validate(), Ok(()));
        }
    }

    #[test]
    fn one_way_halves_round_trip() {
        let one_way = LatencyConfig::worst_case().one_way();
        let expected = LatencyConfig { min_latency_ms: 65, max_latency_ms: 90, jitter_ms: 15 };
        assert_eq!(one_way, expected);
    }

    #[test]
    fn all_zero_weights_rejected() {
        let config = DeciderConfig {
            original_chance: 0,
            drop_chance: 0,
            duplicate_chance: 0,
            reorder_chance: 0,
            tamper_chance: 0,
        };
        assert_eq!(config.validate(), Err(ConfigError::NoOutcomes));
    }

    #[test]
    fn inverted_latency_rejected() {
        let config = LatencyConfig { min_latency_ms: 50, max_latency_ms: 10, jitter_ms: 0 };
        assert_eq!(config.validate(), Err(ConfigError::LatencyBounds { min_ms: 50, max_ms: 10 }));
    }

    #[test]
    fn inverted_tuning_rejected() {
        let tuning = ImpairmentTuning { reorder_multiplier_min: 4, ..Default::default() };
        assert!(matches!(
            tuning.validate(),
            Err(ConfigError::TuningRange { name: "reorder_multiplier", .. })
        ));
    }

    #[test]
    fn zero_span_disables_bursts() {
        let burst = BurstConfig { burst_min_ms: 500, ..BurstConfig::disabled() };
        assert!(!burst.is_enabled());
        assert!(BurstConfig::worst_case().is_enabled());
    }

    #[test]
    fn weights_larger_than_u32_do_not_overflow() {
        let config = DeciderConfig {
            original_chance: u32::MAX,
            drop_chance: u32::MAX,
            duplicate_chance: 0,
            reorder_chance: 0,
            tamper_chance: 0,
        };
        assert_eq!(config.total(), 2 * u64::from(u32::MAX));
    }
}
