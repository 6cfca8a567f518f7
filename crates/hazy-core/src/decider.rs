//! Weighted per-packet outcome selection.

use std::fmt;

use rand::Rng;
use thiserror::Error;

use crate::config::{ConfigError, DeciderConfig};

/// Treatment applied to one written packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Deliver unchanged.
    Original,
    /// Discard.
    Drop,
    /// Deliver several independently delayed copies.
    Duplicate,
    /// Deliver late and exempt from the ordering clamp.
    Reorder,
    /// Deliver with the payload replaced by random bytes.
    Tamper,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Original => "original",
            Self::Drop => "drop",
            Self::Duplicate => "duplicate",
            Self::Reorder => "reorder",
            Self::Tamper => "tamper",
        };
        f.write_str(name)
    }
}

/// A draw matched no range.
///
/// Only reachable if the decider was built from weights summing to zero,
/// which construction rejects. Seeing this is a defect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("decider draw {draw} fell outside all ranges (total {total})")]
pub struct DeciderError {
    /// The drawn value.
    pub draw: u64,
    /// Sum of the configured weights.
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DecisionRange {
    /// Exclusive cumulative upper bound.
    upper: u64,
    decision: Decision,
}

/// Weighted random classifier.
///
/// Holds cumulative ranges in the fixed order original, drop, duplicate,
/// reorder, tamper. Zero-weight outcomes get no range. Stateless apart from
/// the ranges; the caller supplies the RNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decider {
    total: u64,
    ranges: Vec<DecisionRange>,
}

impl Decider {
    /// Build ranges from `config`.
    pub fn new(config: &DeciderConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let weighted = [
            (config.original_chance, Decision::Original),
            (config.drop_chance, Decision::Drop),
            (config.duplicate_chance, Decision::Duplicate),
            (config.reorder_chance, Decision::Reorder),
            (config.tamper_chance, Decision::Tamper),
        ];

        let mut total = 0u64;
        let mut ranges = Vec::with_capacity(weighted.len());
        for (weight, decision) in weighted {
            if weight == 0 {
                continue;
            }
            total += u64::from(weight);
            ranges.push(DecisionRange { upper: total, decision });
        }

        Ok(Self { total, ranges })
    }

    /// Replace the ranges. On error the old ranges stay in place.
    pub fn set_config(&mut self, config: &DeciderConfig) -> Result<(), ConfigError> {
        *self = Self::new(config)?;
        Ok(())
    }

    /// Sum of all weights.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Outcomes that can be selected, in range order.
    pub fn decisions(&self) -> impl Iterator<Item = Decision> + '_ {
        self.ranges.iter().map(|r| r.decision)
    }

    /// Draw one outcome.
    pub fn decide<R: Rng>(&self, rng: &mut R) -> Result<Decision, DeciderError> {
        if self.total == 0 {
            return Err(DeciderError { draw: 0, total: 0 });
        }

        let draw = rng.gen_range(0..self.total);
        self.ranges
            .iter()
            .find(|r| draw < r.upper)
            .map(|r| r.decision)
            .ok_or(DeciderError { draw, total: self.total })
    }
}
