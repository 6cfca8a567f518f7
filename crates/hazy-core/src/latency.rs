//! Drifting latency with per-packet jitter.
//!
//! The model alternates between two phases:
//!
//! ```text
//!   Normal ──(reevaluation due)──► Drifting
//!     ▲                               │
//!     └──────(target reached)─────────┘
//! ```
//!
//! In `Normal` the latency holds still. When the reevaluation time passes a
//! new target is drawn from `[min, max]` and the model starts `Drifting`
//! towards it at a fixed rate for the episode (usually slow, occasionally
//! aggressive). Once within one millisecond of the target it snaps, returns to
//! `Normal` and schedules the next reevaluation 200-1200ms later.

use rand::Rng;

use crate::{
    config::{ConfigError, LatencyConfig},
    time::Timestamp,
};

/// Drift rate of an ordinary episode.
pub const NORMAL_DRIFT_MS_PER_SEC: f64 = 20.0;

/// Drift rate of an aggressive episode.
pub const AGGRESSIVE_DRIFT_MS_PER_SEC: f64 = 150.0;

/// One episode in this many drifts aggressively.
const AGGRESSIVE_ONE_IN: u32 = 20;

/// Largest elapsed time a single update may account for. Keeps a stalled
/// caller from teleporting the latency to its target.
const MAX_STEP_MS: u64 = 1_000;

/// Remaining gap under which the drift snaps to its target.
const SNAP_THRESHOLD_MS: f64 = 1.0;

const REEVALUATE_MIN_MS: u64 = 200;
const REEVALUATE_MAX_MS: u64 = 1_200;

/// Phase of the latency model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyPhase {
    /// Holding steady until the next reevaluation.
    Normal,
    /// Moving towards a freshly chosen target.
    Drifting,
}

/// Slowly drifting latency owned by one direction.
#[derive(Debug, Clone)]
pub struct LatencyModel {
    config: LatencyConfig,
    latency_ms: u64,
    precise_ms: f64,
    target_ms: u64,
    drift_ms_per_sec: f64,
    phase: LatencyPhase,
    next_reevaluation: Option<Timestamp>,
    last_update: Option<Timestamp>,
}

impl LatencyModel {
    /// Create a model starting at the configured maximum latency.
    pub fn new(config: LatencyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            latency_ms: config.max_latency_ms,
            precise_ms: to_precise(config.max_latency_ms),
            target_ms: config.max_latency_ms,
            drift_ms_per_sec: NORMAL_DRIFT_MS_PER_SEC,
            phase: LatencyPhase::Normal,
            next_reevaluation: None,
            last_update: None,
        })
    }

    /// Replace the bounds and restart from the new maximum latency.
    ///
    /// The update clock is kept so the next `update` measures elapsed time
    /// from the last one.
    pub fn set_config(&mut self, config: LatencyConfig) -> Result<(), ConfigError> {
        let last_update = self.last_update;
        *self = Self::new(config)?;
        self.last_update = last_update;
        Ok(())
    }

    /// Current bounds.
    pub fn config(&self) -> &LatencyConfig {
        &self.config
    }

    /// Current latency without jitter.
    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    /// Latency the current drift is heading for.
    pub fn target_ms(&self) -> u64 {
        self.target_ms
    }

    /// Current phase.
    pub fn phase(&self) -> LatencyPhase {
        self.phase
    }

    /// When the next target will be drawn, if scheduled.
    pub fn next_reevaluation(&self) -> Option<Timestamp> {
        self.next_reevaluation
    }

    /// Advance the model to `now`.
    ///
    /// The first call only seeds the clock. Elapsed time is clamped to a
    /// bounded step.
    pub fn update<R: Rng>(&mut self, now: Timestamp, rng: &mut R) {
        let elapsed_ms =
            self.last_update.map_or(0, |prev| now.saturating_since(prev).min(MAX_STEP_MS));
        self.last_update = Some(now);

        match self.phase {
            LatencyPhase::Normal => {
                if self.next_reevaluation.is_none_or(|at| now >= at) {
                    self.begin_drift(rng);
                }
            },
            LatencyPhase::Drifting => self.advance_drift(now, elapsed_ms, rng),
        }
    }

    /// Latency plus a fresh jitter draw in `[0, jitter]`.
    ///
    /// The result is committed to one packet and never revisited.
    pub fn sample_with_jitter<R: Rng>(&self, rng: &mut R) -> u64 {
        let jitter = rng.gen_range(0..=self.config.jitter_ms);
        self.latency_ms.saturating_add(jitter)
    }

    fn begin_drift<R: Rng>(&mut self, rng: &mut R) {
        self.target_ms = rng.gen_range(self.config.min_latency_ms..=self.config.max_latency_ms);
        self.drift_ms_per_sec = if rng.gen_ratio(1, AGGRESSIVE_ONE_IN) {
            AGGRESSIVE_DRIFT_MS_PER_SEC
        } else {
            NORMAL_DRIFT_MS_PER_SEC
        };
        self.precise_ms = to_precise(self.latency_ms);
        self.phase = LatencyPhase::Drifting;

        tracing::trace!(
            from_ms = self.latency_ms,
            target_ms = self.target_ms,
            rate = self.drift_ms_per_sec,
            "latency drift started"
        );
    }

    fn advance_drift<R: Rng>(&mut self, now: Timestamp, elapsed_ms: u64, rng: &mut R) {
        let target = to_precise(self.target_ms);
        let gap = target - self.precise_ms;
        let step = self.drift_ms_per_sec * to_precise(elapsed_ms) / 1000.0;

        if gap.abs() <= step {
            self.precise_ms = target;
        } else {
            self.precise_ms += step.copysign(gap);
        }
        self.latency_ms = from_precise(self.precise_ms);

        if (target - self.precise_ms).abs() < SNAP_THRESHOLD_MS {
            self.latency_ms = self.target_ms;
            self.precise_ms = target;
            self.phase = LatencyPhase::Normal;
            let wait = rng.gen_range(REEVALUATE_MIN_MS..=REEVALUATE_MAX_MS);
            self.next_reevaluation = Some(now.saturating_add_ms(wait));

            tracing::trace!(latency_ms = self.latency_ms, "latency drift settled");
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_precise(ms: u64) -> f64 {
    ms as f64
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn from_precise(ms: f64) -> u64 {
    ms.round().max(0.0) as u64
}
