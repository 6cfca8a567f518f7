//! One emulated traffic direction.
//!
//! A `Direction` turns writes into scheduled packets and elapsed time into
//! due packets. It layers three state machines:
//!
//! - Burst phase: `Normal` or `PacketDropBurst`. During a burst every write
//!   is swallowed before the decider is consulted.
//! - Latency phase: owned by the `LatencyModel` (steady or drifting).
//! - Per-packet decision: drawn from the `Decider` for each write outside a
//!   burst.
//!
//! # Ordering
//!
//! Every scheduling except `Reorder` is clamped to land strictly after the
//! previous ordered packet, so ordered traffic is delivered in the order it
//! was written. Reordered packets skip the clamp and do not move the
//! watermark, which lets later traffic overtake them.

use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::{
    allocator::Allocator,
    config::{BurstConfig, ConfigError, DirectionConfig, ImpairmentTuning},
    decider::{Decider, DeciderError, Decision},
    latency::LatencyModel,
    packets::{ArenaError, DEFAULT_CAPACITY, PacketArena},
    time::Timestamp,
};

/// Which way traffic flows through a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// From the network towards the application.
    Inbound,
    /// From the application towards the network.
    Outbound,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inbound => "in",
            Self::Outbound => "out",
        })
    }
}

/// Loss burst phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstPhase {
    /// Traffic flows; waiting for the next burst.
    Normal,
    /// Every write is dropped until the burst ends.
    PacketDropBurst,
}

/// What happened to one write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Empty payload; nothing stored.
    Empty,
    /// Swallowed by an active drop burst.
    BurstDropped,
    /// The decider dropped the packet.
    Dropped,
    /// All copies entered the arena.
    Scheduled {
        /// Treatment applied.
        decision: Decision,
        /// Packets stored.
        copies: usize,
    },
    /// The arena filled up; `copies` made it in before it did.
    Overflow {
        /// Treatment applied.
        decision: Decision,
        /// Packets stored before the overflow.
        copies: usize,
    },
}

impl WriteOutcome {
    /// True if nothing from this write will be delivered.
    pub fn is_dropped(&self) -> bool {
        match self {
            Self::Empty | Self::BurstDropped | Self::Dropped => true,
            Self::Overflow { copies, .. } => *copies == 0,
            Self::Scheduled { .. } => false,
        }
    }
}

/// Defect reported by a direction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectionError {
    /// The decider found no range for its draw.
    #[error(transparent)]
    Decider(#[from] DeciderError),

    /// The arena rejected an operation.
    #[error(transparent)]
    Arena(#[from] ArenaError),
}

impl DirectionError {
    /// Returns true if this error indicates a broken invariant.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Decider(_) => true,
            Self::Arena(e) => e.is_fatal(),
        }
    }
}

/// Counters for one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionStats {
    /// Calls to `write`.
    pub written: u64,
    /// Writes swallowed by a burst.
    pub burst_dropped: u64,
    /// Writes the decider dropped.
    pub dropped: u64,
    /// Writes duplicated.
    pub duplicated: u64,
    /// Writes reordered.
    pub reordered: u64,
    /// Writes tampered with.
    pub tampered: u64,
    /// Packets stored in the arena.
    pub scheduled: u64,
    /// Packets lost to a full arena.
    pub overflowed: u64,
    /// Packets handed out after becoming due.
    pub delivered: u64,
}

/// Burst, latency and decision pipeline for one direction.
#[derive(Debug)]
pub struct Direction<A: Allocator> {
    side: Side,
    decider: Decider,
    latency: LatencyModel,
    packets: PacketArena<A>,
    phase: BurstPhase,
    next_burst_start: Option<Timestamp>,
    burst_end: Option<Timestamp>,
    burst: BurstConfig,
    tuning: ImpairmentTuning,
    rng: ChaCha8Rng,
    stats: DirectionStats,
}

impl<A: Allocator> Direction<A> {
    /// Create a direction with the default arena capacity.
    pub fn new(
        side: Side,
        config: &DirectionConfig,
        allocator: A,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        Self::with_capacity(side, config, DEFAULT_CAPACITY, allocator, seed)
    }

    /// Create a direction with `capacity` arena slots.
    pub fn with_capacity(
        side: Side,
        config: &DirectionConfig,
        capacity: usize,
        allocator: A,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            side,
            decider: Decider::new(&config.decider)?,
            latency: LatencyModel::new(config.latency)?,
            packets: PacketArena::with_capacity(capacity, allocator),
            phase: BurstPhase::Normal,
            next_burst_start: None,
            burst_end: None,
            burst: config.burst,
            tuning: config.tuning,
            rng: ChaCha8Rng::seed_from_u64(seed),
            stats: DirectionStats::default(),
        })
    }

    /// Replace the configuration.
    ///
    /// Validates everything before applying anything. Buffered packets keep
    /// their schedules. An active burst runs to its end; the next burst is
    /// timed with the new configuration.
    pub fn set_config(&mut self, config: &DirectionConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.decider.set_config(&config.decider)?;
        self.latency.set_config(config.latency)?;
        self.burst = config.burst;
        self.tuning = config.tuning;
        if self.phase == BurstPhase::Normal {
            self.next_burst_start = None;
        }
        Ok(())
    }

    /// Discard every buffered packet.
    pub fn reset(&mut self) {
        let discarded = self.packets.len();
        self.packets.clear();
        tracing::debug!(side = %self.side, discarded, "direction reset");
    }

    /// Which way this direction carries traffic.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Current burst phase.
    pub fn phase(&self) -> BurstPhase {
        self.phase
    }

    /// When the current burst ends, if one is active.
    pub fn burst_end(&self) -> Option<Timestamp> {
        self.burst_end
    }

    /// When the next burst starts, if scheduled.
    pub fn next_burst_start(&self) -> Option<Timestamp> {
        self.next_burst_start
    }

    /// The decider.
    pub fn decider(&self) -> &Decider {
        &self.decider
    }

    /// The latency model.
    pub fn latency(&self) -> &LatencyModel {
        &self.latency
    }

    /// The packet arena.
    pub fn packets(&self) -> &PacketArena<A> {
        &self.packets
    }

    /// Counters.
    pub fn stats(&self) -> &DirectionStats {
        &self.stats
    }

    /// Advance the latency model and the burst phase to `now`.
    pub fn update(&mut self, now: Timestamp) {
        self.latency.update(now, &mut self.rng);
        self.advance_burst(now);
    }

    /// Run one payload through the pipeline.
    ///
    /// Arena overflow is not an error: it is reported as
    /// `WriteOutcome::Overflow` and logged.
    pub fn write(
        &mut self,
        payload: &[u8],
        now: Timestamp,
    ) -> Result<WriteOutcome, DirectionError> {
        self.advance_burst(now);
        self.stats.written += 1;

        if self.phase == BurstPhase::PacketDropBurst {
            self.stats.burst_dropped += 1;
            tracing::trace!(side = %self.side, "burst: dropped packet");
            return Ok(WriteOutcome::BurstDropped);
        }

        if payload.is_empty() {
            return Ok(WriteOutcome::Empty);
        }

        let decision = self.decider.decide(&mut self.rng).inspect_err(|e| {
            tracing::error!(side = %self.side, error = %e, "decider defect");
        })?;
        tracing::trace!(side = %self.side, %decision, len = payload.len(), "decision");

        match decision {
            Decision::Drop => {
                self.stats.dropped += 1;
                tracing::debug!(side = %self.side, "decision: dropped packet");
                Ok(WriteOutcome::Dropped)
            },
            Decision::Original => {
                let stored = self.schedule(payload, now);
                self.finish(decision, usize::from(stored.is_ok()), stored.err())
            },
            Decision::Duplicate => {
                self.stats.duplicated += 1;
                let extra = self
                    .rng
                    .gen_range(self.tuning.duplicate_extra_min..=self.tuning.duplicate_extra_max);
                tracing::debug!(side = %self.side, extra, "decision: duplicate packet");

                let mut copies = 0;
                for _ in 0..=extra {
                    if let Err(e) = self.schedule(payload, now) {
                        return self.finish(decision, copies, Some(e));
                    }
                    copies += 1;
                }
                self.finish(decision, copies, None)
            },
            Decision::Tamper => {
                self.stats.tampered += 1;
                let mut garbled = vec![0u8; payload.len()];
                self.rng.fill(garbled.as_mut_slice());
                tracing::debug!(side = %self.side, "decision: garble packet");

                let stored = self.schedule(&garbled, now);
                self.finish(decision, usize::from(stored.is_ok()), stored.err())
            },
            Decision::Reorder => {
                self.stats.reordered += 1;
                let multiplier = self.rng.gen_range(
                    self.tuning.reorder_multiplier_min..=self.tuning.reorder_multiplier_max,
                );
                let inflation =
                    self.tuning.reorder_interval_ms.saturating_mul(u64::from(multiplier));
                tracing::debug!(side = %self.side, inflation, "decision: out of order packet");

                let stored = self.schedule_unordered(payload, now, inflation);
                self.finish(decision, usize::from(stored.is_ok()), stored.err())
            },
        }
    }

    /// Hand the most overdue packet to `deliver`, then release it.
    ///
    /// Returns `Ok(None)` if nothing is due. If `deliver` fails the packet
    /// stays buffered and the error is returned.
    pub fn deliver_one<T, E, F>(&mut self, now: Timestamp, deliver: F) -> Result<Option<T>, E>
    where
        F: FnOnce(&[u8]) -> Result<T, E>,
        E: From<ArenaError>,
    {
        let Some(slot) = self.packets.find_due(now) else {
            return Ok(None);
        };
        let packet = self.packets.get(slot).ok_or(ArenaError::StaleSlot(slot))?;
        tracing::trace!(
            side = %self.side,
            index = packet.index(),
            due = %packet.due(),
            late_ms = now.saturating_since(packet.due()),
            len = packet.len(),
            "packet due"
        );

        let value = deliver(packet.payload())?;
        self.packets.release(slot)?;
        self.stats.delivered += 1;
        Ok(Some(value))
    }

    /// Deliver every packet due at `now`, stopping at the first error.
    pub fn deliver_due<E, F>(&mut self, now: Timestamp, mut deliver: F) -> Result<usize, E>
    where
        F: FnMut(&[u8]) -> Result<(), E>,
        E: From<ArenaError>,
    {
        let mut delivered = 0;
        while self.deliver_one(now, &mut deliver)?.is_some() {
            delivered += 1;
        }
        Ok(delivered)
    }

    fn advance_burst(&mut self, now: Timestamp) {
        match self.phase {
            BurstPhase::Normal => {
                if !self.burst.is_enabled() {
                    return;
                }
                let start = match self.next_burst_start {
                    Some(start) => start,
                    None => {
                        let start = now.saturating_add_ms(self.inter_burst_wait());
                        self.next_burst_start = Some(start);
                        start
                    },
                };
                if now >= start {
                    let span = self.rng.gen_range(0..self.burst.burst_span_ms);
                    let duration = self.burst.burst_min_ms.saturating_add(span);
                    self.burst_end = Some(now.saturating_add_ms(duration));
                    self.next_burst_start = None;
                    self.phase = BurstPhase::PacketDropBurst;
                    tracing::info!(
                        side = %self.side,
                        duration_ms = duration,
                        "packet drop burst started"
                    );
                }
            },
            BurstPhase::PacketDropBurst => {
                if self.burst_end.is_none_or(|end| now >= end) {
                    let wait = self.inter_burst_wait();
                    self.next_burst_start = Some(now.saturating_add_ms(wait));
                    self.burst_end = None;
                    self.phase = BurstPhase::Normal;
                    tracing::info!(side = %self.side, next_in_ms = wait, "packet drop burst ended");
                }
            },
        }
    }

    fn inter_burst_wait(&mut self) -> u64 {
        let span = match self.burst.inter_burst_span_ms {
            0 => 0,
            span => self.rng.gen_range(0..span),
        };
        self.burst.inter_burst_min_ms.saturating_add(span)
    }

    fn schedule(&mut self, payload: &[u8], now: Timestamp) -> Result<(), ArenaError> {
        let mut due = now.saturating_add_ms(self.latency.sample_with_jitter(&mut self.rng));
        if let Some(last) = self.packets.last_scheduled()
            && due <= last
        {
            due = last.saturating_add_ms(1);
        }
        self.packets.insert(payload, due, now).map(|_| ())
    }

    fn schedule_unordered(
        &mut self,
        payload: &[u8],
        now: Timestamp,
        inflation_ms: u64,
    ) -> Result<(), ArenaError> {
        let delay = self.latency.sample_with_jitter(&mut self.rng).saturating_add(inflation_ms);
        self.packets.insert_unordered(payload, now.saturating_add_ms(delay), now).map(|_| ())
    }

    fn finish(
        &mut self,
        decision: Decision,
        copies: usize,
        error: Option<ArenaError>,
    ) -> Result<WriteOutcome, DirectionError> {
        self.stats.scheduled += copies as u64;
        match error {
            None => Ok(WriteOutcome::Scheduled { decision, copies }),
            Some(ArenaError::Overflow { capacity }) => {
                self.stats.overflowed += 1;
                tracing::warn!(
                    side = %self.side,
                    capacity,
                    %decision,
                    "overflow out of space, packet dropped"
                );
                Ok(WriteOutcome::Overflow { decision, copies })
            },
            Some(e) => {
                tracing::error!(side = %self.side, error = %e, "packet arena defect");
                Err(e.into())
            },
        }
    }
}
