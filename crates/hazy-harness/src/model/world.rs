//! A real engine wired to simulated collaborators.
//!
//! `HazyWorld` owns an engine running on `SimEnv`, `SimTransport` and
//! `TrackingAllocator`, plus the peer end of the transport. After every
//! operation it checks the invariants that must hold regardless of what the
//! emulated network does.

use hazy_core::{DatagramTransport, Environment, Hazy, HazyError, HazyStats};
use thiserror::Error;

use super::operation::{Operation, Preset, read_capacity};
use crate::{SimEnv, SimTransport, TrackingAllocator};

/// Arena capacity used by worlds, small enough for overflow to be reachable.
pub const WORLD_PACKET_CAPACITY: usize = 32;

/// Receive buffer used by worlds, small enough to fill up.
pub const WORLD_RECEIVE_BUFFER: usize = 4 * 1024;

/// An invariant the engine broke.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// Live allocations disagree with buffered packets.
    #[error("allocator reports {live} live buffers, arenas hold {buffered}")]
    LeakedBuffers {
        /// Buffers the allocator considers live.
        live: usize,
        /// Packets held by both arenas.
        buffered: usize,
    },

    /// A buffer was freed twice or never allocated.
    #[error("{0} unknown frees")]
    UnknownFree(u64),

    /// An arena grew past its capacity.
    #[error("arena holds {len} packets, capacity {capacity}")]
    OverCapacity {
        /// Packets held.
        len: usize,
        /// Arena capacity.
        capacity: usize,
    },

    /// The engine reported a defect.
    #[error("fatal engine error: {0}")]
    Fatal(String),
}

/// What a world looks like from the outside after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Engine counters.
    pub stats: HazyStats,
    /// Datagrams the application read, in order.
    pub read: Vec<Vec<u8>>,
    /// Datagrams the peer received, in order.
    pub peer_received: Vec<Vec<u8>>,
    /// Simulated time in milliseconds.
    pub now_ms: u64,
}

/// Engine plus simulated collaborators.
#[derive(Debug)]
pub struct HazyWorld {
    env: SimEnv,
    hazy: Hazy<SimEnv, TrackingAllocator>,
    allocator: TrackingAllocator,
    transport: SimTransport,
    peer: SimTransport,
    read: Vec<Vec<u8>>,
    peer_received: Vec<Vec<u8>>,
}

impl HazyWorld {
    /// Build a world with the given seed and preset.
    pub fn new(seed: u64, preset: Preset) -> Result<Self, HazyError> {
        let env = SimEnv::with_seed(seed);
        let allocator = TrackingAllocator::new();
        let hazy = Hazy::with_capacity(
            env.clone(),
            preset.config(),
            allocator.clone(),
            WORLD_PACKET_CAPACITY,
            WORLD_RECEIVE_BUFFER,
        )?;
        let (transport, peer) = SimTransport::pair();

        Ok(Self {
            env,
            hazy,
            allocator,
            transport,
            peer,
            read: Vec::new(),
            peer_received: Vec::new(),
        })
    }

    /// The engine.
    pub fn hazy(&self) -> &Hazy<SimEnv, TrackingAllocator> {
        &self.hazy
    }

    /// The allocator ledger.
    pub fn allocator(&self) -> &TrackingAllocator {
        &self.allocator
    }

    /// Apply one operation and check invariants.
    pub fn apply(&mut self, op: &Operation) -> Result<(), InvariantViolation> {
        let result = match op {
            Operation::Write { payload } => self.hazy.write(&payload.to_bytes()).map(|_| ()),
            Operation::FeedInbound { payload } => {
                self.hazy.feed_inbound(&payload.to_bytes()).map(|_| ())
            },
            Operation::PeerSend { payload } => {
                let bytes = payload.to_bytes();
                if bytes.is_empty() {
                    Ok(())
                } else {
                    self.peer.send(&bytes).map_err(HazyError::Transport)
                }
            },
            Operation::AdvanceTime { millis } => {
                self.env.advance(u64::from(*millis));
                Ok(())
            },
            Operation::Tick => self.hazy.tick().map(|_| ()),
            Operation::Communicate => {
                let result = self.hazy.communicate(&mut self.transport).map(|_| ());
                self.peer_received.extend(self.peer.drain());
                result
            },
            Operation::Read { capacity_class } => {
                let mut buffer = vec![0u8; read_capacity(*capacity_class)];
                self.hazy.read(&mut buffer).map(|len| {
                    if len > 0 {
                        self.read.push(buffer[..len].to_vec());
                    }
                })
            },
            Operation::PopOutbound => {
                let mut buffer = vec![0u8; hazy_core::MAX_DATAGRAM_SIZE];
                self.hazy.pop_outbound(&mut buffer).map(|len| {
                    if len > 0 {
                        self.peer_received.push(buffer[..len].to_vec());
                    }
                })
            },
            Operation::Reset => {
                self.hazy.reset();
                Ok(())
            },
            Operation::SetConfig { preset } => self.hazy.set_config(preset.config()),
        };

        match result {
            // Short read buffers are deliberate in generated operations
            Err(HazyError::ReadCapacity { .. }) | Ok(()) => {},
            Err(e) if e.is_fatal() => return Err(InvariantViolation::Fatal(e.to_string())),
            Err(e) => tracing::debug!(error = %e, "transient engine error"),
        }

        self.check_invariants()
    }

    /// Advance time in steps, communicating after each, until both
    /// directions are empty or `max_ms` has elapsed.
    pub fn settle(&mut self, step_ms: u64, max_ms: u64) -> Result<(), InvariantViolation> {
        let deadline = self.env.now().saturating_add_ms(max_ms);
        while self.env.now() < deadline {
            self.env.advance(step_ms);
            self.apply(&Operation::Communicate)?;
            if self.hazy.outbound().packets().is_empty()
                && self.hazy.inbound().packets().is_empty()
                && self.peer.pending() == 0
                && self.transport.pending() == 0
            {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Read every datagram waiting in the receive buffer.
    pub fn read_all(&mut self) -> Result<(), InvariantViolation> {
        while self.hazy.pending_read_bytes() > 0 {
            self.apply(&Operation::Read { capacity_class: 3 })?;
        }
        Ok(())
    }

    /// Check resource and capacity invariants.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let outbound = self.hazy.outbound().packets();
        let inbound = self.hazy.inbound().packets();

        for arena_len in [outbound.len(), inbound.len()] {
            if arena_len > WORLD_PACKET_CAPACITY {
                return Err(InvariantViolation::OverCapacity {
                    len: arena_len,
                    capacity: WORLD_PACKET_CAPACITY,
                });
            }
        }

        let buffered = outbound.len() + inbound.len();
        let live = self.allocator.live();
        if live != buffered {
            return Err(InvariantViolation::LeakedBuffers { live, buffered });
        }

        match self.allocator.unknown_frees() {
            0 => Ok(()),
            n => Err(InvariantViolation::UnknownFree(n)),
        }
    }

    /// Snapshot of the externally visible state.
    pub fn observe(&self) -> Observation {
        Observation {
            stats: self.hazy.stats(),
            read: self.read.clone(),
            peer_received: self.peer_received.clone(),
            now_ms: self.env.now().as_millis(),
        }
    }
}
