//! Hazy: a hostile network condition emulator.
//!
//! Hazy sits between an application and a datagram transport and makes the
//! network behave badly on purpose: latency that drifts, per-packet jitter,
//! drops, duplicates, reordering, garbled payloads and whole windows of loss.
//!
//! # Design
//!
//! The engine is Sans-IO. It owns no sockets, timers or threads; the caller
//! supplies an `Environment` for time and seed entropy and drives the engine
//! by calling `tick` or `communicate`. Each direction draws from its own
//! seeded generator, so an emulation run is reproducible from the
//! environment's seed.
//!
//! # Invariants
//!
//! - Ordered traffic within one direction is delivered in write order; only
//!   packets chosen for reordering may overtake or be overtaken
//! - Every payload buffer taken from the allocator is returned exactly once
//! - Capacity exhaustion drops packets and is logged; it is never fatal

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod allocator;
pub mod config;
pub mod decider;
pub mod direction;
pub mod env;
pub mod error;
pub mod hazy;
pub mod latency;
pub mod packets;
pub mod reassembly;
pub mod time;
pub mod transport;

pub use allocator::{AllocError, Allocator, HeapAllocator};
pub use config::{
    BurstConfig, ConfigError, DeciderConfig, DirectionConfig, HazyConfig, ImpairmentTuning,
    LatencyConfig,
};
pub use decider::{Decider, DeciderError, Decision};
pub use direction::{BurstPhase, Direction, DirectionError, DirectionStats, Side, WriteOutcome};
pub use env::Environment;
pub use error::HazyError;
pub use hazy::{Exchange, Hazy, HazyStats, MAX_DATAGRAM_SIZE, MAX_RECEIVES_PER_TICK};
pub use latency::{LatencyModel, LatencyPhase};
pub use packets::{ArenaError, DEFAULT_CAPACITY, Packet, PacketArena, SlotId};
pub use reassembly::{DEFAULT_RECEIVE_BUFFER, ReassemblyBuffer, ReassemblyError};
pub use time::Timestamp;
pub use transport::{DatagramTransport, HazyTransport};
