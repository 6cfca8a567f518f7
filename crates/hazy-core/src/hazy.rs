//! The emulation engine: two directions and a receive buffer.
//!
//! ```text
//!   application ──write──► outbound Direction ──communicate──► transport
//!   application ◄──read─── receive buffer ◄──tick── inbound Direction ◄── transport
//! ```
//!
//! The engine is synchronous and does nothing on its own. Packets only move
//! when the caller invokes `tick` or `communicate`; a stalled caller delays
//! delivery but never loses queued packets.

use tracing::{debug, info, warn};

use crate::{
    allocator::{Allocator, HeapAllocator},
    config::HazyConfig,
    direction::{Direction, DirectionStats, Side, WriteOutcome},
    env::Environment,
    error::HazyError,
    packets::DEFAULT_CAPACITY,
    reassembly::{DEFAULT_RECEIVE_BUFFER, ReassemblyBuffer, ReassemblyError},
    time::Timestamp,
    transport::DatagramTransport,
};

/// Largest datagram pulled from the transport.
pub const MAX_DATAGRAM_SIZE: usize = 1200;

/// Receive calls made per `communicate`.
pub const MAX_RECEIVES_PER_TICK: usize = 30;

/// What one `communicate` call moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Exchange {
    /// Inbound packets moved into the receive buffer.
    pub delivered: usize,
    /// Outbound packets handed to the transport.
    pub sent: usize,
    /// Datagrams pulled from the transport.
    pub received: usize,
}

/// Counters for the whole engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HazyStats {
    /// Application to network.
    pub outbound: DirectionStats,
    /// Network to application.
    pub inbound: DirectionStats,
    /// Due inbound packets lost to a full receive buffer.
    pub reassembly_dropped: u64,
}

/// Network condition emulator for one datagram flow.
#[derive(Debug)]
pub struct Hazy<E: Environment, A: Allocator + Clone = HeapAllocator> {
    env: E,
    config: HazyConfig,
    outbound: Direction<A>,
    inbound: Direction<A>,
    reassembly: ReassemblyBuffer,
    reassembly_dropped: u64,
}

impl<E: Environment> Hazy<E> {
    /// Create an engine backed by the heap allocator.
    pub fn new(env: E, config: HazyConfig) -> Result<Self, HazyError> {
        Self::with_allocator(env, config, HeapAllocator)
    }
}

impl<E: Environment, A: Allocator + Clone> Hazy<E, A> {
    /// Create an engine drawing payload buffers from `allocator`.
    pub fn with_allocator(env: E, config: HazyConfig, allocator: A) -> Result<Self, HazyError> {
        Self::with_capacity(env, config, allocator, DEFAULT_CAPACITY, DEFAULT_RECEIVE_BUFFER)
    }

    /// Create an engine with explicit arena and receive buffer sizes.
    pub fn with_capacity(
        env: E,
        config: HazyConfig,
        allocator: A,
        packet_capacity: usize,
        receive_buffer: usize,
    ) -> Result<Self, HazyError> {
        config.validate()?;

        let outbound_seed = env.random_u64();
        let inbound_seed = env.random_u64();
        let outbound = Direction::with_capacity(
            Side::Outbound,
            &config.outbound,
            packet_capacity,
            allocator.clone(),
            outbound_seed,
        )?;
        let inbound = Direction::with_capacity(
            Side::Inbound,
            &config.inbound,
            packet_capacity,
            allocator,
            inbound_seed,
        )?;

        info!(packet_capacity, receive_buffer, "hazy engine created");

        Ok(Self {
            env,
            config,
            outbound,
            inbound,
            reassembly: ReassemblyBuffer::new(receive_buffer),
            reassembly_dropped: 0,
        })
    }

    /// Queue an application datagram on the outbound direction.
    pub fn write(&mut self, payload: &[u8]) -> Result<WriteOutcome, HazyError> {
        let now = self.env.now();
        Ok(self.outbound.write(payload, now)?)
    }

    /// Queue a datagram received from the network on the inbound direction.
    pub fn feed_inbound(&mut self, payload: &[u8]) -> Result<WriteOutcome, HazyError> {
        let now = self.env.now();
        Ok(self.inbound.write(payload, now)?)
    }

    /// Advance both directions and move due inbound packets into the
    /// receive buffer.
    ///
    /// Returns the number of packets moved. Packets that do not fit the
    /// receive buffer are dropped and counted, not reported as errors.
    pub fn tick(&mut self) -> Result<usize, HazyError> {
        let now = self.env.now();
        self.tick_at(now)
    }

    /// Pop one delivered inbound datagram into `out`.
    ///
    /// Returns `Ok(0)` if nothing is waiting. A datagram longer than `out`
    /// is discarded and reported as `ReadCapacity`.
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize, HazyError> {
        match self.reassembly.pop(out) {
            Ok(len) => Ok(len),
            Err(ReassemblyError::Capacity { needed, capacity }) => {
                warn!(needed, capacity, "read buffer too small, datagram discarded");
                Err(HazyError::ReadCapacity { needed, capacity })
            },
            Err(e) => Err(e.into()),
        }
    }

    /// One emulation step against `transport`.
    ///
    /// Ticks, sends every due outbound packet, then pulls up to
    /// `MAX_RECEIVES_PER_TICK` datagrams into the inbound direction. The
    /// first transport error stops the step and is returned; packets not yet
    /// sent stay queued for the next call.
    pub fn communicate<T: DatagramTransport>(
        &mut self,
        transport: &mut T,
    ) -> Result<Exchange, HazyError> {
        let now = self.env.now();
        let delivered = self.tick_at(now)?;

        let sent = self.outbound.deliver_due(now, |payload| {
            transport.send(payload).map_err(HazyError::Transport)
        })?;

        let mut datagram = [0u8; MAX_DATAGRAM_SIZE];
        let mut received = 0;
        for _ in 0..MAX_RECEIVES_PER_TICK {
            let len = transport.receive(&mut datagram)?;
            if len == 0 {
                break;
            }
            self.inbound.write(&datagram[..len], now)?;
            received += 1;
        }

        Ok(Exchange { delivered, sent, received })
    }

    /// Pop one due outbound packet into `out`, for embedders that move
    /// datagrams themselves instead of calling `communicate`.
    ///
    /// Returns `Ok(0)` if nothing is due. The packet is released even when
    /// it does not fit `out`.
    pub fn pop_outbound(&mut self, out: &mut [u8]) -> Result<usize, HazyError> {
        let now = self.env.now();
        let capacity = out.len();
        let popped = self.outbound.deliver_one(now, |payload| {
            let Some(dest) = out.get_mut(..payload.len()) else {
                return Ok::<_, HazyError>(Err(payload.len()));
            };
            dest.copy_from_slice(payload);
            Ok(Ok(payload.len()))
        })?;

        match popped {
            None => Ok(0),
            Some(Ok(len)) => Ok(len),
            Some(Err(needed)) => Err(HazyError::ReadCapacity { needed, capacity }),
        }
    }

    /// Discard every queued packet and every undelivered datagram.
    ///
    /// Configuration and counters are kept.
    pub fn reset(&mut self) {
        self.outbound.reset();
        self.inbound.reset();
        self.reassembly.clear();
        debug!("hazy engine reset");
    }

    /// Replace the configuration of both directions.
    ///
    /// The whole configuration is validated first; on error nothing changes.
    pub fn set_config(&mut self, config: HazyConfig) -> Result<(), HazyError> {
        config.validate()?;
        self.outbound.set_config(&config.outbound)?;
        self.inbound.set_config(&config.inbound)?;
        self.config = config;
        info!("hazy configuration replaced");
        Ok(())
    }

    /// Current configuration.
    pub fn config(&self) -> &HazyConfig {
        &self.config
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Application to network direction.
    pub fn outbound(&self) -> &Direction<A> {
        &self.outbound
    }

    /// Network to application direction.
    pub fn inbound(&self) -> &Direction<A> {
        &self.inbound
    }

    /// Bytes waiting in the receive buffer, length prefixes included.
    pub fn pending_read_bytes(&self) -> usize {
        self.reassembly.len()
    }

    /// Counters.
    pub fn stats(&self) -> HazyStats {
        HazyStats {
            outbound: *self.outbound.stats(),
            inbound: *self.inbound.stats(),
            reassembly_dropped: self.reassembly_dropped,
        }
    }

    fn tick_at(&mut self, now: Timestamp) -> Result<usize, HazyError> {
        self.outbound.update(now);
        self.inbound.update(now);

        let reassembly = &mut self.reassembly;
        let mut refused = 0;
        let taken = self.inbound.deliver_due(now, |payload| {
            if let Err(e) = reassembly.push(payload) {
                refused += 1;
                warn!(side = %Side::Inbound, error = %e, "receive buffer full, packet dropped");
            }
            Ok::<_, HazyError>(())
        })?;
        self.reassembly_dropped += refused as u64;

        Ok(taken - refused)
    }
}
