//! Fixed-capacity arena of scheduled packets.
//!
//! # Invariants
//!
//! - A slot is occupied iff it holds a packet; `len()` equals the number of
//!   occupied slots and never exceeds `capacity()`
//! - The arena never grows after construction
//! - Every buffer obtained from the allocator is returned exactly once, by
//!   `release`, `clear` or drop
//! - Handles carry the slot generation, so releasing a free slot or a slot
//!   that has since been reused is rejected instead of freeing someone else's
//!   buffer
//!
//! Lookup is a linear scan. Capacity is small and fixed, and the scan is
//! private to this module, so a free list or heap can replace it without
//! touching callers.

use std::fmt;

use bytes::BytesMut;
use thiserror::Error;

use crate::{
    allocator::{AllocError, Allocator},
    time::Timestamp,
};

/// Number of slots in a default arena.
pub const DEFAULT_CAPACITY: usize = 256;

/// Errors from arena operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// Every slot is occupied.
    #[error("packet arena full ({capacity} slots)")]
    Overflow {
        /// Arena capacity.
        capacity: usize,
    },

    /// The handle does not name an occupied slot.
    #[error("stale or free slot {0}")]
    StaleSlot(SlotId),

    /// The allocator refused the payload buffer.
    #[error(transparent)]
    Allocation(#[from] AllocError),
}

impl ArenaError {
    /// Returns true if this error indicates a broken invariant.
    ///
    /// Overflow is a capacity condition: the packet is dropped and the arena
    /// stays usable.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Overflow { .. } => false,
            Self::StaleSlot(_) | Self::Allocation(_) => true,
        }
    }
}

/// Handle to an occupied slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    index: usize,
    generation: u32,
}

impl SlotId {
    /// Slot position, for diagnostics.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// One buffered payload.
#[derive(Debug)]
pub struct Packet {
    payload: BytesMut,
    due: Timestamp,
    created: Timestamp,
    sequence: u64,
    index: usize,
}

impl Packet {
    /// Payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Always false: empty payloads are never stored.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// When the packet becomes eligible for delivery.
    pub fn due(&self) -> Timestamp {
        self.due
    }

    /// When the packet entered the arena.
    pub fn created(&self) -> Timestamp {
        self.created
    }

    /// Slot position, for diagnostics.
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    packet: Option<Packet>,
}

/// Fixed-size pool of in-flight packets.
#[derive(Debug)]
pub struct PacketArena<A: Allocator> {
    slots: Vec<Slot>,
    live: usize,
    allocator: A,
    last_scheduled: Option<Timestamp>,
    next_sequence: u64,
}

impl<A: Allocator> PacketArena<A> {
    /// Arena with `DEFAULT_CAPACITY` slots.
    pub fn new(allocator: A) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, allocator)
    }

    /// Arena with exactly `capacity` slots.
    pub fn with_capacity(capacity: usize, allocator: A) -> Self {
        let slots = (0..capacity).map(|_| Slot::default()).collect();
        Self { slots, live: 0, allocator, last_scheduled: None, next_sequence: 0 }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.live
    }

    /// True if no packet is buffered.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// True if the next insert would overflow.
    pub fn is_full(&self) -> bool {
        self.live == self.slots.len()
    }

    /// Due time of the most recent ordered insertion.
    pub fn last_scheduled(&self) -> Option<Timestamp> {
        self.last_scheduled
    }

    /// Earliest due time among buffered packets.
    pub fn next_due(&self) -> Option<Timestamp> {
        self.occupied().map(|(_, p)| p.due).min()
    }

    /// The allocator backing payload buffers.
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Store a copy of `payload`, due at `due`, and advance the ordering
    /// watermark to `due`.
    ///
    /// Returns `Ok(None)` for an empty payload, which is not stored.
    pub fn insert(
        &mut self,
        payload: &[u8],
        due: Timestamp,
        now: Timestamp,
    ) -> Result<Option<SlotId>, ArenaError> {
        let slot = self.store(payload, due, now)?;
        if slot.is_some() {
            self.last_scheduled = Some(due);
        }
        Ok(slot)
    }

    /// Like `insert`, but leaves the ordering watermark untouched so later
    /// ordered traffic may overtake this packet.
    pub fn insert_unordered(
        &mut self,
        payload: &[u8],
        due: Timestamp,
        now: Timestamp,
    ) -> Result<Option<SlotId>, ArenaError> {
        self.store(payload, due, now)
    }

    /// The most overdue packet at `now`.
    ///
    /// Ties on due time go to the packet inserted first.
    pub fn find_due(&self, now: Timestamp) -> Option<SlotId> {
        self.occupied()
            .filter(|(_, p)| p.due <= now)
            .min_by_key(|(_, p)| (p.due, p.sequence))
            .map(|(index, _)| SlotId { index, generation: self.slots[index].generation })
    }

    /// The packet behind `slot`, if the handle is current.
    pub fn get(&self, slot: SlotId) -> Option<&Packet> {
        self.slots
            .get(slot.index)
            .filter(|s| s.generation == slot.generation)
            .and_then(|s| s.packet.as_ref())
    }

    /// Return the packet's buffer to the allocator and free the slot.
    pub fn release(&mut self, slot: SlotId) -> Result<(), ArenaError> {
        let entry = self
            .slots
            .get_mut(slot.index)
            .filter(|s| s.generation == slot.generation && s.packet.is_some())
            .ok_or(ArenaError::StaleSlot(slot))?;

        if let Some(packet) = entry.packet.take() {
            entry.generation = entry.generation.wrapping_add(1);
            self.live -= 1;
            self.allocator.free(packet.payload);
        }
        Ok(())
    }

    /// Release every buffered packet and forget the ordering watermark.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            if let Some(packet) = slot.packet.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.allocator.free(packet.payload);
            }
        }
        self.live = 0;
        self.last_scheduled = None;
    }

    fn store(
        &mut self,
        payload: &[u8],
        due: Timestamp,
        now: Timestamp,
    ) -> Result<Option<SlotId>, ArenaError> {
        if payload.is_empty() {
            return Ok(None);
        }

        let index = self
            .slots
            .iter()
            .position(|s| s.packet.is_none())
            .ok_or(ArenaError::Overflow { capacity: self.slots.len() })?;

        let mut buffer = self.allocator.allocate(payload.len())?;
        buffer.copy_from_slice(payload);

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let slot = &mut self.slots[index];
        slot.packet = Some(Packet { payload: buffer, due, created: now, sequence, index });
        self.live += 1;

        Ok(Some(SlotId { index, generation: slot.generation }))
    }

    fn occupied(&self) -> impl Iterator<Item = (usize, &Packet)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| s.packet.as_ref().map(|p| (i, p)))
    }
}

impl<A: Allocator> Drop for PacketArena<A> {
    fn drop(&mut self) {
        self.clear();
    }
}
