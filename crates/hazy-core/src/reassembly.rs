//! Bounded byte ring holding delivered inbound datagrams.
//!
//! Each entry is a little-endian `u16` length followed by the payload. When
//! an entry does not fit, the newest datagram is refused; the buffer never
//! blocks and never evicts older entries.

use std::collections::VecDeque;

use bytes::Buf;
use thiserror::Error;

/// Default ring size in bytes.
pub const DEFAULT_RECEIVE_BUFFER: usize = 32 * 1024;

const HEADER_SIZE: usize = 2;

/// Errors from the reassembly buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReassemblyError {
    /// Not enough room for the entry.
    #[error("receive buffer full: need {needed} bytes, {available} available")]
    Full {
        /// Bytes the entry needs including its header.
        needed: usize,
        /// Free bytes in the ring.
        available: usize,
    },

    /// Payload length does not fit the length prefix.
    #[error("payload of {0} bytes exceeds the length prefix")]
    Oversized(usize),

    /// The stored entry is larger than the destination.
    #[error("entry of {needed} bytes does not fit a {capacity} byte buffer")]
    Capacity {
        /// Entry length.
        needed: usize,
        /// Destination length.
        capacity: usize,
    },
}

/// Length-prefixed datagram queue over a fixed byte budget.
#[derive(Debug, Clone)]
pub struct ReassemblyBuffer {
    ring: VecDeque<u8>,
    capacity: usize,
}

impl ReassemblyBuffer {
    /// Ring of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self { ring: VecDeque::with_capacity(capacity), capacity }
    }

    /// Bytes currently stored, headers included.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// True if no entry is waiting.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Free bytes.
    pub fn available(&self) -> usize {
        self.capacity - self.ring.len()
    }

    /// Append one entry.
    pub fn push(&mut self, payload: &[u8]) -> Result<(), ReassemblyError> {
        let len = u16::try_from(payload.len())
            .map_err(|_| ReassemblyError::Oversized(payload.len()))?;
        let needed = HEADER_SIZE + payload.len();
        if self.available() < needed {
            return Err(ReassemblyError::Full { needed, available: self.available() });
        }

        self.ring.extend(len.to_le_bytes());
        self.ring.extend(payload);
        Ok(())
    }

    /// Pop one entry into `out`.
    ///
    /// Returns `Ok(0)` when empty. An entry longer than `out` is consumed and
    /// discarded, and reported as `Capacity`.
    pub fn pop(&mut self, out: &mut [u8]) -> Result<usize, ReassemblyError> {
        if self.ring.len() < HEADER_SIZE {
            return Ok(0);
        }

        let len = usize::from(self.ring.get_u16_le());
        if len > out.len() {
            self.ring.advance(len);
            return Err(ReassemblyError::Capacity { needed: len, capacity: out.len() });
        }

        self.ring.copy_to_slice(&mut out[..len]);
        Ok(len)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

impl Default for ReassemblyBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_RECEIVE_BUFFER)
    }
}
