//! Payload storage for in-flight packets.
//!
//! The arena never allocates payload memory itself. It asks an `Allocator`
//! for a buffer on insert and hands the same buffer back on release, so an
//! embedder can plug in a pool or a budgeted allocator, and tests can verify
//! that every allocation is returned exactly once.

use bytes::BytesMut;
use thiserror::Error;

/// Allocation refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("allocator refused {requested} bytes")]
pub struct AllocError {
    /// Size of the refused request.
    pub requested: usize,
}

/// Source of packet payload buffers.
pub trait Allocator {
    /// Allocate a zeroed buffer of exactly `len` bytes.
    fn allocate(&mut self, len: usize) -> Result<BytesMut, AllocError>;

    /// Return a buffer obtained from `allocate`.
    fn free(&mut self, buffer: BytesMut);
}

/// Plain heap allocation; `free` just drops the buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl Allocator for HeapAllocator {
    fn allocate(&mut self, len: usize) -> Result<BytesMut, AllocError> {
        Ok(BytesMut::zeroed(len))
    }

    fn free(&mut self, buffer: BytesMut) {
        drop(buffer);
    }
}
