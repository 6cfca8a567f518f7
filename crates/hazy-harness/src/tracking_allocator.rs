//! Allocator that audits every payload buffer.
//!
//! Records the address of each live buffer so a test can assert that the
//! engine returns every allocation exactly once and never hands back a
//! buffer it did not get from this allocator.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use bytes::BytesMut;
use hazy_core::{AllocError, Allocator};

#[derive(Debug, Default)]
struct Ledger {
    live: HashSet<usize>,
    allocations: u64,
    frees: u64,
    unknown_frees: u64,
    limit: Option<usize>,
}

/// Shared-ledger allocator. Clones account into the same ledger.
#[derive(Debug, Clone, Default)]
pub struct TrackingAllocator {
    ledger: Arc<Mutex<Ledger>>,
}

impl TrackingAllocator {
    /// Allocator without a limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator that refuses requests once `limit` buffers are live.
    pub fn with_limit(limit: usize) -> Self {
        let allocator = Self::default();
        allocator.ledger().limit = Some(limit);
        allocator
    }

    /// Buffers currently allocated and not yet freed.
    pub fn live(&self) -> usize {
        self.ledger().live.len()
    }

    /// Total successful allocations.
    pub fn allocations(&self) -> u64 {
        self.ledger().allocations
    }

    /// Total frees of known buffers.
    pub fn frees(&self) -> u64 {
        self.ledger().frees
    }

    /// Frees of buffers this allocator never handed out, or handed out and
    /// already took back.
    pub fn unknown_frees(&self) -> u64 {
        self.ledger().unknown_frees
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Allocator for TrackingAllocator {
    fn allocate(&mut self, len: usize) -> Result<BytesMut, AllocError> {
        let mut ledger = self.ledger();
        if ledger.limit.is_some_and(|limit| ledger.live.len() >= limit) {
            return Err(AllocError { requested: len });
        }

        let buffer = BytesMut::zeroed(len);
        ledger.live.insert(buffer.as_ptr().addr());
        ledger.allocations += 1;
        Ok(buffer)
    }

    fn free(&mut self, buffer: BytesMut) {
        let mut ledger = self.ledger();
        if ledger.live.remove(&buffer.as_ptr().addr()) {
            ledger.frees += 1;
        } else {
            ledger.unknown_frees += 1;
            tracing::error!(len = buffer.len(), "free of unknown buffer");
        }
    }
}
