//! Engine error types.

use std::io;

use thiserror::Error;

use crate::{
    config::ConfigError, decider::DeciderError, direction::DirectionError, packets::ArenaError,
    reassembly::ReassemblyError,
};

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum HazyError {
    /// Configuration rejected; nothing was changed.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The packet arena reported a defect.
    #[error("packet arena: {0}")]
    Arena(#[from] ArenaError),

    /// The decider found no range for its draw.
    #[error("decider: {0}")]
    Decider(#[from] DeciderError),

    /// The receive buffer refused an entry.
    #[error("receive buffer: {0}")]
    Reassembly(#[from] ReassemblyError),

    /// The next datagram does not fit the caller's buffer. It was discarded.
    #[error("datagram of {needed} bytes does not fit a {capacity} byte buffer")]
    ReadCapacity {
        /// Datagram length.
        needed: usize,
        /// Caller's buffer length.
        capacity: usize,
    },

    /// The underlying transport failed.
    #[error("transport: {0}")]
    Transport(#[from] io::Error),
}

impl HazyError {
    /// Returns true if this error is fatal (unrecoverable).
    ///
    /// Fatal errors indicate a broken invariant or a caller bug, such as a
    /// read buffer smaller than the datagrams it is meant to hold. Transient
    /// errors leave the engine usable and the caller may carry on.
    pub fn is_fatal(&self) -> bool {
        match self {
            // Fatal: engine defects and caller misuse
            Self::Decider(_) | Self::ReadCapacity { .. } => true,
            Self::Arena(e) => e.is_fatal(),

            // Transient: capacity, bad configuration or I/O
            Self::Config(_) | Self::Reassembly(_) | Self::Transport(_) => false,
        }
    }
}

impl From<DirectionError> for HazyError {
    fn from(error: DirectionError) -> Self {
        match error {
            DirectionError::Decider(e) => Self::Decider(e),
            DirectionError::Arena(e) => Self::Arena(e),
        }
    }
}
