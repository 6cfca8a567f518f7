//! Relay error types.

use std::io;

use hazy_core::HazyError;
use thiserror::Error;

/// Errors that stop the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Socket setup or I/O failed.
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    /// The emulation engine failed.
    #[error("emulation error: {0}")]
    Hazy(#[from] HazyError),
}
