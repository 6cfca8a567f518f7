//! Deterministic simulation harness for Hazy testing.
//!
//! In-memory implementations of the `Environment`, `DatagramTransport` and
//! `Allocator` seams, so an emulation run is driven by a manual clock and a
//! seeded RNG and can be replayed exactly.
//!
//! # Model-Based Testing
//!
//! The `model` module drives a real engine with randomly generated
//! operations and checks its resource and capacity invariants after every
//! step. The same operations feed the fuzz target.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod sim_env;
pub mod sim_transport;
pub mod tracking_allocator;

pub use model::{HazyWorld, InvariantViolation, Observation, Operation, Preset, SmallPayload};
pub use sim_env::SimEnv;
pub use sim_transport::SimTransport;
pub use tracking_allocator::TrackingAllocator;
