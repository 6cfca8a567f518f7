//! Model-based testing support.
//!
//! Operations are generated by proptest or the fuzzer and applied to a
//! `HazyWorld`, which checks the engine's invariants after each step.

mod operation;
mod world;

pub use operation::{Operation, Preset, SmallPayload, read_capacity};
pub use world::{
    HazyWorld, InvariantViolation, Observation, WORLD_PACKET_CAPACITY, WORLD_RECEIVE_BUFFER,
};
