//! Fuzz target for the whole emulation engine
//!
//! Drive an engine with arbitrary embedder operations under every preset
//!
//! # Strategy
//!
//! - Operation sequences: writes, peer traffic, clock jumps, reads with
//!   undersized buffers, resets and live reconfiguration
//! - Small arenas so overflow is routinely hit
//! - Tracking allocator so every buffer is accounted for
//!
//! # Invariants
//!
//! - NEVER panic on any operation sequence
//! - Live buffers always equal packets held by both arenas
//! - No buffer is freed twice
//! - Arenas never exceed their capacity
//! - Only caller misuse surfaces as a fatal error
//! - Dropping the engine returns every buffer

#![no_main]

use arbitrary::Arbitrary;
use hazy_harness::{HazyWorld, Operation, Preset};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u64,
    preset: Preset,
    operations: Vec<Operation>,
}

fuzz_target!(|input: Input| {
    let Ok(mut world) = HazyWorld::new(input.seed, input.preset) else {
        return;
    };

    for op in &input.operations {
        if let Err(violation) = world.apply(op) {
            panic!("{violation} after {op:?}");
        }
    }

    if let Err(violation) = world.settle(10, 5_000).and_then(|()| world.read_all()) {
        panic!("{violation} while settling");
    }

    let allocator = world.allocator().clone();
    drop(world);
    assert_eq!(allocator.live(), 0, "buffers outlived the engine");
});
