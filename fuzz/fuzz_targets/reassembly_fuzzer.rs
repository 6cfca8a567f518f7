//! Fuzz target for the receive buffer
//!
//! # Strategy
//!
//! - Interleaved pushes and pops with arbitrary payloads and destination
//!   sizes against a small ring
//!
//! # Invariants
//!
//! - Entries come out in push order, byte for byte
//! - A refused push leaves the buffer unchanged
//! - An undersized destination consumes exactly one entry
//! - Stored bytes never exceed the ring size

#![no_main]

use std::collections::VecDeque;

use arbitrary::Arbitrary;
use hazy_core::{ReassemblyBuffer, ReassemblyError};
use libfuzzer_sys::fuzz_target;

const RING_SIZE: usize = 512;

#[derive(Debug, Arbitrary)]
enum Op {
    Push(Vec<u8>),
    Pop(u16),
    Clear,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut buffer = ReassemblyBuffer::new(RING_SIZE);
    let mut model: VecDeque<Vec<u8>> = VecDeque::new();

    for op in ops {
        match op {
            Op::Push(payload) => {
                let before = buffer.len();
                match buffer.push(&payload) {
                    Ok(()) => model.push_back(payload),
                    Err(ReassemblyError::Full { .. }) => assert_eq!(buffer.len(), before),
                    Err(e) => panic!("unexpected push error: {e}"),
                }
            },
            Op::Pop(size) => {
                let mut out = vec![0u8; usize::from(size % 600)];
                match buffer.pop(&mut out) {
                    Ok(0) if model.is_empty() => {},
                    Ok(len) => {
                        let expected = model.pop_front();
                        assert_eq!(expected.as_deref(), Some(&out[..len]));
                    },
                    Err(ReassemblyError::Capacity { needed, capacity }) => {
                        let expected = model.pop_front().map(|p| p.len());
                        assert_eq!(expected, Some(needed));
                        assert!(needed > capacity);
                    },
                    Err(e) => panic!("unexpected pop error: {e}"),
                }
            },
            Op::Clear => {
                buffer.clear();
                model.clear();
            },
        }

        assert!(buffer.len() <= RING_SIZE);
    }
});
