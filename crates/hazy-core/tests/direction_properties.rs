//! Property-based tests for the per-direction pipeline.
//!
//! These drive the decider, the packet arena and a whole direction with
//! generated configurations and write patterns, and check the invariants
//! that must hold for every seed.

use hazy_core::{
    ArenaError, BurstConfig, BurstPhase, Decider, DeciderConfig, Decision, Direction,
    DirectionConfig, HeapAllocator, LatencyConfig, PacketArena, Side, SlotId, Timestamp,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn weights() -> impl Strategy<Value = DeciderConfig> {
    (0u32..20, 0u32..20, 0u32..20, 0u32..20, 0u32..20)
        .prop_filter("at least one outcome", |(a, b, c, d, e)| a + b + c + d + e > 0)
        .prop_map(|(original, drop, duplicate, reorder, tamper)| DeciderConfig {
            original_chance: original,
            drop_chance: drop,
            duplicate_chance: duplicate,
            reorder_chance: reorder,
            tamper_chance: tamper,
        })
}

fn latency() -> impl Strategy<Value = LatencyConfig> {
    (0u64..200, 0u64..200, 0u64..60).prop_map(|(min, spread, jitter)| LatencyConfig {
        min_latency_ms: min,
        max_latency_ms: min + spread,
        jitter_ms: jitter,
    })
}

fn chance(config: &DeciderConfig, decision: Decision) -> u32 {
    match decision {
        Decision::Original => config.original_chance,
        Decision::Drop => config.drop_chance,
        Decision::Duplicate => config.duplicate_chance,
        Decision::Reorder => config.reorder_chance,
        Decision::Tamper => config.tamper_chance,
    }
}

#[test]
fn prop_zero_weight_never_selected() {
    proptest!(|(config in weights(), seed in any::<u64>())| {
        let decider = Decider::new(&config).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        for _ in 0..500 {
            let decision = decider.decide(&mut rng).unwrap();
            prop_assert!(chance(&config, decision) > 0, "{decision} has zero weight");
        }
    });
}

#[test]
fn prop_ordered_traffic_keeps_write_order() {
    proptest!(|(
        seed in any::<u64>(),
        mut decider in weights(),
        latency in latency(),
        gaps in prop::collection::vec(0u64..40, 1..200),
    )| {
        // Reordering is the only treatment allowed to break write order;
        // tampering would garble the sequence numbers
        decider.reorder_chance = 0;
        decider.tamper_chance = 0;
        decider.original_chance += 1;
        let config = DirectionConfig { decider, latency, ..DirectionConfig::passthrough() };
        let mut direction = Direction::new(Side::Outbound, &config, HeapAllocator, seed).unwrap();

        let mut delivered = Vec::new();
        let mut collect = |payload: &[u8]| -> Result<(), ArenaError> {
            delivered.push(u32::from_be_bytes(payload.try_into().unwrap()));
            Ok(())
        };

        let mut now = Timestamp::ZERO;
        for (i, gap) in gaps.iter().enumerate() {
            now = now.saturating_add_ms(*gap);
            direction.update(now);
            direction.write(&u32::try_from(i).unwrap().to_be_bytes(), now).unwrap();
            direction.deliver_due(now, &mut collect).unwrap();
        }
        direction.deliver_due(now.saturating_add_ms(1_000_000), &mut collect).unwrap();

        prop_assert!(direction.packets().is_empty());
        prop_assert!(
            delivered.windows(2).all(|w| w[0] <= w[1]),
            "delivered out of order: {delivered:?}"
        );
    });
}

#[derive(Debug, Clone)]
enum ArenaOp {
    Insert { len: usize, due: u64 },
    Release { pick: usize },
    ReleaseDue { now: u64 },
}

fn arena_op() -> impl Strategy<Value = ArenaOp> {
    prop_oneof![
        3 => (0usize..64, 0u64..1_000).prop_map(|(len, due)| ArenaOp::Insert { len, due }),
        1 => any::<usize>().prop_map(|pick| ArenaOp::Release { pick }),
        1 => (0u64..1_000).prop_map(|now| ArenaOp::ReleaseDue { now }),
    ]
}

#[test]
fn prop_arena_capacity() {
    proptest!(|(capacity in 1usize..16, ops in prop::collection::vec(arena_op(), 0..300))| {
        let mut arena = PacketArena::with_capacity(capacity, HeapAllocator);
        let mut held: Vec<SlotId> = Vec::new();

        for op in ops {
            match op {
                ArenaOp::Insert { len, due } => {
                    let full = arena.len() == capacity;
                    let due = Timestamp::from_millis(due);
                    match arena.insert(&vec![7u8; len], due, Timestamp::ZERO) {
                        Err(ArenaError::Overflow { .. }) => prop_assert!(full && len > 0),
                        Ok(Some(slot)) => {
                            prop_assert!(!full);
                            held.push(slot);
                        },
                        Ok(None) => prop_assert_eq!(len, 0),
                        Err(e) => prop_assert!(false, "unexpected {e}"),
                    }
                },
                ArenaOp::Release { pick } => {
                    if !held.is_empty() {
                        let slot = held.swap_remove(pick % held.len());
                        arena.release(slot).unwrap();
                        prop_assert_eq!(arena.release(slot), Err(ArenaError::StaleSlot(slot)));
                    }
                },
                ArenaOp::ReleaseDue { now } => {
                    let now = Timestamp::from_millis(now);
                    while let Some(slot) = arena.find_due(now) {
                        prop_assert!(arena.get(slot).unwrap().due() <= now);
                        arena.release(slot).unwrap();
                        held.retain(|s| *s != slot);
                    }
                },
            }

            prop_assert!(arena.len() <= capacity);
            prop_assert_eq!(arena.len(), held.len());
        }
    });
}

#[test]
fn prop_set_config_is_idempotent() {
    proptest!(|(
        seed in any::<u64>(),
        decider in weights(),
        latency in latency(),
    )| {
        let config = DirectionConfig { decider, latency, ..DirectionConfig::recommended() };

        let initial = DirectionConfig::worst_case();

        let mut once = Direction::new(Side::Inbound, &initial, HeapAllocator, seed).unwrap();
        once.set_config(&config).unwrap();

        let mut twice = Direction::new(Side::Inbound, &initial, HeapAllocator, seed).unwrap();
        twice.set_config(&config).unwrap();
        twice.set_config(&config).unwrap();

        prop_assert_eq!(once.decider(), twice.decider());
        prop_assert_eq!(once.latency().config(), twice.latency().config());
        prop_assert_eq!(once.latency().latency_ms(), twice.latency().latency_ms());
    });
}

#[test]
fn prop_burst_blocks_every_write() {
    proptest!(|(
        seed in any::<u64>(),
        decider in weights(),
        writes in prop::collection::vec((0usize..32, 0u64..100), 1..100),
    )| {
        let burst = BurstConfig {
            burst_span_ms: 1,
            burst_min_ms: 10_000,
            inter_burst_span_ms: 0,
            inter_burst_min_ms: 0,
        };
        let config = DirectionConfig { decider, burst, ..DirectionConfig::passthrough() };
        let mut direction = Direction::new(Side::Outbound, &config, HeapAllocator, seed).unwrap();

        direction.update(Timestamp::ZERO);
        prop_assert_eq!(direction.phase(), BurstPhase::PacketDropBurst);

        for (len, at) in writes {
            let before = direction.packets().len();
            direction.write(&vec![1u8; len], Timestamp::from_millis(at)).unwrap();
            prop_assert_eq!(direction.packets().len(), before);
        }
    });
}

#[test]
fn drop_only_never_inserts() {
    let config = DirectionConfig {
        decider: DeciderConfig {
            original_chance: 0,
            drop_chance: 1,
            duplicate_chance: 0,
            reorder_chance: 0,
            tamper_chance: 0,
        },
        ..DirectionConfig::passthrough()
    };
    let mut direction = Direction::new(Side::Outbound, &config, HeapAllocator, 7).unwrap();

    for i in 0..1_000 {
        direction.write(b"x", Timestamp::from_millis(i)).unwrap();
    }

    assert_eq!(direction.stats().scheduled, 0);
    assert_eq!(direction.stats().dropped, 1_000);
}
