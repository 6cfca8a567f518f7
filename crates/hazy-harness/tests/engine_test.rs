//! End-to-end engine scenarios on simulated collaborators.

use hazy_core::{
    BurstConfig, BurstPhase, DatagramTransport, DeciderConfig, DirectionConfig, Hazy, HazyConfig,
    HazyError, HazyTransport, LatencyConfig, WriteOutcome,
};
use hazy_harness::{SimEnv, SimTransport, TrackingAllocator};

fn only_original() -> DeciderConfig {
    DeciderConfig {
        original_chance: 1,
        drop_chance: 0,
        duplicate_chance: 0,
        reorder_chance: 0,
        tamper_chance: 0,
    }
}

fn only_drop() -> DeciderConfig {
    DeciderConfig { original_chance: 0, drop_chance: 1, ..only_original() }
}

fn fixed(latency_ms: u64) -> DirectionConfig {
    DirectionConfig {
        decider: only_original(),
        latency: LatencyConfig {
            min_latency_ms: latency_ms,
            max_latency_ms: latency_ms,
            jitter_ms: 0,
        },
        ..DirectionConfig::passthrough()
    }
}

fn engine(
    env: &SimEnv,
    config: HazyConfig,
) -> (Hazy<SimEnv, TrackingAllocator>, TrackingAllocator) {
    let allocator = TrackingAllocator::new();
    let hazy = Hazy::with_allocator(env.clone(), config, allocator.clone()).unwrap();
    (hazy, allocator)
}

#[test]
fn ping_passes_through_unchanged() {
    let env = SimEnv::with_seed(1);
    let (mut hazy, _) = engine(&env, HazyConfig::symmetric(fixed(0)));

    hazy.feed_inbound(b"ping").unwrap();
    env.advance(1);
    assert_eq!(hazy.tick().unwrap(), 1);

    let mut buf = [0u8; 64];
    assert_eq!(hazy.read(&mut buf).unwrap(), 4);
    assert_eq!(&buf[..4], b"ping");
    assert_eq!(hazy.read(&mut buf).unwrap(), 0);
}

#[test]
fn inbound_round_trip_after_latency() {
    let env = SimEnv::with_seed(2);
    let (mut hazy, _) = engine(&env, HazyConfig::symmetric(fixed(40)));
    let payload: Vec<u8> = (0..=255).collect();

    hazy.feed_inbound(&payload).unwrap();

    env.advance(39);
    hazy.tick().unwrap();
    let mut buf = [0u8; 512];
    assert_eq!(hazy.read(&mut buf).unwrap(), 0);

    env.advance(1);
    hazy.tick().unwrap();
    let len = hazy.read(&mut buf).unwrap();
    assert_eq!(&buf[..len], payload.as_slice());
}

#[test]
fn drop_only_never_allocates() {
    let env = SimEnv::with_seed(3);
    let config = DirectionConfig { decider: only_drop(), ..DirectionConfig::passthrough() };
    let (mut hazy, allocator) = engine(&env, HazyConfig::symmetric(config));

    for _ in 0..1_000 {
        assert_eq!(hazy.write(b"x").unwrap(), WriteOutcome::Dropped);
        env.advance(1);
    }

    assert_eq!(allocator.allocations(), 0);
    assert_eq!(hazy.stats().outbound.dropped, 1_000);
}

#[test]
fn zero_burst_span_never_bursts() {
    let env = SimEnv::with_seed(4);
    let burst = BurstConfig {
        burst_span_ms: 0,
        burst_min_ms: 1_000,
        inter_burst_span_ms: 10,
        inter_burst_min_ms: 10,
    };
    let config = DirectionConfig { burst, ..fixed(0) };
    let (mut hazy, _) = engine(&env, HazyConfig::symmetric(config));

    for _ in 0..500 {
        env.advance(100);
        hazy.tick().unwrap();
        assert_eq!(hazy.outbound().phase(), BurstPhase::Normal);
        assert_eq!(hazy.inbound().phase(), BurstPhase::Normal);
    }
}

#[test]
fn communicate_moves_traffic_both_ways() {
    let env = SimEnv::with_seed(5);
    let (mut hazy, _) = engine(&env, HazyConfig::symmetric(fixed(10)));
    let (mut local, mut remote) = SimTransport::pair();

    hazy.write(b"request").unwrap();
    remote.send(b"response").unwrap();

    // Outbound not yet due; the response is pulled into the inbound direction
    let exchange = hazy.communicate(&mut local).unwrap();
    assert_eq!(exchange.sent, 0);
    assert_eq!(exchange.received, 1);

    env.advance(10);
    let exchange = hazy.communicate(&mut local).unwrap();
    assert_eq!(exchange.sent, 1);
    assert_eq!(exchange.delivered, 1);
    assert_eq!(remote.drain(), vec![b"request".to_vec()]);

    let mut buf = [0u8; 64];
    let len = hazy.read(&mut buf).unwrap();
    assert_eq!(&buf[..len], b"response");
}

#[test]
fn transport_error_halts_drain_and_keeps_packets() {
    let env = SimEnv::with_seed(6);
    let (mut hazy, _) = engine(&env, HazyConfig::symmetric(fixed(0)));
    let (mut local, mut remote) = SimTransport::pair();

    // Zero latency still spaces ordered packets one millisecond apart
    for i in 0..3u8 {
        hazy.write(&[i]).unwrap();
    }
    env.advance(5);

    local.fail_sends(1);
    let err = hazy.communicate(&mut local).unwrap_err();
    assert!(matches!(err, HazyError::Transport(_)));
    assert!(!err.is_fatal());
    assert_eq!(hazy.outbound().packets().len(), 3);

    hazy.communicate(&mut local).unwrap();
    assert_eq!(remote.drain(), vec![vec![0u8], vec![1], vec![2]]);
}

#[test]
fn receive_is_bounded_per_step() {
    let env = SimEnv::with_seed(7);
    let (mut hazy, _) = engine(&env, HazyConfig::passthrough());
    let (mut local, mut remote) = SimTransport::pair();

    for _ in 0..45 {
        remote.send(b"flood").unwrap();
    }

    let exchange = hazy.communicate(&mut local).unwrap();
    assert_eq!(exchange.received, hazy_core::MAX_RECEIVES_PER_TICK);
    assert_eq!(local.pending(), 45 - hazy_core::MAX_RECEIVES_PER_TICK);
}

#[test]
fn full_receive_buffer_drops_newest() {
    let env = SimEnv::with_seed(8);
    let allocator = TrackingAllocator::new();
    let mut hazy =
        Hazy::with_capacity(env.clone(), HazyConfig::passthrough(), allocator.clone(), 16, 64)
            .unwrap();

    // 30 byte payloads take 32 bytes each with their prefix
    for i in 0..3u8 {
        hazy.feed_inbound(&[i; 30]).unwrap();
    }
    env.advance(10);
    hazy.tick().unwrap();

    assert_eq!(hazy.stats().reassembly_dropped, 1);
    assert_eq!(allocator.live(), 0);

    let mut buf = [0u8; 64];
    assert_eq!(hazy.read(&mut buf).unwrap(), 30);
    assert_eq!(buf[0], 0);
    assert_eq!(hazy.read(&mut buf).unwrap(), 30);
    assert_eq!(buf[0], 1);
    assert_eq!(hazy.read(&mut buf).unwrap(), 0);
}

#[test]
fn short_read_buffer_discards_datagram() {
    let env = SimEnv::with_seed(9);
    let (mut hazy, _) = engine(&env, HazyConfig::passthrough());

    hazy.feed_inbound(&[9u8; 100]).unwrap();
    hazy.feed_inbound(b"next").unwrap();
    env.advance(10);
    hazy.tick().unwrap();

    let mut small = [0u8; 10];
    let err = hazy.read(&mut small).unwrap_err();
    assert!(matches!(err, HazyError::ReadCapacity { needed: 100, capacity: 10 }));
    assert!(err.is_fatal());

    assert_eq!(hazy.read(&mut small).unwrap(), 4);
    assert_eq!(&small[..4], b"next");
}

#[test]
fn pop_outbound_without_transport() {
    let env = SimEnv::with_seed(10);
    let (mut hazy, allocator) = engine(&env, HazyConfig::symmetric(fixed(5)));

    hazy.write(b"polled").unwrap();
    let mut buf = [0u8; 16];
    assert_eq!(hazy.pop_outbound(&mut buf).unwrap(), 0);

    env.advance(5);
    assert_eq!(hazy.pop_outbound(&mut buf).unwrap(), 6);
    assert_eq!(&buf[..6], b"polled");
    assert_eq!(allocator.live(), 0);

    hazy.write(&[1u8; 32]).unwrap();
    env.advance(5);
    let err = hazy.pop_outbound(&mut buf).unwrap_err();
    assert!(matches!(err, HazyError::ReadCapacity { needed: 32, capacity: 16 }));
    assert!(hazy.outbound().packets().is_empty());
}

#[test]
fn reset_returns_every_buffer() {
    let env = SimEnv::with_seed(11);
    let (mut hazy, allocator) = engine(&env, HazyConfig::symmetric(fixed(1_000)));

    for _ in 0..20 {
        hazy.write(b"out").unwrap();
        hazy.feed_inbound(b"in").unwrap();
    }
    assert_eq!(allocator.live(), 40);

    hazy.reset();

    assert_eq!(allocator.live(), 0);
    assert_eq!(allocator.frees(), 40);
    assert_eq!(allocator.unknown_frees(), 0);
}

#[test]
fn dropping_engine_returns_every_buffer() {
    let env = SimEnv::with_seed(12);
    let (mut hazy, allocator) = engine(&env, HazyConfig::symmetric(fixed(1_000)));

    for _ in 0..10 {
        hazy.write(b"pending").unwrap();
    }
    drop(hazy);

    assert_eq!(allocator.live(), 0);
    assert_eq!(allocator.frees(), 10);
}

#[test]
fn allocator_refusal_is_fatal() {
    let env = SimEnv::with_seed(13);
    let allocator = TrackingAllocator::with_limit(1);
    let mut hazy =
        Hazy::with_allocator(env.clone(), HazyConfig::symmetric(fixed(100)), allocator).unwrap();

    hazy.write(b"one").unwrap();
    let err = hazy.write(b"two").unwrap_err();
    assert!(matches!(err, HazyError::Arena(_)));
    assert!(err.is_fatal());
}

#[test]
fn invalid_set_config_leaves_engine_untouched() {
    let env = SimEnv::with_seed(14);
    let (mut hazy, _) = engine(&env, HazyConfig::recommended());

    let mut bad = HazyConfig::worst_case();
    bad.inbound.decider = DeciderConfig { drop_chance: 0, ..only_drop() };

    assert!(matches!(hazy.set_config(bad), Err(HazyError::Config(_))));
    assert_eq!(hazy.config(), &HazyConfig::recommended());

    hazy.set_config(HazyConfig::worst_case()).unwrap();
    assert_eq!(hazy.config(), &HazyConfig::worst_case());
}

#[test]
fn adapter_looks_like_a_transport() {
    let env = SimEnv::with_seed(15);
    let (hazy, _) = engine(&env, HazyConfig::symmetric(fixed(20)));
    let (local, mut remote) = SimTransport::pair();
    let mut transport = HazyTransport::new(hazy, local);

    fn send_hello<T: DatagramTransport>(transport: &mut T) {
        transport.send(b"hello").unwrap();
    }
    send_hello(&mut transport);
    remote.send(b"world").unwrap();

    transport.update().unwrap();
    assert!(remote.drain().is_empty());

    env.advance(20);
    transport.update().unwrap();
    assert_eq!(remote.drain(), vec![b"hello".to_vec()]);

    let mut buf = [0u8; 16];
    let len = transport.receive(&mut buf).unwrap();
    assert_eq!(&buf[..len], b"world");
}

#[test]
fn worst_case_still_delivers_something() {
    let env = SimEnv::with_seed(16);
    let (mut hazy, allocator) = engine(&env, HazyConfig::worst_case());
    let (mut local, mut remote) = SimTransport::pair();

    for i in 0..500u32 {
        hazy.write(&i.to_be_bytes()).unwrap();
        env.advance(10);
        hazy.communicate(&mut local).unwrap();
    }
    env.advance(5_000);
    hazy.communicate(&mut local).unwrap();

    let received = remote.drain();
    let stats = hazy.stats().outbound;
    assert!(!received.is_empty());
    assert!(stats.dropped + stats.burst_dropped > 0);
    assert_eq!(allocator.live(), hazy.outbound().packets().len());
}
