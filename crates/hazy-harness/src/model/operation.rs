//! Operations for model-based testing.
//!
//! Operations represent everything an embedder can do to an engine. They are
//! generated randomly by proptest or the fuzzer and applied to a `HazyWorld`.

use arbitrary::Arbitrary;
use hazy_core::HazyConfig;

/// Operations that can be applied to an engine.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Application writes a datagram.
    Write {
        /// Datagram content.
        payload: SmallPayload,
    },

    /// The network delivers a datagram straight into the inbound direction.
    FeedInbound {
        /// Datagram content.
        payload: SmallPayload,
    },

    /// The remote peer sends a datagram over the transport.
    PeerSend {
        /// Datagram content.
        payload: SmallPayload,
    },

    /// Advance simulation time.
    AdvanceTime {
        /// Milliseconds to advance.
        millis: u16,
    },

    /// Advance both directions without touching the transport.
    Tick,

    /// Run one emulation step against the transport.
    Communicate,

    /// Application reads one datagram.
    Read {
        /// Read buffer size class (0-3 maps to tiny/small/datagram/large).
        capacity_class: u8,
    },

    /// Pop one due outbound datagram without the transport.
    PopOutbound,

    /// Discard everything in flight.
    Reset,

    /// Swap the configuration.
    SetConfig {
        /// Preset to switch to.
        preset: Preset,
    },
}

/// Named configuration presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum Preset {
    /// No impairment at all.
    Passthrough,
    /// Mild impairment.
    GoodCondition,
    /// Moderate impairment.
    Recommended,
    /// Heavy impairment.
    WorstCase,
}

impl Preset {
    /// Expand to a configuration.
    pub fn config(self) -> HazyConfig {
        match self {
            Self::Passthrough => HazyConfig::passthrough(),
            Self::GoodCondition => HazyConfig::good_condition(),
            Self::Recommended => HazyConfig::recommended(),
            Self::WorstCase => HazyConfig::worst_case(),
        }
    }
}

/// Compact datagram description.
///
/// Keeps generated cases small while still covering empty, small and
/// full-size datagrams. The content is deterministic from the seed.
#[derive(Debug, Clone, Copy, Arbitrary)]
pub struct SmallPayload {
    /// Content seed.
    pub seed: u8,
    /// Length hint (0-3 maps to empty/small/medium/full).
    pub size_class: u8,
}

impl SmallPayload {
    /// Expand to datagram bytes.
    pub fn to_bytes(self) -> Vec<u8> {
        let len: u8 = match self.size_class % 4 {
            0 => 0,
            1 => 8,
            2 => 200,
            _ => 255,
        };
        let mut bytes: Vec<u8> = (0..len).map(|i| self.seed.wrapping_add(i)).collect();
        if self.size_class % 4 == 3 {
            bytes.resize(hazy_core::MAX_DATAGRAM_SIZE, self.seed);
        }
        bytes
    }
}

/// Read buffer length for a capacity class.
pub fn read_capacity(class: u8) -> usize {
    match class % 4 {
        0 => 4,
        1 => 64,
        2 => hazy_core::MAX_DATAGRAM_SIZE,
        _ => 4096,
    }
}
