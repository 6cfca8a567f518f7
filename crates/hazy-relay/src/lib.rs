//! Hazy UDP relay.
//!
//! Places the emulation engine between a local application and a remote UDP
//! peer. The application sends to the relay's listen address; the relay
//! degrades the traffic in both directions and forwards it.
//!
//! ## Architecture
//!
//! ```text
//! application ──► listen socket ──write──► Hazy ──communicate──► UdpTransport ──► remote
//! application ◄── listen socket ◄──read─── Hazy ◄──communicate── UdpTransport ◄── remote
//! ```
//!
//! - `SystemEnv`: production `Environment` (monotonic clock, OS entropy)
//! - `UdpTransport`: connected tokio socket behind `DatagramTransport`
//! - `Relay`: tick loop driving the engine

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod relay;
mod system_env;
mod udp;

pub use error::RelayError;
pub use relay::{Pump, Relay, RelayConfig};
pub use system_env::SystemEnv;
pub use udp::UdpTransport;
