//! Hazy relay binary.
//!
//! # Usage
//!
//! ```bash
//! # Degrade traffic between an application and a game server
//! hazy-relay --listen 127.0.0.1:9000 --remote 203.0.113.7:7777 --preset worst
//!
//! # Reproducible run
//! hazy-relay --remote 127.0.0.1:7777 --preset recommended --seed 42
//! ```

use std::{net::SocketAddr, time::Duration};

use clap::{Parser, ValueEnum};
use hazy_core::HazyConfig;
use hazy_relay::{Relay, RelayConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Network condition preset
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    /// Forward untouched
    Passthrough,
    /// Rare loss, low latency
    Good,
    /// Noticeable loss and latency
    Recommended,
    /// Heavy loss, high latency, loss bursts
    Worst,
}

impl Preset {
    fn config(self) -> HazyConfig {
        match self {
            Self::Passthrough => HazyConfig::passthrough(),
            Self::Good => HazyConfig::good_condition(),
            Self::Recommended => HazyConfig::recommended(),
            Self::Worst => HazyConfig::worst_case(),
        }
    }
}

/// Hazy UDP relay
#[derive(Parser, Debug)]
#[command(name = "hazy-relay")]
#[command(about = "Relay UDP traffic through an emulated hostile network")]
#[command(version)]
struct Args {
    /// Address the application sends to
    #[arg(short, long, default_value = "127.0.0.1:9000")]
    listen: SocketAddr,

    /// Remote peer to forward to
    #[arg(short, long)]
    remote: SocketAddr,

    /// Network condition preset
    #[arg(short, long, value_enum, default_value_t = Preset::Recommended)]
    preset: Preset,

    /// Seed for reproducible impairment decisions
    #[arg(long)]
    seed: Option<u64>,

    /// Milliseconds between emulation steps
    #[arg(long, default_value = "2")]
    tick_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Hazy relay starting");
    tracing::info!(preset = ?args.preset, seed = ?args.seed, "Emulating network conditions");

    let config = RelayConfig {
        listen: args.listen,
        remote: args.remote,
        hazy: args.preset.config(),
        tick: Duration::from_millis(args.tick_ms.max(1)),
        seed: args.seed,
    };

    let relay = Relay::bind(config).await?;

    tracing::info!("Relay listening on {}", relay.local_addr()?);

    relay.run().await?;

    Ok(())
}
