//! The relay tick loop.

use std::{io, net::SocketAddr, time::Duration};

use hazy_core::{Exchange, Hazy, HazyConfig};
use tokio::{net::UdpSocket, time::MissedTickBehavior};

use crate::{RelayError, SystemEnv, UdpTransport};

/// Largest datagram accepted from either side.
const MAX_UDP_PAYLOAD: usize = 65_535;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the local application sends to.
    pub listen: SocketAddr,
    /// Remote peer receiving the degraded traffic.
    pub remote: SocketAddr,
    /// Emulated network conditions.
    pub hazy: HazyConfig,
    /// Interval between emulation steps.
    pub tick: Duration,
    /// Seed for reproducible impairment decisions.
    pub seed: Option<u64>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: ([127, 0, 0, 1], 9000).into(),
            remote: ([127, 0, 0, 1], 9001).into(),
            hazy: HazyConfig::recommended(),
            tick: Duration::from_millis(2),
            seed: None,
        }
    }
}

/// Traffic moved by one `pump`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pump {
    /// Datagrams accepted from the application.
    pub accepted: usize,
    /// Engine traffic against the remote peer.
    pub exchange: Exchange,
    /// Datagrams forwarded to the application.
    pub forwarded: usize,
}

/// UDP relay driving one emulation engine.
#[derive(Debug)]
pub struct Relay {
    hazy: Hazy<SystemEnv>,
    listen: UdpSocket,
    upstream: UdpTransport,
    application: Option<SocketAddr>,
    buffer: Vec<u8>,
    tick: Duration,
}

impl Relay {
    /// Bind the listen socket and connect to the remote peer.
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let env = config.seed.map_or_else(SystemEnv::new, SystemEnv::with_seed);
        let hazy = Hazy::new(env, config.hazy)?;
        let listen = UdpSocket::bind(config.listen).await?;
        let upstream = UdpTransport::connect(config.remote).await?;

        tracing::info!(
            listen = %listen.local_addr()?,
            remote = %config.remote,
            tick = ?config.tick,
            "relay bound"
        );

        Ok(Self {
            hazy,
            listen,
            upstream,
            application: None,
            buffer: vec![0; MAX_UDP_PAYLOAD],
            tick: config.tick,
        })
    }

    /// Address the application should send to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listen.local_addr()
    }

    /// The emulation engine.
    pub fn hazy(&self) -> &Hazy<SystemEnv> {
        &self.hazy
    }

    /// One relay step. Never waits.
    ///
    /// Accepts pending application datagrams, runs the engine against the
    /// remote peer, then forwards delivered datagrams to the application.
    /// Transient engine errors are logged and the step carries on.
    pub fn pump(&mut self) -> Result<Pump, RelayError> {
        let accepted = self.accept()?;

        let exchange = match self.hazy.communicate(&mut self.upstream) {
            Ok(exchange) => exchange,
            Err(e) if !e.is_fatal() => {
                tracing::warn!(error = %e, "upstream step failed");
                Exchange::default()
            },
            Err(e) => return Err(e.into()),
        };

        let forwarded = self.forward()?;
        Ok(Pump { accepted, exchange, forwarded })
    }

    /// Pump until interrupted with Ctrl-C.
    pub async fn run(mut self) -> Result<(), RelayError> {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = interval.tick() => {},
                ready = self.listen.readable() => ready?,
                result = &mut shutdown => {
                    result?;
                    break;
                },
            }
            self.pump()?;
        }

        let stats = self.hazy.stats();
        tracing::info!(
            outbound = ?stats.outbound,
            inbound = ?stats.inbound,
            reassembly_dropped = stats.reassembly_dropped,
            "relay stopped"
        );
        Ok(())
    }

    fn accept(&mut self) -> Result<usize, RelayError> {
        let mut accepted = 0;
        loop {
            match self.listen.try_recv_from(&mut self.buffer) {
                Ok((len, from)) => {
                    if self.application != Some(from) {
                        tracing::info!(%from, "application peer");
                        self.application = Some(from);
                    }
                    let outcome = self.hazy.write(&self.buffer[..len])?;
                    tracing::trace!(?outcome, len, "application datagram");
                    accepted += 1;
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(accepted),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn forward(&mut self) -> Result<usize, RelayError> {
        let mut forwarded = 0;
        loop {
            let len = self.hazy.read(&mut self.buffer)?;
            if len == 0 {
                return Ok(forwarded);
            }

            let Some(application) = self.application else {
                tracing::debug!(len, "no application peer yet, datagram dropped");
                continue;
            };
            match self.listen.try_send_to(&self.buffer[..len], application) {
                Ok(_) => forwarded += 1,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    tracing::warn!(len, "application socket full, datagram dropped");
                },
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn relay_to(remote: &UdpSocket) -> Relay {
        let config = RelayConfig {
            listen: ([127, 0, 0, 1], 0).into(),
            remote: remote.local_addr().unwrap(),
            hazy: HazyConfig::passthrough(),
            tick: Duration::from_millis(1),
            seed: Some(1),
        };
        Relay::bind(config).await.unwrap()
    }

    async fn pump_until<F: Fn(&Pump) -> bool>(relay: &mut Relay, done: F) {
        for _ in 0..500 {
            let pump = relay.pump().unwrap();
            if done(&pump) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("relay made no progress");
    }

    #[tokio::test]
    async fn relays_both_ways() {
        let remote = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let app = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut relay = relay_to(&remote).await;

        app.send_to(b"hello", relay.local_addr().unwrap()).await.unwrap();
        pump_until(&mut relay, |pump| pump.exchange.sent > 0).await;

        let mut buf = [0u8; 64];
        let (len, upstream) = remote.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"hello");

        remote.send_to(b"world", upstream).await.unwrap();
        pump_until(&mut relay, |pump| pump.forwarded > 0).await;

        let (len, from) = app.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"world");
        assert_eq!(from, relay.local_addr().unwrap());
    }

    #[tokio::test]
    async fn idle_pump_moves_nothing() {
        let remote = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut relay = relay_to(&remote).await;

        assert_eq!(relay.pump().unwrap(), Pump::default());
    }
}
