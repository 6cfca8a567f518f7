//! Datagram transport seam.
//!
//! `DatagramTransport` is the non-blocking send/receive pair the engine
//! drives. `HazyTransport` puts an engine in front of a real transport and
//! implements the same trait, so code written against a transport can be
//! handed the emulated one unchanged.

use std::io;

use crate::{
    allocator::Allocator,
    env::Environment,
    error::HazyError,
    hazy::{Exchange, Hazy},
};

/// Non-blocking datagram transport.
pub trait DatagramTransport {
    /// Send one datagram.
    fn send(&mut self, datagram: &[u8]) -> io::Result<()>;

    /// Receive one datagram into `buffer`.
    ///
    /// Returns `Ok(0)` when nothing is pending. Must not block.
    fn receive(&mut self, buffer: &mut [u8]) -> io::Result<usize>;
}

impl<T: DatagramTransport + ?Sized> DatagramTransport for &mut T {
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        (**self).send(datagram)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        (**self).receive(buffer)
    }
}

/// A real transport seen through an emulation engine.
///
/// `send` queues into the outbound direction and `receive` reads delivered
/// inbound datagrams. Nothing moves until `update` is called.
#[derive(Debug)]
pub struct HazyTransport<T, E, A>
where
    T: DatagramTransport,
    E: Environment,
    A: Allocator + Clone,
{
    hazy: Hazy<E, A>,
    inner: T,
}

impl<T, E, A> HazyTransport<T, E, A>
where
    T: DatagramTransport,
    E: Environment,
    A: Allocator + Clone,
{
    /// Wrap `inner` behind `hazy`.
    pub fn new(hazy: Hazy<E, A>, inner: T) -> Self {
        Self { hazy, inner }
    }

    /// Run one emulation step against the wrapped transport.
    pub fn update(&mut self) -> Result<Exchange, HazyError> {
        self.hazy.communicate(&mut self.inner)
    }

    /// The engine.
    pub fn hazy(&self) -> &Hazy<E, A> {
        &self.hazy
    }

    /// The engine, for reconfiguration.
    pub fn hazy_mut(&mut self) -> &mut Hazy<E, A> {
        &mut self.hazy
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Split into engine and transport.
    pub fn into_parts(self) -> (Hazy<E, A>, T) {
        (self.hazy, self.inner)
    }
}

impl<T, E, A> DatagramTransport for HazyTransport<T, E, A>
where
    T: DatagramTransport,
    E: Environment,
    A: Allocator + Clone,
{
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        self.hazy.write(datagram).map(|_| ()).map_err(into_io)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        self.hazy.read(buffer).map_err(into_io)
    }
}

fn into_io(error: HazyError) -> io::Error {
    match error {
        HazyError::Transport(e) => e,
        HazyError::Config(_) => io::Error::new(io::ErrorKind::InvalidInput, error),
        HazyError::Reassembly(_) => io::Error::new(io::ErrorKind::OutOfMemory, error),
        HazyError::ReadCapacity { .. } => io::Error::new(io::ErrorKind::InvalidData, error),
        HazyError::Arena(_) | HazyError::Decider(_) => io::Error::other(error),
    }
}
