//! In-memory datagram transport.
//!
//! Two endpoints created by `pair` are joined by a pair of queues: what one
//! sends, the other receives. Delivery is instant and lossless; any network
//! misbehaviour comes from the engine under test.

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use hazy_core::DatagramTransport;

type Queue = Arc<Mutex<VecDeque<Vec<u8>>>>;

fn lock(queue: &Queue) -> MutexGuard<'_, VecDeque<Vec<u8>>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One end of an in-memory datagram link.
#[derive(Debug, Clone, Default)]
pub struct SimTransport {
    inbox: Queue,
    peer_inbox: Queue,
    sent: usize,
    received: usize,
    failing_sends: usize,
}

impl SimTransport {
    /// Two connected endpoints.
    pub fn pair() -> (Self, Self) {
        let a: Queue = Arc::default();
        let b: Queue = Arc::default();
        (
            Self { inbox: Arc::clone(&a), peer_inbox: Arc::clone(&b), ..Self::default() },
            Self { inbox: b, peer_inbox: a, ..Self::default() },
        )
    }

    /// Make the next `count` sends fail with `ConnectionRefused`.
    pub fn fail_sends(&mut self, count: usize) {
        self.failing_sends = count;
    }

    /// Datagrams waiting to be received by this endpoint.
    pub fn pending(&self) -> usize {
        lock(&self.inbox).len()
    }

    /// Datagrams successfully sent from this endpoint.
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Datagrams received by this endpoint.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Receive everything pending.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        let drained: Vec<_> = lock(&self.inbox).drain(..).collect();
        self.received += drained.len();
        drained
    }
}

impl DatagramTransport for SimTransport {
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        if self.failing_sends > 0 {
            self.failing_sends -= 1;
            return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
        }
        lock(&self.peer_inbox).push_back(datagram.to_vec());
        self.sent += 1;
        Ok(())
    }

    /// Datagrams longer than `buffer` are truncated, as with a UDP socket.
    fn receive(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let Some(datagram) = lock(&self.inbox).pop_front() else {
            return Ok(0);
        };
        let len = datagram.len().min(buffer.len());
        buffer[..len].copy_from_slice(&datagram[..len]);
        self.received += 1;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_is_connected_both_ways() {
        let (mut a, mut b) = SimTransport::pair();
        a.send(b"to b").unwrap();
        b.send(b"to a").unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(b.receive(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"to b");
        assert_eq!(a.receive(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"to a");
        assert_eq!(a.receive(&mut buf).unwrap(), 0);
    }

    #[test]
    fn injected_send_failures() {
        let (mut a, b) = SimTransport::pair();
        a.fail_sends(1);

        assert!(a.send(b"x").is_err());
        assert!(a.send(b"y").is_ok());
        assert_eq!(b.pending(), 1);
        assert_eq!(a.sent(), 1);
    }
}
