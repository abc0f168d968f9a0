//! In-process transport backed by a pair of byte-queue channels — no real
//! socket, for tests and the in-process mock broker in `shv-testkit`.
//!
//! Grounded on `rapace-core/src/transport/mem.rs`'s `MemTransport`, which
//! uses an `mpsc` channel per direction with an `AtomicBool` closed flag;
//! adapted here to the blocking `Read`/`Write` shape.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;

use super::Transport;

struct Inner {
    closed: AtomicBool,
}

pub struct MemTransport {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    inner: Arc<Inner>,
    peer: String,
}

impl MemTransport {
    /// Build a connected pair: bytes written to `.0` are readable from `.1`
    /// and vice versa.
    pub fn pair() -> (MemTransport, MemTransport) {
        let (tx_a, rx_b) = std::sync::mpsc::channel();
        let (tx_b, rx_a) = std::sync::mpsc::channel();
        let inner_a = Arc::new(Inner {
            closed: AtomicBool::new(false),
        });
        let inner_b = Arc::new(Inner {
            closed: AtomicBool::new(false),
        });
        (
            MemTransport {
                tx: tx_a,
                rx: rx_a,
                pending: VecDeque::new(),
                inner: inner_a,
                peer: "mem:a".to_string(),
            },
            MemTransport {
                tx: tx_b,
                rx: rx_b,
                pending: VecDeque::new(),
                inner: inner_b,
                peer: "mem:b".to_string(),
            },
        )
    }
}

impl Read for MemTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv() {
                Ok(chunk) => self.pending.extend(chunk),
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.pending.pop_front().unwrap();
        }
        Ok(n)
    }
}

impl Write for MemTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mem transport closed"));
        }
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer dropped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MemTransport {
    fn peer_name(&self) -> String {
        self.peer.clone()
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.inner.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_exchanges_bytes() {
        let (mut a, mut b) = MemTransport::pair();
        a.write_all(b"hello").unwrap();
        let mut buf = [0u8; 5];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }
}
