//! The `Transport` trait: a bare, blocking byte stream. Framing (how
//! messages are delimited within that stream) is a separate concern,
//! implemented in [`crate::framing`].
//!
//! Grounded on `rapace-core`'s `TransportBackend` trait (`send_frame`/
//! `recv_frame`/`close`/`is_closed`), adapted from async to blocking
//! `std::io::{Read, Write}` per the spec's no-green-threads requirement.

use std::io::{Read, Write};
use std::time::Duration;

pub mod tcp;
pub mod unix;

#[cfg(feature = "tty")]
pub mod tty;

#[cfg(feature = "pipe")]
pub mod pipe;

pub mod mem;

/// A connected, bidirectional byte stream plus enough identity/lifecycle
/// surface for `Client` to log and reconnect.
pub trait Transport: Read + Write + Send {
    /// A short human-readable description of the peer, for logging.
    fn peer_name(&self) -> String;

    /// Half-close the connection; further reads should return EOF or an
    /// error, and further writes should fail.
    fn shutdown(&mut self) -> std::io::Result<()>;

    /// Whether the transport has observed the connection is gone. Not
    /// all backends can tell without attempting I/O, in which case this
    /// conservatively returns `false`.
    fn is_closed(&self) -> bool {
        false
    }

    /// Bound how long a read can block, so a caller driving both sends
    /// and receives on one thread (`shv-client`'s session loop) can poll
    /// for idle-timer work between messages instead of blocking forever.
    /// Backends that can't support this (TTY, pipe, the in-memory test
    /// transport) keep the default no-op; their callers fall back to one
    /// thread per direction instead of a single polling loop.
    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> std::io::Result<()> {
        Ok(())
    }
}
