//! `Client`: a transport plus a framer plus the bookkeeping (activity
//! timestamp, logger hook, reset) that the handler pipeline builds on
//! (spec.md §4.3).

use std::time::{Duration, Instant};

use crate::error::TransportError;
use crate::framing::Framer;
use crate::transport::Transport;

/// TLS material carried as opaque bytes so a caller-supplied `Transport`
/// can act on it without this crate implementing TLS itself
/// (SPEC_FULL.md §4.3).
#[derive(Clone, Debug, Default)]
pub struct TlsMaterial {
    pub ca: Option<Vec<u8>>,
    pub cert: Option<Vec<u8>>,
    pub key: Option<Vec<u8>>,
}

/// Everything needed to establish a connection, independent of which
/// concrete transport backend is used. `shv-client::url` builds this from
/// a connection URL (spec.md §6.3); `Client::connect` also accepts one
/// built by hand.
#[derive(Clone, Debug, Default)]
pub struct ConnectOptions {
    pub idle_timeout: Option<std::time::Duration>,
    pub tls: Option<TlsMaterial>,
}

/// A function invoked with every raw frame that crosses the wire in
/// either direction, for diagnostic tracing equivalent to `rpclogger` in
/// the original implementation.
pub type FrameLogger = Box<dyn Fn(&[u8], bool) + Send>;

pub struct Client {
    transport: Box<dyn Transport>,
    framer: Box<dyn Framer + Send>,
    last_activity: Instant,
    logger: Option<FrameLogger>,
}

impl Client {
    pub fn new(transport: Box<dyn Transport>, framer: Box<dyn Framer + Send>) -> Self {
        Client {
            transport,
            framer,
            last_activity: Instant::now(),
            logger: None,
        }
    }

    pub fn set_logger(&mut self, logger: FrameLogger) {
        self.logger = Some(logger);
    }

    pub fn peer_name(&self) -> String {
        self.transport.peer_name()
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Block until one complete message frame has arrived.
    pub fn recv_message(&mut self) -> Result<Vec<u8>, TransportError> {
        let msg = self.framer.read_message(&mut self.transport)?;
        self.last_activity = Instant::now();
        if let Some(logger) = &self.logger {
            logger(&msg, false);
        }
        Ok(msg)
    }

    /// Send one complete message as a single frame.
    pub fn send_message(&mut self, msg: &[u8]) -> Result<(), TransportError> {
        self.framer.write_message(&mut self.transport, msg)?;
        self.last_activity = Instant::now();
        if let Some(logger) = &self.logger {
            logger(msg, true);
        }
        Ok(())
    }

    /// Bound how long [`Client::try_recv_message`] can block. Backends
    /// without read-timeout support (see [`Transport::set_read_timeout`])
    /// silently ignore this.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.transport.set_read_timeout(timeout).map_err(TransportError::Io)
    }

    /// Like [`Client::recv_message`], but a read timing out (per
    /// [`Client::set_read_timeout`]) is reported as `Ok(None)` rather than
    /// an error, so a caller can poll for idle-timer work on the same
    /// thread it reads messages on.
    pub fn try_recv_message(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.recv_message() {
            Ok(msg) => Ok(Some(msg)),
            Err(TransportError::Io(e))
                if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Tear down the connection. Sends a RESET frame first if the framer
    /// carries one (spec.md §4.3); the handler pipeline's `reset`
    /// callbacks run after this returns, per spec.md §4.4.2.
    pub fn reset(&mut self) -> Result<(), TransportError> {
        tracing::info!(peer = %self.peer_name(), "client reset");
        self.framer.write_reset(&mut self.transport).ok();
        self.transport.shutdown().map_err(TransportError::Io)
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }
}
