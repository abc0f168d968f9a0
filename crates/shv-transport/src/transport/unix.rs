use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use super::Transport;
use crate::error::TransportError;

pub struct UnixTransport {
    stream: UnixStream,
    peer: String,
}

impl UnixTransport {
    pub fn connect(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path)?;
        let peer = format!("unix:{}", path.display());
        tracing::info!(peer = %peer, "unix transport connected");
        Ok(UnixTransport { stream, peer })
    }

    pub fn from_stream(stream: UnixStream) -> Self {
        UnixTransport {
            stream,
            peer: "unix:peer".to_string(),
        }
    }
}

impl Read for UnixTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for UnixTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Transport for UnixTransport {
    fn peer_name(&self) -> String {
        self.peer.clone()
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown(std::net::Shutdown::Both)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.set_read_timeout(timeout)
    }
}
