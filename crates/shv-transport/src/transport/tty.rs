//! Serial (TTY) transport, for devices reachable over a UART — RS-232/RS-485
//! gear typical of the SHV device ecosystem. Grounded on `rpcclient_tty_new`
//! in `original_source/include/shv/rpctransport.h`.

use std::io::{self, Read, Write};
use std::time::Duration;

use super::Transport;
use crate::error::TransportError;

pub struct TtyTransport {
    port: Box<dyn serialport::SerialPort>,
    peer: String,
}

impl TtyTransport {
    pub fn open(device: &str, baudrate: u32) -> Result<Self, TransportError> {
        let port = serialport::new(device, baudrate)
            .timeout(Duration::from_secs(3600))
            .open()
            .map_err(|e| TransportError::Io(io::Error::new(io::ErrorKind::Other, e)))?;
        let peer = format!("tty:{device}@{baudrate}");
        tracing::info!(peer = %peer, "tty transport opened");
        Ok(TtyTransport { port, peer })
    }
}

impl Read for TtyTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for TtyTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Transport for TtyTransport {
    fn peer_name(&self) -> String {
        self.peer.clone()
    }

    fn shutdown(&mut self) -> io::Result<()> {
        Ok(())
    }
}
