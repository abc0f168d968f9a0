//! Turning a parsed [`ConnectUrl`] into a live [`Client`] (spec.md §4.3,
//! §6.3): pick the transport backend and framer the scheme calls for,
//! dial it, and hand back a ready-to-use `Client`.

use std::time::Duration;

use shv_transport::{BlockFramer, Client, Framer, SerialFramer, TcpTransport, Transport, TransportError, UnixTransport};

use crate::url::{ConnectUrl, Scheme, UrlError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Url(#[from] UrlError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("scheme '{0:?}' is not supported by this build")]
    UnsupportedScheme(Scheme),
}

const DEFAULT_TCP_PORT: u16 = 3755;

/// Dial the transport and framer a connection URL describes and wrap
/// them in a [`Client`]. Does not perform the hello/login handshake —
/// see [`crate::session::Session::connect`] for that.
pub fn dial(url: &ConnectUrl) -> Result<Client, ClientError> {
    let transport: Box<dyn Transport> = match url.scheme {
        Scheme::Tcp | Scheme::Tcps => {
            let addr = format!("{}:{}", url.host_or_path, url.port.unwrap_or(DEFAULT_TCP_PORT));
            Box::new(TcpTransport::connect(addr, url.timeout)?)
        }
        Scheme::Unix | Scheme::Unixs => Box::new(UnixTransport::connect(&url.host_or_path)?),
        Scheme::Tty => {
            #[cfg(feature = "tty")]
            {
                Box::new(shv_transport::TtyTransport::open(&url.host_or_path, url.baudrate.unwrap_or(115_200))?)
            }
            #[cfg(not(feature = "tty"))]
            {
                return Err(ClientError::UnsupportedScheme(url.scheme));
            }
        }
        Scheme::Can => return Err(ClientError::UnsupportedScheme(url.scheme)),
    };

    let framer: Box<dyn Framer + Send> = if url.scheme.uses_serial_framing() {
        Box::new(SerialFramer::new(true))
    } else {
        Box::new(BlockFramer::default())
    };

    Ok(Client::new(transport, framer))
}

/// The interval [`crate::session::Session`]'s receive loop polls at when
/// idle. Short enough that `idle()` callbacks (nonce/subscription
/// expiry) run promptly; long enough not to busy-loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
