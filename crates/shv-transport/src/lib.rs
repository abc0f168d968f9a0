//! Byte-stream transports, message framing, and the blocking connection
//! type the handler pipeline drives (spec.md §4.2, §4.3).
//!
//! No async runtime anywhere in this crate: every blocking call is a
//! plain `std::io` call on a thread the caller owns, per spec.md §5.

pub mod client;
pub mod error;
pub mod framing;
pub mod transport;

pub use client::{Client, ConnectOptions, FrameLogger, TlsMaterial};
pub use error::TransportError;
pub use framing::{BlockFramer, Framer, SerialFramer};
pub use transport::mem::MemTransport;
pub use transport::tcp::TcpTransport;
pub use transport::unix::UnixTransport;
pub use transport::Transport;

#[cfg(feature = "tty")]
pub use transport::tty::TtyTransport;

#[cfg(feature = "pipe")]
pub use transport::pipe::PipeTransport;
