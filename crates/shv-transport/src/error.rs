use std::io;

/// Connection-layer failure: distinct from a protocol-level [`shv_proto::RpcError`]
/// because these can't be carried as a message — the connection itself is
/// the thing that broke.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("frame too large: {size} bytes exceeds limit of {limit}")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("serial framing error: {0}")]
    Framing(String),

    #[error("crc mismatch: expected {expected:#010x}, got {got:#010x}")]
    CrcMismatch { expected: u32, got: u32 },

    #[error("connect timed out")]
    ConnectTimeout,

    #[error("invalid connection url: {0}")]
    InvalidUrl(String),

    #[error("peer sent a RESET frame; partial state discarded")]
    SessionReset,
}
