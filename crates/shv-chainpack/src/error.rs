use std::io;

/// Default limit on nested container depth for both codecs.
///
/// Mirrors the `cpcp_container_stack` overflow guard in the reference
/// implementation: decoding a document nested deeper than this raises
/// [`DecodeError::DepthLimitExceeded`] instead of recursing without bound.
pub const DEFAULT_DEPTH_LIMIT: usize = 512;

/// Failure while decoding a ChainPack or Cpon stream.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    Eof,

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed input at byte {offset}: {message}")]
    Malformed { offset: u64, message: String },

    #[error("container stack underflow (unbalanced CONTAINER_END)")]
    ContainerStackUnderflow,

    #[error("container nesting exceeds depth limit of {limit}")]
    DepthLimitExceeded { limit: usize },

    #[error("chunk buffer too small: need at least {needed} bytes, got {got}")]
    ChunkBufferTooSmall { needed: usize, got: usize },
}

impl DecodeError {
    pub(crate) fn malformed(offset: u64, message: impl Into<String>) -> Self {
        DecodeError::Malformed {
            offset,
            message: message.into(),
        }
    }
}

/// Failure while encoding a value into ChainPack or Cpon.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("value out of range for wire representation: {0}")]
    OutOfRange(String),

    #[error("container nesting exceeds depth limit of {limit}")]
    DepthLimitExceeded { limit: usize },
}
