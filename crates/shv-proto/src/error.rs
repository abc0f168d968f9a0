//! Errors raised while decoding protocol-level structures (message meta,
//! resource identifiers, method descriptions). Distinct from [`crate::rpcerror::RpcError`],
//! which is the wire-level error taxonomy carried *inside* a message.

#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("malformed resource identifier: {0}")]
    InvalidRi(String),

    #[error("message meta missing required key {0}")]
    MissingMetaKey(&'static str),

    #[error("message meta key {key} has wrong type: {detail}")]
    WrongMetaType { key: &'static str, detail: String },

    #[error("codec error: {0}")]
    Codec(#[from] shv_chainpack::DecodeError),
}
