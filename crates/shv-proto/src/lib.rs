//! Message envelope, access levels, resource identifiers, method
//! descriptions and the RPC error taxonomy layered on top of
//! `shv-chainpack`'s value model.

pub mod access;
pub mod dir;
pub mod error;
pub mod meta;
pub mod ri;
pub mod rpcerror;

pub use access::{granted_access_extract, granted_access_str, AccessLevel};
pub use dir::{MethodDescription, MethodFlags, SignalDescription};
pub use error::ProtoError;
pub use meta::{MessageType, RpcMessage};
pub use ri::{glob_match_segment, path_match, ResourceId};
pub use rpcerror::RpcError;
