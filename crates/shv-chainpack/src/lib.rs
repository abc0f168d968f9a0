//! The SHV self-describing value model plus its two wire encodings:
//! ChainPack (compact binary) and Cpon (human-readable text).
//!
//! Most consumers want [`RpcValue`]/[`Value`] plus [`chainpack::pack_to_vec`]
//! / [`chainpack::unpack_from_slice`] or [`cpon::parse`] / [`cpon::to_string`].
//! The streaming [`item::Item`] API exists underneath for chunked BLOB and
//! STRING payloads that shouldn't be materialized in one allocation.

pub mod chainpack;
pub mod copy;
pub mod cpon;
pub mod crc32;
pub mod error;
pub mod item;
pub mod value;

pub use crc32::{crc32, Crc32};
pub use error::{DecodeError, EncodeError, DEFAULT_DEPTH_LIMIT};
pub use item::{Chunk, Item};
pub use value::{
    DateTime, Decimal, MapKey, MetaKey, MetaMap, RpcValue, Value, CHAINPACK_EPOCH_MSEC,
};
