//! Codec-agnostic copy: re-encode a value read with one codec into the
//! other, without the caller needing to touch [`crate::value::Value`]
//! directly (§4.1.3). Meta is carried through unchanged.
//!
//! [`chainpack_to_cpon`]/[`cpon_to_chainpack`] go through a fully
//! materialized [`RpcValue`] tree: Cpon's parser/writer in
//! [`crate::cpon`] is tree-based, with no item-level streaming API, so
//! there's no bounded-memory path between the two codecs. ChainPack to
//! ChainPack is different — [`copy_chainpack`] pumps the stream one
//! [`crate::item::Item`] at a time via [`relay_chainpack`], so a message
//! can be relayed without ever holding a decoded value tree, and a
//! chunked BLOB/STRING is forwarded chunk-by-chunk rather than
//! concatenated first.

use std::io::{Read, Write};

use crate::chainpack::{self, ChainPackReader, ChainPackWriter};
use crate::cpon;
use crate::error::{DecodeError, EncodeError};
use crate::item::Item;
use crate::value::RpcValue;

#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Decode one ChainPack-encoded value and re-encode it as Cpon text.
pub fn chainpack_to_cpon(data: &[u8]) -> Result<String, CopyError> {
    let mut r = ChainPackReader::new(data);
    let v = r.unpack_rpcvalue()?;
    Ok(cpon::to_string(&v)?)
}

/// Parse one Cpon-encoded value and re-encode it as ChainPack bytes.
pub fn cpon_to_chainpack(text: &str) -> Result<Vec<u8>, CopyError> {
    let v = cpon::parse(text)?;
    let mut w = ChainPackWriter::new(Vec::new());
    w.pack_rpcvalue(&v)?;
    Ok(w.into_inner())
}

/// Copy a value already in memory, preserving its meta, verbatim.
pub fn copy_value(value: &RpcValue) -> RpcValue {
    value.clone()
}

/// Pump one complete ChainPack value (with any leading meta, at any
/// nesting depth) from `reader` to `writer` one item at a time. BLOB/STRING
/// chunks are forwarded without concatenating the payload: a source chunk
/// bigger than `chunk_buf_size` is re-split into `chunk_buf_size`-sized
/// pieces on the way out, so the resident buffer never exceeds
/// `max(chunk_buf_size, largest single chunk written by the source)`.
pub fn copy_chainpack<R: Read, W: Write>(
    reader: &mut ChainPackReader<R>,
    writer: &mut ChainPackWriter<W>,
    chunk_buf_size: usize,
) -> Result<(), CopyError> {
    if chunk_buf_size == 0 {
        return Err(CopyError::Decode(DecodeError::ChunkBufferTooSmall { needed: 1, got: 0 }));
    }
    let item = reader.read_item()?;
    copy_item(reader, writer, item, chunk_buf_size)
}

fn copy_item<R: Read, W: Write>(
    reader: &mut ChainPackReader<R>,
    writer: &mut ChainPackWriter<W>,
    item: Item,
    chunk_buf_size: usize,
) -> Result<(), CopyError> {
    match item {
        Item::Invalid | Item::Null => Ok(writer.write_null()?),
        Item::Bool(b) => Ok(writer.write_bool(b)?),
        Item::Int(v) => Ok(writer.write_int(v)?),
        Item::UInt(v) => Ok(writer.write_uint(v)?),
        Item::Double(v) => Ok(writer.write_double(v)?),
        Item::Decimal(v) => Ok(writer.write_decimal(v)?),
        Item::DateTime(v) => Ok(writer.write_datetime(v)?),
        Item::Blob(first) => {
            writer.write_blob_header()?;
            copy_chunked(reader, writer, first, chunk_buf_size)
        }
        Item::String(first) => {
            writer.write_string_header()?;
            copy_chunked(reader, writer, first, chunk_buf_size)
        }
        Item::ListBegin => {
            writer.write_list_begin()?;
            copy_container(reader, writer, chunk_buf_size)?;
            Ok(writer.write_container_end()?)
        }
        Item::MapBegin => {
            writer.write_map_begin()?;
            copy_container(reader, writer, chunk_buf_size)?;
            Ok(writer.write_container_end()?)
        }
        Item::IMapBegin => {
            writer.write_imap_begin()?;
            copy_container(reader, writer, chunk_buf_size)?;
            Ok(writer.write_container_end()?)
        }
        Item::MetaBegin => {
            writer.write_meta_begin()?;
            copy_container(reader, writer, chunk_buf_size)?;
            writer.write_container_end()?;
            let value_item = reader.read_item()?;
            copy_item(reader, writer, value_item, chunk_buf_size)
        }
        Item::ContainerEnd => Err(CopyError::Decode(DecodeError::ContainerStackUnderflow)),
    }
}

/// Copy every item up to and including the matching `ContainerEnd`,
/// stopping just before it so callers can close their own tag (a List's
/// tag differs from a Map's, so `copy_item` writes the open tag itself).
fn copy_container<R: Read, W: Write>(
    reader: &mut ChainPackReader<R>,
    writer: &mut ChainPackWriter<W>,
    chunk_buf_size: usize,
) -> Result<(), CopyError> {
    loop {
        let item = reader.read_item()?;
        if matches!(item, Item::ContainerEnd) {
            return Ok(());
        }
        copy_item(reader, writer, item, chunk_buf_size)?;
    }
}

fn copy_chunked<R: Read, W: Write>(
    reader: &mut ChainPackReader<R>,
    writer: &mut ChainPackWriter<W>,
    first: crate::item::Chunk,
    chunk_buf_size: usize,
) -> Result<(), CopyError> {
    let mut chunk = first;
    loop {
        for piece in chunk.data.chunks(chunk_buf_size) {
            writer.write_chunk_data(piece)?;
        }
        if chunk.last {
            break;
        }
        chunk = reader.read_chunk_next()?;
    }
    Ok(writer.write_chunk_terminator()?)
}

/// Stream-copy: decode a complete ChainPack document from `data` and
/// re-encode it into a fresh `Vec<u8>`, item by item via
/// [`copy_chainpack`], useful for routing a message through a relay
/// without depending on the original framer.
pub fn relay_chainpack(data: &[u8]) -> Result<Vec<u8>, CopyError> {
    let mut reader = ChainPackReader::new(data);
    let mut writer = ChainPackWriter::new(Vec::new());
    copy_chainpack(&mut reader, &mut writer, 4096)?;
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{MetaMap, Value};

    #[test]
    fn chainpack_to_cpon_preserves_meta() {
        let mut meta = MetaMap::new();
        meta.insert(1i64, Value::Int(1));
        let rv = RpcValue::with_meta(meta, Value::String("hi".into()));
        let bytes = chainpack::pack_to_vec(&rv).unwrap();
        let text = chainpack_to_cpon(&bytes).unwrap();
        let back = cpon::parse(&text).unwrap();
        assert_eq!(back, rv);
    }

    #[test]
    fn roundtrip_through_both_codecs() {
        let rv = RpcValue::new(Value::List(vec![RpcValue::new(Value::Int(1)), RpcValue::new(Value::Bool(true))]));
        let bytes = chainpack::pack_to_vec(&rv).unwrap();
        let text = chainpack_to_cpon(&bytes).unwrap();
        let bytes2 = cpon_to_chainpack(&text).unwrap();
        assert_eq!(bytes, bytes2);
    }

    #[test]
    fn relay_chainpack_preserves_nested_meta() {
        let mut meta = MetaMap::new();
        meta.insert(1i64, Value::Int(42));
        let inner = RpcValue::with_meta(meta.clone(), Value::Int(7));
        let rv = RpcValue::new(Value::List(vec![RpcValue::new(Value::Int(1)), inner]));
        let original = chainpack::pack_to_vec(&rv).unwrap();
        let relayed = relay_chainpack(&original).unwrap();
        assert_eq!(original, relayed);
    }

    #[test]
    fn copy_chainpack_forwards_chunked_blob_without_a_small_buffer_failing() {
        let mut src = ChainPackWriter::new(Vec::new());
        src.write_blob_header().unwrap();
        src.write_chunk_data(&[1, 2, 3]).unwrap();
        src.write_chunk_data(&[4, 5, 6, 7]).unwrap();
        src.write_chunk_terminator().unwrap();
        let bytes = src.into_inner();

        let mut reader = ChainPackReader::new(bytes.as_slice());
        let mut writer = ChainPackWriter::new(Vec::new());
        // A buffer far smaller than the blob forces `copy_chunked` to
        // re-split every source chunk, proving the copy doesn't need to
        // hold the whole payload at once.
        copy_chainpack(&mut reader, &mut writer, 2).unwrap();
        let out = writer.into_inner();

        let mut check = ChainPackReader::new(out.as_slice());
        assert_eq!(check.unpack_value().unwrap(), Value::Blob(vec![1, 2, 3, 4, 5, 6, 7]));
    }

    #[test]
    fn zero_chunk_buf_size_is_rejected() {
        let bytes = chainpack::pack_to_vec(&RpcValue::new(Value::Int(1))).unwrap();
        let mut reader = ChainPackReader::new(bytes.as_slice());
        let mut writer = ChainPackWriter::new(Vec::new());
        assert!(matches!(
            copy_chainpack(&mut reader, &mut writer, 0),
            Err(CopyError::Decode(DecodeError::ChunkBufferTooSmall { .. }))
        ));
    }
}
