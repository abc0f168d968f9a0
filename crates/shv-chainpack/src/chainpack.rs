//! ChainPack: the compact binary encoding (§4.1, §6.1).
//!
//! Wire tags (`original_source/libshvchainpack/chainpack.h`'s
//! `chainpack_scheme` enum):
//!
//! ```text
//! 0x00..=0x3F   compact UInt, value = tag
//! 0x40..=0x7F   compact Int,  value = tag - 0x40
//! 0x80          Null
//! 0x81          UInt   (variable-length payload)
//! 0x82          Int    (variable-length, sign-magnitude payload)
//! 0x83          Double (8 bytes, little-endian)
//! 0x85          Blob   (chunked payload)
//! 0x86          String (chunked payload)
//! 0x87          reserved (deprecated epoch datetime, intentionally unsupported)
//! 0x88          List begin
//! 0x89          Map begin
//! 0x8A          IMap begin
//! 0x8B          Meta begin
//! 0x8C          Decimal (mantissa, exponent as sign-magnitude varints)
//! 0x8D          DateTime (packed sign-magnitude varint)
//! 0x8E          CString (NUL-terminated)
//! 0xFD          Bool false
//! 0xFE          Bool true
//! 0xFF          Container end
//! ```
//!
//! Compact tags exist so small non-negative integers (by far the most
//! common case in practice — indices, small counts) cost one byte.
//! `Value::Invalid` has no dedicated tag: it packs as `Null`
//! (`original_source/libshvchainpack/chainpack_pack.c`: "pack invalid as
//! null to ensure we pack at least something") and is never itself
//! produced by a successful decode.

use std::io::{self, Read, Write};

use crate::error::{DecodeError, EncodeError, DEFAULT_DEPTH_LIMIT};
use crate::item::{Chunk, Item};
use crate::value::{Decimal, DateTime, MapKey, MetaKey, MetaMap, RpcValue, Value, CHAINPACK_EPOCH_MSEC};

pub mod tag {
    pub const NULL: u8 = 0x80;
    pub const UINT: u8 = 0x81;
    pub const INT: u8 = 0x82;
    pub const DOUBLE: u8 = 0x83;
    pub const BLOB: u8 = 0x85;
    pub const STRING: u8 = 0x86;
    pub const LIST: u8 = 0x88;
    pub const MAP: u8 = 0x89;
    pub const IMAP: u8 = 0x8A;
    pub const META: u8 = 0x8B;
    pub const DECIMAL: u8 = 0x8C;
    pub const DATETIME: u8 = 0x8D;
    pub const CSTRING: u8 = 0x8E;
    pub const FALSE: u8 = 0xFD;
    pub const TRUE: u8 = 0xFE;
    pub const TERM: u8 = 0xFF;
    pub const COMPACT_UINT_MAX: u8 = 0x3F;
    pub const COMPACT_INT_BASE: u8 = 0x40;
    pub const COMPACT_INT_MAX: u8 = 0x7F;
}

// ---- varint -------------------------------------------------------------
//
// Variable-length integers (§6.1). The leading byte's run of high set bits
// encodes how many bytes follow: `0xxxxxxx` is one byte, `10xxxxxx` two,
// `110xxxxx` three, `1110xxxx` four; `1111xxxx` hands off to a byte-count
// nibble (`0xF0 | (bytes - 5)`) followed by `bytes - 1` plain big-endian
// bytes carrying the whole value. Grounded in
// `original_source/tests/unit/libshvcp/chainpackh.c`'s `int_bytes`/
// `uint_value1` test-vector tables.
//
// Signed values use the same byte-count scheme but steal one value bit for
// a sign flag: the top bit of the value-bearing bits in the lead byte for
// widths 1-4, or the top bit of the first continuation byte for width >= 5
// (`chainpack_pack.c`'s `chainpack_pack_int`). This is sign-magnitude, not
// zigzag — the byte layout's shape doesn't depend on the value's sign, and
// the decoded value is `(negative ? -1 : 1) * magnitude`.

fn uint_bytes_needed(v: u64) -> usize {
    if v <= 0x7F {
        1
    } else if v <= 0x3FFF {
        2
    } else if v <= 0x1F_FFFF {
        3
    } else if v <= 0x0FFF_FFFF {
        4
    } else {
        let mut bytes = 5usize;
        loop {
            let shift = (bytes - 1) * 8;
            if shift >= 64 || v >> shift == 0 {
                return bytes;
            }
            bytes += 1;
        }
    }
}

pub fn write_uvarint<W: Write + ?Sized>(w: &mut W, v: u64) -> io::Result<()> {
    match uint_bytes_needed(v) {
        1 => w.write_all(&[v as u8]),
        2 => w.write_all(&[0x80 | (v >> 8) as u8, v as u8]),
        3 => w.write_all(&[0xC0 | (v >> 16) as u8, (v >> 8) as u8, v as u8]),
        4 => w.write_all(&[
            0xE0 | (v >> 24) as u8,
            (v >> 16) as u8,
            (v >> 8) as u8,
            v as u8,
        ]),
        bytes => {
            let mut buf = vec![0u8; bytes];
            buf[0] = 0xF0 | (bytes - 5) as u8;
            for (i, slot) in buf.iter_mut().enumerate().skip(1) {
                let shift = 8 * (bytes - i - 1);
                *slot = if shift >= 64 { 0 } else { (v >> shift) as u8 };
            }
            w.write_all(&buf)
        }
    }
}

pub fn read_uvarint<R: Read + ?Sized>(r: &mut R) -> Result<u64, DecodeError> {
    let mut b0 = [0u8; 1];
    read_exact(r, &mut b0)?;
    let b0 = b0[0];
    if b0 < 0x80 {
        Ok(b0 as u64)
    } else if b0 < 0xC0 {
        let mut rest = [0u8; 1];
        read_exact(r, &mut rest)?;
        Ok((((b0 & 0x3F) as u64) << 8) | rest[0] as u64)
    } else if b0 < 0xE0 {
        let mut rest = [0u8; 2];
        read_exact(r, &mut rest)?;
        Ok((((b0 & 0x1F) as u64) << 16) | ((rest[0] as u64) << 8) | rest[1] as u64)
    } else if b0 < 0xF0 {
        let mut rest = [0u8; 3];
        read_exact(r, &mut rest)?;
        Ok((((b0 & 0x0F) as u64) << 24)
            | ((rest[0] as u64) << 16)
            | ((rest[1] as u64) << 8)
            | rest[2] as u64)
    } else {
        let bytes = (b0 & 0x0F) as usize + 5;
        if bytes > 9 {
            return Err(DecodeError::malformed(0, format!("varint too wide ({bytes} bytes)")));
        }
        let mut rest = vec![0u8; bytes - 1];
        read_exact(r, &mut rest)?;
        let mut v: u64 = 0;
        for b in rest {
            v = (v << 8) | b as u64;
        }
        Ok(v)
    }
}

fn int_bytes_needed(mag: u64) -> usize {
    if mag <= 0x3F {
        1
    } else if mag <= 0x1FFF {
        2
    } else if mag <= 0xFFFFF {
        3
    } else if mag <= 0x7FF_FFFF {
        4
    } else {
        let mut bytes = 5usize;
        loop {
            let shift = (bytes - 1) * 8 - 1;
            if shift >= 64 || mag >> shift == 0 {
                return bytes;
            }
            bytes += 1;
        }
    }
}

pub fn write_ivarint<W: Write>(w: &mut W, v: i64) -> io::Result<()> {
    let neg = v < 0;
    let mag = v.unsigned_abs();
    match int_bytes_needed(mag) {
        1 => {
            let mut b = (mag & 0x3F) as u8;
            if neg {
                b |= 0x40;
            }
            w.write_all(&[b])
        }
        2 => {
            let mut b0 = 0x80 | ((mag >> 8) & 0x1F) as u8;
            if neg {
                b0 |= 0x20;
            }
            w.write_all(&[b0, mag as u8])
        }
        3 => {
            let mut b0 = 0xC0 | ((mag >> 16) & 0x0F) as u8;
            if neg {
                b0 |= 0x10;
            }
            w.write_all(&[b0, (mag >> 8) as u8, mag as u8])
        }
        4 => {
            let mut b0 = 0xE0 | ((mag >> 24) & 0x07) as u8;
            if neg {
                b0 |= 0x08;
            }
            w.write_all(&[b0, (mag >> 16) as u8, (mag >> 8) as u8, mag as u8])
        }
        bytes => {
            let mut buf = vec![0u8; bytes];
            buf[0] = 0xF0 | (bytes - 5) as u8;
            for (i, slot) in buf.iter_mut().enumerate().skip(1) {
                let shift = 8 * (bytes - i - 1);
                *slot = if shift >= 64 { 0 } else { (mag >> shift) as u8 };
            }
            if neg {
                buf[1] |= 0x80;
            }
            w.write_all(&buf)
        }
    }
}

pub fn read_ivarint<R: Read>(r: &mut R) -> Result<i64, DecodeError> {
    let mut b0 = [0u8; 1];
    read_exact(r, &mut b0)?;
    let b0 = b0[0];
    let (neg, mag): (bool, i128) = if b0 < 0x80 {
        (b0 & 0x40 != 0, (b0 & 0x3F) as i128)
    } else if b0 < 0xC0 {
        let mut rest = [0u8; 1];
        read_exact(r, &mut rest)?;
        (b0 & 0x20 != 0, ((((b0 & 0x1F) as u64) << 8) | rest[0] as u64) as i128)
    } else if b0 < 0xE0 {
        let mut rest = [0u8; 2];
        read_exact(r, &mut rest)?;
        let v = (((b0 & 0x0F) as u64) << 16) | ((rest[0] as u64) << 8) | rest[1] as u64;
        (b0 & 0x10 != 0, v as i128)
    } else if b0 < 0xF0 {
        let mut rest = [0u8; 3];
        read_exact(r, &mut rest)?;
        let v = (((b0 & 0x07) as u64) << 24)
            | ((rest[0] as u64) << 16)
            | ((rest[1] as u64) << 8)
            | rest[2] as u64;
        (b0 & 0x08 != 0, v as i128)
    } else {
        let bytes = (b0 & 0x0F) as usize + 5;
        if bytes > 10 {
            return Err(DecodeError::malformed(0, format!("varint too wide ({bytes} bytes)")));
        }
        let mut rest = vec![0u8; bytes - 1];
        read_exact(r, &mut rest)?;
        let neg = rest[0] & 0x80 != 0;
        let mut mag: u64 = (rest[0] & 0x7F) as u64;
        for &b in &rest[1..] {
            mag = (mag << 8) | b as u64;
        }
        (neg, mag as i128)
    };
    let v: i128 = if neg { -mag } else { mag };
    Ok(v as i64)
}

fn read_exact<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> Result<(), DecodeError> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::Eof
        } else {
            DecodeError::Io(e)
        }
    })
}

// ---- datetime -----------------------------------------------------------
//
// Packed as a single signed varint. Bit 0: has explicit UTC offset. Bit 1:
// the epoch-relative value below is in whole seconds rather than
// milliseconds (set whenever the millisecond remainder is zero, so the
// overwhelmingly common "no sub-second precision" case stays compact).
// When bit 0 is set, the next 7 bits hold a signed quarter-hour offset
// (range -64..63, i.e. -16h..+15h45m). The remaining high bits hold the
// (possibly scaled) signed milliseconds/seconds since `CHAINPACK_EPOCH_MSEC`.

fn pack_datetime(dt: DateTime) -> i64 {
    let epoch_rel_ms = dt.msecs_since_epoch - CHAINPACK_EPOCH_MSEC;
    let has_offset = dt.utc_offset_min != 0;
    let msecs_dropped = epoch_rel_ms.rem_euclid(1000) == 0;
    let mut bits: i64 = if msecs_dropped {
        epoch_rel_ms.div_euclid(1000)
    } else {
        epoch_rel_ms
    };
    let mut shift = 2u32;
    let mut low = 0i64;
    if msecs_dropped {
        low |= 0x2;
    }
    if has_offset {
        low |= 0x1;
        let quarter = (dt.utc_offset_min / 15) as i64 & 0x7F;
        low |= quarter << 2;
        shift += 7;
    }
    bits = bits.wrapping_shl(shift) | low;
    bits
}

fn unpack_datetime(bits: i64) -> DateTime {
    let has_offset = bits & 0x1 != 0;
    let msecs_dropped = bits & 0x2 != 0;
    let mut shift = 2u32;
    let mut utc_offset_min: i16 = 0;
    if has_offset {
        let quarter_raw = (bits >> 2) & 0x7F;
        let quarter = if quarter_raw & 0x40 != 0 {
            quarter_raw | !0x7F
        } else {
            quarter_raw
        };
        utc_offset_min = (quarter * 15) as i16;
        shift += 7;
    }
    let mut value = bits.wrapping_shr(shift);
    if msecs_dropped {
        value = value.wrapping_mul(1000);
    }
    let _ = &mut shift;
    DateTime::new(CHAINPACK_EPOCH_MSEC + value, utc_offset_min)
}

// ---- reader / writer ----------------------------------------------------

/// Streaming ChainPack reader over any [`Read`].
pub struct ChainPackReader<R> {
    inner: R,
    depth: usize,
    depth_limit: usize,
}

impl<R: Read> ChainPackReader<R> {
    pub fn new(inner: R) -> Self {
        ChainPackReader {
            inner,
            depth: 0,
            depth_limit: DEFAULT_DEPTH_LIMIT,
        }
    }

    pub fn with_depth_limit(inner: R, depth_limit: usize) -> Self {
        ChainPackReader {
            inner,
            depth: 0,
            depth_limit,
        }
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let mut b = [0u8; 1];
        read_exact(&mut self.inner, &mut b)?;
        Ok(b[0])
    }

    /// Read the first chunk of a BLOB/STRING payload, right after its tag.
    fn read_first_chunk(&mut self) -> Result<Chunk, DecodeError> {
        let len = read_uvarint(&mut self.inner)? as usize;
        if len == 0 {
            return Ok(Chunk {
                data: Vec::new(),
                first: true,
                last: true,
            });
        }
        let mut data = vec![0u8; len];
        read_exact(&mut self.inner, &mut data)?;
        Ok(Chunk {
            data,
            first: true,
            last: false,
        })
    }

    /// Read the next chunk of a BLOB/STRING payload whose previous chunk
    /// reported `last: false`. A zero-length chunk is the terminator
    /// (§6.1: each chunk is length-prefixed; a zero-length chunk ends the
    /// sequence, so single-shot and truly streamed payloads share one wire
    /// shape).
    pub fn read_chunk_next(&mut self) -> Result<Chunk, DecodeError> {
        let len = read_uvarint(&mut self.inner)? as usize;
        if len == 0 {
            return Ok(Chunk {
                data: Vec::new(),
                first: false,
                last: true,
            });
        }
        let mut data = vec![0u8; len];
        read_exact(&mut self.inner, &mut data)?;
        Ok(Chunk {
            data,
            first: false,
            last: false,
        })
    }

    fn read_cstring(&mut self) -> Result<Chunk, DecodeError> {
        let mut data = Vec::new();
        loop {
            let b = self.read_u8()?;
            if b == 0 {
                break;
            }
            data.push(b);
        }
        Ok(Chunk {
            data,
            first: true,
            last: true,
        })
    }

    /// Read one streaming item. Entering a container increments the depth
    /// counter; [`Item::ContainerEnd`] decrements it.
    pub fn read_item(&mut self) -> Result<Item, DecodeError> {
        let tag = self.read_u8()?;
        match tag {
            0x00..=tag::COMPACT_UINT_MAX => Ok(Item::UInt(tag as u64)),
            tag::COMPACT_INT_BASE..=tag::COMPACT_INT_MAX => {
                Ok(Item::Int((tag - tag::COMPACT_INT_BASE) as i64))
            }
            tag::NULL => Ok(Item::Null),
            tag::UINT => Ok(Item::UInt(read_uvarint(&mut self.inner)?)),
            tag::INT => Ok(Item::Int(read_ivarint(&mut self.inner)?)),
            tag::DOUBLE => {
                let mut b = [0u8; 8];
                read_exact(&mut self.inner, &mut b)?;
                Ok(Item::Double(f64::from_le_bytes(b)))
            }
            tag::FALSE => Ok(Item::Bool(false)),
            tag::TRUE => Ok(Item::Bool(true)),
            tag::BLOB => Ok(Item::Blob(self.read_first_chunk()?)),
            tag::STRING => Ok(Item::String(self.read_first_chunk()?)),
            tag::CSTRING => Ok(Item::String(self.read_cstring()?)),
            tag::DECIMAL => {
                let mantissa = read_ivarint(&mut self.inner)?;
                let exponent = read_ivarint(&mut self.inner)? as i32;
                Ok(Item::Decimal(Decimal::new(mantissa, exponent)))
            }
            tag::DATETIME => {
                let bits = read_ivarint(&mut self.inner)?;
                Ok(Item::DateTime(unpack_datetime(bits)))
            }
            tag::LIST => {
                self.enter_container()?;
                Ok(Item::ListBegin)
            }
            tag::MAP => {
                self.enter_container()?;
                Ok(Item::MapBegin)
            }
            tag::IMAP => {
                self.enter_container()?;
                Ok(Item::IMapBegin)
            }
            tag::META => {
                self.enter_container()?;
                Ok(Item::MetaBegin)
            }
            tag::TERM => {
                if self.depth == 0 {
                    return Err(DecodeError::ContainerStackUnderflow);
                }
                self.depth -= 1;
                Ok(Item::ContainerEnd)
            }
            other => Err(DecodeError::malformed(0, format!("unknown tag 0x{other:02x}"))),
        }
    }

    fn enter_container(&mut self) -> Result<(), DecodeError> {
        if self.depth >= self.depth_limit {
            return Err(DecodeError::DepthLimitExceeded {
                limit: self.depth_limit,
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// Skip one complete value (container and all), discarding its bytes.
    pub fn skip_value(&mut self) -> Result<(), DecodeError> {
        let item = self.read_item()?;
        self.unpack_value_item(item).map(|_| ())
    }

    /// Read one complete tree-shaped [`Value`], including nested containers.
    pub fn unpack_value(&mut self) -> Result<Value, DecodeError> {
        let item = self.read_item()?;
        self.unpack_value_item(item)
    }

    /// Read one complete [`RpcValue`] (value plus any meta that precedes
    /// it) starting from an already-read leading item. Meta can appear at
    /// any nesting depth — inside list elements, map/imap values — not
    /// only at message top level, so every container element loop in
    /// `unpack_value_item` routes through this instead of discarding meta.
    fn read_rpcvalue_from_item(&mut self, item: Item) -> Result<RpcValue, DecodeError> {
        if let Item::MetaBegin = item {
            let meta = self.read_meta_body()?;
            let value_item = self.read_item()?;
            let value = self.unpack_value_item(value_item)?;
            Ok(RpcValue::with_meta(meta, value))
        } else {
            let value = self.unpack_value_item(item)?;
            Ok(RpcValue::new(value))
        }
    }

    fn unpack_value_item(&mut self, item: Item) -> Result<Value, DecodeError> {
        match item {
            Item::Invalid => Ok(Value::Invalid),
            Item::Null => Ok(Value::Null),
            Item::Bool(b) => Ok(Value::Bool(b)),
            Item::Int(v) => Ok(Value::Int(v)),
            Item::UInt(v) => Ok(Value::UInt(v)),
            Item::Double(v) => Ok(Value::Double(v)),
            Item::Decimal(v) => Ok(Value::Decimal(v)),
            Item::DateTime(v) => Ok(Value::DateTime(v)),
            Item::Blob(chunk) => self.read_full_payload(chunk).map(Value::Blob),
            Item::String(chunk) => {
                let bytes = self.read_full_payload(chunk)?;
                String::from_utf8(bytes)
                    .map(Value::String)
                    .map_err(|e| DecodeError::malformed(0, format!("invalid utf-8 string: {e}")))
            }
            Item::ListBegin => {
                let mut items = Vec::new();
                loop {
                    let next = self.read_item()?;
                    if matches!(next, Item::ContainerEnd) {
                        break;
                    }
                    items.push(self.read_rpcvalue_from_item(next)?);
                }
                Ok(Value::List(items))
            }
            Item::MapBegin => {
                let mut entries = Vec::new();
                loop {
                    let key_item = self.read_item()?;
                    if matches!(key_item, Item::ContainerEnd) {
                        break;
                    }
                    let key = self.unpack_value_item(key_item)?;
                    let key = match key {
                        Value::String(s) => s,
                        other => return Err(DecodeError::malformed(0, format!("map key must be string, got {other:?}"))),
                    };
                    let val_item = self.read_item()?;
                    let val = self.read_rpcvalue_from_item(val_item)?;
                    entries.push((key as MapKey, val));
                }
                Ok(Value::Map(entries))
            }
            Item::IMapBegin => {
                let mut entries = Vec::new();
                loop {
                    let key_item = self.read_item()?;
                    if matches!(key_item, Item::ContainerEnd) {
                        break;
                    }
                    let key = self.unpack_value_item(key_item)?;
                    let key = match key {
                        Value::Int(i) => i,
                        Value::UInt(u) => u as i64,
                        other => return Err(DecodeError::malformed(0, format!("imap key must be integer, got {other:?}"))),
                    };
                    let val_item = self.read_item()?;
                    let val = self.read_rpcvalue_from_item(val_item)?;
                    entries.push((key, val));
                }
                Ok(Value::IMap(entries))
            }
            Item::MetaBegin => {
                // A bare meta item with no following value only occurs
                // inside `unpack_rpcvalue`/`read_rpcvalue_from_item`; as a
                // plain Value it has no representation, so drop the meta
                // and surface the annotated value on its own.
                let meta = self.read_meta_body()?;
                let item = self.read_item()?;
                let _ = meta;
                self.unpack_value_item(item)
            }
            Item::ContainerEnd => Err(DecodeError::ContainerStackUnderflow),
        }
    }

    fn read_full_payload(&mut self, first: Chunk) -> Result<Vec<u8>, DecodeError> {
        if first.last {
            return Ok(first.data);
        }
        let mut data = first.data;
        loop {
            let chunk = self.read_chunk_next()?;
            data.extend_from_slice(&chunk.data);
            if chunk.last {
                break;
            }
        }
        Ok(data)
    }

    fn read_meta_body(&mut self) -> Result<MetaMap, DecodeError> {
        let mut meta = MetaMap::new();
        loop {
            let key_item = self.read_item()?;
            if matches!(key_item, Item::ContainerEnd) {
                break;
            }
            let key_val = self.unpack_value_item(key_item)?;
            let key = match key_val {
                Value::Int(i) => MetaKey::Int(i),
                Value::UInt(u) => MetaKey::Int(u as i64),
                Value::String(s) => MetaKey::Str(s),
                other => return Err(DecodeError::malformed(0, format!("meta key must be int or string, got {other:?}"))),
            };
            let val_item = self.read_item()?;
            let val = self.unpack_value_item(val_item)?;
            meta.0.push((key, val));
        }
        Ok(meta)
    }

    /// Read a value with its optional leading [`MetaMap`] — the top-level
    /// shape of every RPC message (spec.md §3.3), and of any value nested
    /// arbitrarily deep inside a List/Map/IMap.
    pub fn unpack_rpcvalue(&mut self) -> Result<RpcValue, DecodeError> {
        let item = self.read_item()?;
        self.read_rpcvalue_from_item(item)
    }
}

/// Streaming ChainPack writer over any [`Write`].
pub struct ChainPackWriter<W> {
    inner: W,
}

impl<W: Write> ChainPackWriter<W> {
    pub fn new(inner: W) -> Self {
        ChainPackWriter { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_null(&mut self) -> Result<(), EncodeError> {
        self.inner.write_all(&[tag::NULL]).map_err(Into::into)
    }

    pub fn write_bool(&mut self, v: bool) -> Result<(), EncodeError> {
        self.inner
            .write_all(&[if v { tag::TRUE } else { tag::FALSE }])
            .map_err(Into::into)
    }

    pub fn write_uint(&mut self, v: u64) -> Result<(), EncodeError> {
        if v <= tag::COMPACT_UINT_MAX as u64 {
            self.inner.write_all(&[v as u8])?;
        } else {
            self.inner.write_all(&[tag::UINT])?;
            write_uvarint(&mut self.inner, v)?;
        }
        Ok(())
    }

    pub fn write_int(&mut self, v: i64) -> Result<(), EncodeError> {
        if (0..=(tag::COMPACT_INT_MAX - tag::COMPACT_INT_BASE) as i64).contains(&v) {
            self.inner.write_all(&[tag::COMPACT_INT_BASE + v as u8])?;
        } else {
            self.inner.write_all(&[tag::INT])?;
            write_ivarint(&mut self.inner, v)?;
        }
        Ok(())
    }

    pub fn write_double(&mut self, v: f64) -> Result<(), EncodeError> {
        self.inner.write_all(&[tag::DOUBLE])?;
        self.inner.write_all(&v.to_le_bytes())?;
        Ok(())
    }

    pub fn write_decimal(&mut self, v: Decimal) -> Result<(), EncodeError> {
        self.inner.write_all(&[tag::DECIMAL])?;
        write_ivarint(&mut self.inner, v.mantissa)?;
        write_ivarint(&mut self.inner, v.exponent as i64)?;
        Ok(())
    }

    pub fn write_datetime(&mut self, v: DateTime) -> Result<(), EncodeError> {
        self.inner.write_all(&[tag::DATETIME])?;
        write_ivarint(&mut self.inner, pack_datetime(v))?;
        Ok(())
    }

    pub fn write_blob_header(&mut self) -> Result<(), EncodeError> {
        self.inner.write_all(&[tag::BLOB]).map_err(Into::into)
    }

    pub fn write_string_header(&mut self) -> Result<(), EncodeError> {
        self.inner.write_all(&[tag::STRING]).map_err(Into::into)
    }

    /// Write one chunk of a BLOB/STRING payload (length prefix plus data).
    /// Callers doing a bounded-memory copy call this repeatedly with
    /// caller-sized slices before finishing with
    /// [`ChainPackWriter::write_chunk_terminator`].
    pub fn write_chunk_data(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        if data.is_empty() {
            return Ok(());
        }
        write_uvarint(&mut self.inner, data.len() as u64)?;
        self.inner.write_all(data)?;
        Ok(())
    }

    /// Close a BLOB/STRING payload with the zero-length terminator chunk.
    pub fn write_chunk_terminator(&mut self) -> Result<(), EncodeError> {
        write_uvarint(&mut self.inner, 0)?;
        Ok(())
    }

    pub fn write_blob(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        self.write_blob_header()?;
        self.write_chunk_data(data)?;
        self.write_chunk_terminator()
    }

    pub fn write_string(&mut self, s: &str) -> Result<(), EncodeError> {
        self.write_string_header()?;
        self.write_chunk_data(s.as_bytes())?;
        self.write_chunk_terminator()
    }

    /// Write the NUL-terminated CSTRING form (§6.1). Errors if `s`
    /// contains a NUL byte, which would be indistinguishable from the
    /// terminator.
    pub fn write_cstring(&mut self, s: &str) -> Result<(), EncodeError> {
        if s.as_bytes().contains(&0) {
            return Err(EncodeError::OutOfRange("cstring must not contain a NUL byte".to_string()));
        }
        self.inner.write_all(&[tag::CSTRING])?;
        self.inner.write_all(s.as_bytes())?;
        self.inner.write_all(&[0])?;
        Ok(())
    }

    pub fn write_list_begin(&mut self) -> Result<(), EncodeError> {
        self.inner.write_all(&[tag::LIST]).map_err(Into::into)
    }

    pub fn write_map_begin(&mut self) -> Result<(), EncodeError> {
        self.inner.write_all(&[tag::MAP]).map_err(Into::into)
    }

    pub fn write_imap_begin(&mut self) -> Result<(), EncodeError> {
        self.inner.write_all(&[tag::IMAP]).map_err(Into::into)
    }

    pub fn write_meta_begin(&mut self) -> Result<(), EncodeError> {
        self.inner.write_all(&[tag::META]).map_err(Into::into)
    }

    pub fn write_container_end(&mut self) -> Result<(), EncodeError> {
        self.inner.write_all(&[tag::TERM]).map_err(Into::into)
    }

    /// Pack one complete [`Value`] tree, recursing into containers.
    pub fn pack_value(&mut self, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Invalid => self.write_null(),
            Value::Null => self.write_null(),
            Value::Bool(b) => self.write_bool(*b),
            Value::Int(v) => self.write_int(*v),
            Value::UInt(v) => self.write_uint(*v),
            Value::Double(v) => self.write_double(*v),
            Value::Decimal(v) => self.write_decimal(*v),
            Value::DateTime(v) => self.write_datetime(*v),
            Value::Blob(b) => self.write_blob(b),
            Value::String(s) => self.write_string(s),
            Value::List(items) => {
                self.write_list_begin()?;
                for item in items {
                    self.pack_rpcvalue(item)?;
                }
                self.write_container_end()
            }
            Value::Map(entries) => {
                self.write_map_begin()?;
                for (k, v) in entries {
                    self.write_string(k)?;
                    self.pack_rpcvalue(v)?;
                }
                self.write_container_end()
            }
            Value::IMap(entries) => {
                self.write_imap_begin()?;
                for (k, v) in entries {
                    self.write_int(*k)?;
                    self.pack_rpcvalue(v)?;
                }
                self.write_container_end()
            }
        }
    }

    /// Pack a value together with its leading [`MetaMap`] if non-empty.
    pub fn pack_rpcvalue(&mut self, value: &RpcValue) -> Result<(), EncodeError> {
        if !value.meta.is_empty() {
            self.write_meta_begin()?;
            for (k, v) in &value.meta.0 {
                match k {
                    MetaKey::Int(i) => self.write_int(*i)?,
                    MetaKey::Str(s) => self.write_string(s)?,
                }
                self.pack_value(v)?;
            }
            self.write_container_end()?;
        }
        self.pack_value(&value.value)
    }
}

/// One-shot helpers for the common "encode to a `Vec<u8>`" / "decode a
/// complete in-memory buffer" paths.
pub fn pack_to_vec(value: &RpcValue) -> Result<Vec<u8>, EncodeError> {
    let mut w = ChainPackWriter::new(Vec::new());
    w.pack_rpcvalue(value)?;
    Ok(w.into_inner())
}

pub fn unpack_from_slice(data: &[u8]) -> Result<RpcValue, DecodeError> {
    let mut r = ChainPackReader::new(data);
    r.unpack_rpcvalue()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: Value) -> Value {
        let mut w = ChainPackWriter::new(Vec::new());
        w.pack_value(&v).unwrap();
        let bytes = w.into_inner();
        let mut r = ChainPackReader::new(bytes.as_slice());
        r.unpack_value().unwrap()
    }

    #[test]
    fn small_uints_use_compact_form() {
        let mut w = ChainPackWriter::new(Vec::new());
        w.write_uint(42).unwrap();
        assert_eq!(w.into_inner(), vec![42]);
    }

    #[test]
    fn large_uint_roundtrips() {
        assert_eq!(roundtrip(Value::UInt(u64::MAX)), Value::UInt(u64::MAX));
        assert_eq!(roundtrip(Value::UInt(1 << 40)), Value::UInt(1 << 40));
    }

    #[test]
    fn negative_int_roundtrips() {
        assert_eq!(roundtrip(Value::Int(-1)), Value::Int(-1));
        assert_eq!(roundtrip(Value::Int(i64::MIN)), Value::Int(i64::MIN));
        assert_eq!(roundtrip(Value::Int(i64::MAX)), Value::Int(i64::MAX));
    }

    #[test]
    fn int_uses_sign_magnitude_not_zigzag() {
        // Zigzag would encode -65 as varint(129), losing the compact range
        // entirely; sign-magnitude keeps the magnitude and a sign bit in
        // the first byte of the extended-int payload.
        let mut w = ChainPackWriter::new(Vec::new());
        w.write_int(-65).unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes[0], tag::INT);
        assert_eq!(bytes[1], 0x40 | 1);
    }

    #[test]
    fn string_roundtrips() {
        assert_eq!(
            roundtrip(Value::String("hello, shv".into())),
            Value::String("hello, shv".into())
        );
    }

    #[test]
    fn blob_roundtrips() {
        let data = vec![0u8, 1, 2, 255, 254];
        assert_eq!(roundtrip(Value::Blob(data.clone())), Value::Blob(data));
    }

    #[test]
    fn empty_blob_and_string_roundtrip() {
        assert_eq!(roundtrip(Value::Blob(vec![])), Value::Blob(vec![]));
        assert_eq!(roundtrip(Value::String(String::new())), Value::String(String::new()));
    }

    #[test]
    fn chunked_blob_reads_back_as_one_value() {
        let mut w = ChainPackWriter::new(Vec::new());
        w.write_blob_header().unwrap();
        w.write_chunk_data(&[1, 2, 3]).unwrap();
        w.write_chunk_data(&[4, 5, 6, 7]).unwrap();
        w.write_chunk_terminator().unwrap();
        let bytes = w.into_inner();
        let mut r = ChainPackReader::new(bytes.as_slice());
        assert_eq!(r.unpack_value().unwrap(), Value::Blob(vec![1, 2, 3, 4, 5, 6, 7]));
    }

    #[test]
    fn cstring_roundtrips_through_reader() {
        let mut bytes = vec![tag::CSTRING];
        bytes.extend_from_slice(b"hello");
        bytes.push(0);
        let mut r = ChainPackReader::new(bytes.as_slice());
        assert_eq!(r.unpack_value().unwrap(), Value::String("hello".to_string()));
    }

    #[test]
    fn nested_list_and_map_roundtrip() {
        let v = Value::List(vec![
            RpcValue::new(Value::Int(1)),
            RpcValue::new(Value::String("two".into())),
            RpcValue::new(Value::Map(vec![(
                "k".to_string(),
                RpcValue::new(Value::Bool(true)),
            )])),
        ]);
        assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn decimal_roundtrips() {
        let d = Decimal::new(125, -2);
        assert_eq!(roundtrip(Value::Decimal(d)), Value::Decimal(d));
    }

    #[test]
    fn datetime_roundtrips_with_and_without_offset() {
        for dt in [
            DateTime::utc(CHAINPACK_EPOCH_MSEC),
            DateTime::new(CHAINPACK_EPOCH_MSEC + 1_500, 0),
            DateTime::new(CHAINPACK_EPOCH_MSEC - 1_500, 60),
            DateTime::new(CHAINPACK_EPOCH_MSEC + 3_661_000, -90),
        ] {
            assert_eq!(roundtrip(Value::DateTime(dt)), Value::DateTime(dt));
        }
    }

    #[test]
    fn unbalanced_container_end_is_an_error() {
        let mut r = ChainPackReader::new([tag::TERM].as_slice());
        assert!(matches!(
            r.read_item(),
            Err(DecodeError::ContainerStackUnderflow)
        ));
    }

    #[test]
    fn meta_is_preserved_through_pack_and_unpack() {
        let mut meta = MetaMap::new();
        meta.insert(1i64, Value::Int(1));
        meta.insert(8i64, Value::String("get".to_string()));
        let rv = RpcValue::with_meta(meta.clone(), Value::Int(42));
        let bytes = pack_to_vec(&rv).unwrap();
        let back = unpack_from_slice(&bytes).unwrap();
        assert_eq!(back.meta, meta);
        assert_eq!(back.value, Value::Int(42));
    }

    #[test]
    fn meta_nested_inside_list_is_preserved() {
        let mut meta = MetaMap::new();
        meta.insert(1i64, Value::Int(7));
        let inner = RpcValue::with_meta(meta.clone(), Value::Int(42));
        let rv = RpcValue::new(Value::List(vec![RpcValue::new(Value::Int(1)), inner]));
        let bytes = pack_to_vec(&rv).unwrap();
        let back = unpack_from_slice(&bytes).unwrap();
        let Value::List(items) = &back.value else {
            panic!("expected a list");
        };
        assert_eq!(items[1].meta, meta);
        assert_eq!(items[1].value, Value::Int(42));
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut buf = Vec::new();
        for _ in 0..10 {
            buf.push(tag::LIST);
        }
        let mut r = ChainPackReader::with_depth_limit(buf.as_slice(), 5);
        let mut err = None;
        for _ in 0..10 {
            if let Err(e) = r.read_item() {
                err = Some(e);
                break;
            }
        }
        assert!(matches!(err, Some(DecodeError::DepthLimitExceeded { limit: 5 })));
    }
}
