//! The self-describing value tree (§3.1, §3.2 of the protocol design).
//!
//! [`RpcValue`] is the tree-shaped convenience representation built on top
//! of the streaming [`Item`](crate::item::Item) API. Most call sites want
//! this; the streaming API exists for the chunked BLOB/STRING case where
//! materializing the whole value would defeat the point.

use std::fmt;

/// ChainPack epoch: 2018-02-02T00:00:00Z, in milliseconds since the Unix
/// epoch. DateTime values are packed relative to this constant.
pub const CHAINPACK_EPOCH_MSEC: i64 = 1_517_529_600_000;

/// Arbitrary-precision-free decimal: `mantissa * 10^exponent`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decimal {
    pub mantissa: i64,
    pub exponent: i32,
}

impl Decimal {
    pub fn new(mantissa: i64, exponent: i32) -> Self {
        Decimal { mantissa, exponent }
    }

    pub fn to_f64(self) -> f64 {
        self.mantissa as f64 * 10f64.powi(self.exponent)
    }

    /// Canonicalize by stripping trailing zeros from the mantissa into the
    /// exponent, matching the "shorter form" re-pack rule from the decimal
    /// round-trip test (`1.25` and `125e-2` both canonicalize the same way).
    pub fn normalize(self) -> Self {
        let mut mantissa = self.mantissa;
        let mut exponent = self.exponent;
        if mantissa == 0 {
            return Decimal::new(0, 0);
        }
        while mantissa % 10 == 0 {
            mantissa /= 10;
            exponent += 1;
        }
        Decimal::new(mantissa, exponent)
    }

    /// Whether the compact decimal-point text form (`1.25`) should be used
    /// on re-pack, versus the scientific form (`125e-2`).
    pub fn prefers_point_form(self) -> bool {
        (-9..=6).contains(&self.exponent)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}e{}", self.mantissa, self.exponent)
    }
}

/// A point in time with an explicit UTC offset, stored as milliseconds
/// since the Unix epoch plus an offset in minutes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateTime {
    pub msecs_since_epoch: i64,
    pub utc_offset_min: i16,
}

impl DateTime {
    pub fn new(msecs_since_epoch: i64, utc_offset_min: i16) -> Self {
        DateTime {
            msecs_since_epoch,
            utc_offset_min,
        }
    }

    pub fn utc(msecs_since_epoch: i64) -> Self {
        DateTime::new(msecs_since_epoch, 0)
    }
}

/// Key type for [`RpcValue::Map`] and the precursor to meta-map entries.
pub type MapKey = String;

/// A meta-map entry key: SHV meta maps mix integer tags (envelope fields)
/// and, less commonly, string tags (extension data).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetaKey {
    Int(i64),
    Str(String),
}

impl From<i64> for MetaKey {
    fn from(v: i64) -> Self {
        MetaKey::Int(v)
    }
}

impl From<&str> for MetaKey {
    fn from(v: &str) -> Self {
        MetaKey::Str(v.to_string())
    }
}

/// The META container: an ordered list of key/value pairs attached as a
/// prefix to the value that follows it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetaMap(pub Vec<(MetaKey, Value)>);

impl MetaMap {
    pub fn new() -> Self {
        MetaMap(Vec::new())
    }

    pub fn get(&self, key: &MetaKey) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_int(&self, key: i64) -> Option<&Value> {
        self.get(&MetaKey::Int(key))
    }

    pub fn insert(&mut self, key: impl Into<MetaKey>, value: impl Into<Value>) {
        let key = key.into();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value.into();
        } else {
            self.0.push((key, value.into()));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One of the tagged variants exchanged on the wire (§3.1).
///
/// `Invalid` is a decode-failure sentinel, never produced by a successful
/// unpack of well-formed input.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Invalid,
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    Decimal(Decimal),
    DateTime(DateTime),
    Blob(Vec<u8>),
    String(String),
    List(Vec<RpcValue>),
    Map(Vec<(MapKey, RpcValue)>),
    IMap(Vec<(i64, RpcValue)>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

/// A [`Value`] together with the optional [`MetaMap`] that precedes it on
/// the wire. Every message (§3.3) is an `RpcValue` whose `meta` carries the
/// envelope.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RpcValue {
    pub meta: MetaMap,
    pub value: Value,
}

impl Default for Value {
    fn default() -> Self {
        Value::Invalid
    }
}

impl RpcValue {
    pub fn new(value: impl Into<Value>) -> Self {
        RpcValue {
            meta: MetaMap::new(),
            value: value.into(),
        }
    }

    pub fn with_meta(meta: MetaMap, value: impl Into<Value>) -> Self {
        RpcValue {
            meta,
            value: value.into(),
        }
    }

    pub fn null() -> Self {
        RpcValue::new(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match &self.value {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match &self.value {
            Value::UInt(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RpcValue]> {
        match &self.value {
            Value::List(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(MapKey, RpcValue)]> {
        match &self.value {
            Value::Map(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_imap(&self) -> Option<&[(i64, RpcValue)]> {
        match &self.value {
            Value::IMap(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn imap_get(&self, key: i64) -> Option<&RpcValue> {
        self.as_imap()?.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn map_get(&self, key: &str) -> Option<&RpcValue> {
        self.as_map()?.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl<T: Into<Value>> From<T> for RpcValue {
    fn from(v: T) -> Self {
        RpcValue::new(v)
    }
}
