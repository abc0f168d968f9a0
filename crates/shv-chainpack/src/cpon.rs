//! Cpon: the human-readable CP-text encoding (§4.1, §6.1).
//!
//! Syntax is JSON-like with SHV extensions: `i{...}` maps use integer keys,
//! meta precedes a value as `<1:2,8:"get">value`, decimals are written
//! `1.25` or `125e-2`, blobs as `hex"..."` or `b"..."` (bytes), and
//! datetimes as `d"2021-01-01T00:00:00Z"`.

use crate::error::{DecodeError, EncodeError, DEFAULT_DEPTH_LIMIT};
use crate::value::{Decimal, DateTime, MapKey, MetaKey, MetaMap, RpcValue, Value, CHAINPACK_EPOCH_MSEC};

/// Parse a complete Cpon document (optionally meta-prefixed) from a `&str`.
pub fn parse(input: &str) -> Result<RpcValue, DecodeError> {
    let mut p = Parser::new(input);
    let v = p.parse_rpcvalue()?;
    p.skip_ws();
    if !p.at_end() {
        return Err(p.err("trailing data after value"));
    }
    Ok(v)
}

/// Render a value (with meta, if any) as Cpon text.
pub fn to_string(value: &RpcValue) -> Result<String, EncodeError> {
    let mut out = String::new();
    let mut w = Writer {
        out: &mut out,
        depth: 0,
        depth_limit: DEFAULT_DEPTH_LIMIT,
    };
    w.write_rpcvalue(value)?;
    Ok(out)
}

struct Parser<'a> {
    s: &'a [u8],
    pos: usize,
    depth: usize,
    depth_limit: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Parser {
            s: input.as_bytes(),
            pos: 0,
            depth: 0,
            depth_limit: DEFAULT_DEPTH_LIMIT,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.s.len()
    }

    fn peek(&self) -> Option<u8> {
        self.s.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn err(&self, msg: impl Into<String>) -> DecodeError {
        DecodeError::malformed(self.pos as u64, msg)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, c: u8) -> Result<(), DecodeError> {
        match self.bump() {
            Some(x) if x == c => Ok(()),
            Some(x) => Err(self.err(format!("expected '{}', got '{}'", c as char, x as char))),
            None => Err(DecodeError::Eof),
        }
    }

    fn enter(&mut self) -> Result<(), DecodeError> {
        if self.depth >= self.depth_limit {
            return Err(DecodeError::DepthLimitExceeded {
                limit: self.depth_limit,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_rpcvalue(&mut self) -> Result<RpcValue, DecodeError> {
        self.skip_ws();
        let meta = if self.peek() == Some(b'<') {
            Some(self.parse_meta()?)
        } else {
            None
        };
        self.skip_ws();
        let value = self.parse_value()?;
        Ok(match meta {
            Some(m) => RpcValue::with_meta(m, value),
            None => RpcValue::new(value),
        })
    }

    fn parse_meta(&mut self) -> Result<MetaMap, DecodeError> {
        self.expect(b'<')?;
        self.enter()?;
        let mut meta = MetaMap::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b'>') {
                self.bump();
                break;
            }
            let key_val = self.parse_value()?;
            let key = match key_val {
                Value::Int(i) => MetaKey::Int(i),
                Value::UInt(u) => MetaKey::Int(u as i64),
                Value::String(s) => MetaKey::Str(s),
                other => return Err(self.err(format!("invalid meta key {other:?}"))),
            };
            self.skip_ws();
            self.expect(b':')?;
            self.skip_ws();
            let val = self.parse_value()?;
            meta.0.push((key, val));
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.bump();
                }
                Some(b'>') => {
                    self.bump();
                    break;
                }
                _ => return Err(self.err("expected ',' or '>' in meta")),
            }
        }
        self.leave();
        Ok(meta)
    }

    fn parse_value(&mut self) -> Result<Value, DecodeError> {
        self.skip_ws();
        match self.peek() {
            None => Err(DecodeError::Eof),
            Some(b'n') => {
                self.expect_literal("null")?;
                Ok(Value::Null)
            }
            Some(b't') => {
                self.expect_literal("true")?;
                Ok(Value::Bool(true))
            }
            Some(b'f') => {
                self.expect_literal("false")?;
                Ok(Value::Bool(false))
            }
            Some(b'"') => self.parse_string().map(Value::String),
            Some(b'b') if self.s.get(self.pos + 1) == Some(&b'"') => {
                self.bump();
                let s = self.parse_raw_quoted()?;
                Ok(Value::Blob(s))
            }
            Some(b'h') if self.s[self.pos..].starts_with(b"hex\"") => {
                self.pos += 3;
                let raw = self.parse_raw_quoted()?;
                decode_hex(&raw).map(Value::Blob)
            }
            Some(b'd') if self.s.get(self.pos + 1) == Some(&b'"') => {
                self.bump();
                let s = String::from_utf8(self.parse_raw_quoted()?)
                    .map_err(|_| self.err("invalid utf-8 in datetime literal"))?;
                parse_datetime_text(&s).map(Value::DateTime).map_err(|m| self.err(m))
            }
            Some(b'i') if self.s.get(self.pos + 1) == Some(&b'{') => {
                self.pos += 1;
                self.parse_imap()
            }
            Some(b'[') => self.parse_list(),
            Some(b'{') => self.parse_map(),
            Some(c) if c == b'-' || c.is_ascii_digit() => self.parse_number(),
            Some(c) => Err(self.err(format!("unexpected character '{}'", c as char))),
        }
    }

    fn expect_literal(&mut self, lit: &str) -> Result<(), DecodeError> {
        let bytes = lit.as_bytes();
        if self.s[self.pos..].starts_with(bytes) {
            self.pos += bytes.len();
            Ok(())
        } else {
            Err(self.err(format!("expected literal '{lit}'")))
        }
    }

    fn parse_raw_quoted(&mut self) -> Result<Vec<u8>, DecodeError> {
        self.expect(b'"')?;
        let mut out = Vec::new();
        loop {
            match self.bump() {
                Some(b'"') => break,
                Some(b'\\') => out.push(self.read_escape()?),
                Some(c) => out.push(c),
                None => return Err(DecodeError::Eof),
            }
        }
        Ok(out)
    }

    fn parse_string(&mut self) -> Result<String, DecodeError> {
        let raw = self.parse_raw_quoted()?;
        String::from_utf8(raw).map_err(|_| self.err("invalid utf-8 in string literal"))
    }

    fn read_escape(&mut self) -> Result<u8, DecodeError> {
        match self.bump() {
            Some(b'n') => Ok(b'\n'),
            Some(b't') => Ok(b'\t'),
            Some(b'r') => Ok(b'\r'),
            Some(b'\\') => Ok(b'\\'),
            Some(b'"') => Ok(b'"'),
            Some(b'0') => Ok(0),
            Some(c) => Ok(c),
            None => Err(DecodeError::Eof),
        }
    }

    fn parse_list(&mut self) -> Result<Value, DecodeError> {
        self.expect(b'[')?;
        self.enter()?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b']') {
                self.bump();
                break;
            }
            items.push(RpcValue::new(self.parse_value()?));
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.bump();
                }
                Some(b']') => {
                    self.bump();
                    break;
                }
                _ => return Err(self.err("expected ',' or ']' in list")),
            }
        }
        self.leave();
        Ok(Value::List(items))
    }

    fn parse_map(&mut self) -> Result<Value, DecodeError> {
        self.expect(b'{')?;
        self.enter()?;
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b'}') {
                self.bump();
                break;
            }
            let key = self.parse_string()?;
            self.skip_ws();
            self.expect(b':')?;
            self.skip_ws();
            let val = self.parse_value()?;
            entries.push((key as MapKey, RpcValue::new(val)));
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.bump();
                }
                Some(b'}') => {
                    self.bump();
                    break;
                }
                _ => return Err(self.err("expected ',' or '}' in map")),
            }
        }
        self.leave();
        Ok(Value::Map(entries))
    }

    fn parse_imap(&mut self) -> Result<Value, DecodeError> {
        self.expect(b'{')?;
        self.enter()?;
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b'}') {
                self.bump();
                break;
            }
            let key = match self.parse_number()? {
                Value::Int(i) => i,
                Value::UInt(u) => u as i64,
                other => return Err(self.err(format!("imap key must be integer, got {other:?}"))),
            };
            self.skip_ws();
            self.expect(b':')?;
            self.skip_ws();
            let val = self.parse_value()?;
            entries.push((key, RpcValue::new(val)));
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.bump();
                }
                Some(b'}') => {
                    self.bump();
                    break;
                }
                _ => return Err(self.err("expected ',' or '}' in imap")),
            }
        }
        self.leave();
        Ok(Value::IMap(entries))
    }

    fn parse_number(&mut self) -> Result<Value, DecodeError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.bump();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        let mut is_float = false;
        let mut is_decimal = false;
        if self.peek() == Some(b'.') {
            is_float = true;
            is_decimal = true;
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            is_float = true;
            self.bump();
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.bump();
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        let has_u_suffix = self.peek() == Some(b'u');
        let has_decimal_tag = self.peek() == Some(b'n') && !has_u_suffix;
        let text = std::str::from_utf8(&self.s[start..self.pos]).unwrap();
        if has_u_suffix {
            self.bump();
            let v: u64 = text.parse().map_err(|_| self.err("invalid unsigned literal"))?;
            return Ok(Value::UInt(v));
        }
        if has_decimal_tag {
            self.bump();
            is_decimal = true;
        }
        if is_decimal && !text.contains(['.', 'e', 'E']) {
            let mantissa: i64 = text.parse().map_err(|_| self.err("invalid decimal literal"))?;
            return Ok(Value::Decimal(Decimal::new(mantissa, 0)));
        }
        if is_float && is_decimal {
            return text_to_decimal(text)
                .map(Value::Decimal)
                .ok_or_else(|| self.err("invalid decimal literal"));
        }
        if is_float {
            let v: f64 = text.parse().map_err(|_| self.err("invalid double literal"))?;
            return Ok(Value::Double(v));
        }
        let v: i64 = text.parse().map_err(|_| self.err("invalid integer literal"))?;
        Ok(Value::Int(v))
    }
}

fn text_to_decimal(text: &str) -> Option<Decimal> {
    let (mantissa_part, exp_part) = match text.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (text, None),
    };
    let (int_part, frac_part) = match mantissa_part.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa_part, ""),
    };
    let digits = format!("{int_part}{frac_part}");
    let mantissa: i64 = digits.parse().ok()?;
    let frac_exp = -(frac_part.len() as i32);
    let extra_exp: i32 = match exp_part {
        Some(e) => e.parse().ok()?,
        None => 0,
    };
    Some(Decimal::new(mantissa, frac_exp + extra_exp))
}

fn decode_hex(raw: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if raw.len() % 2 != 0 {
        return Err(DecodeError::malformed(0, "odd-length hex blob"));
    }
    raw.chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some((hi * 16 + lo) as u8)
        })
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| DecodeError::malformed(0, "invalid hex digit in blob"))
}

fn parse_datetime_text(s: &str) -> Result<DateTime, String> {
    // "YYYY-MM-DDTHH:MM:SS[.mmm](Z|+HH:MM|-HH:MM)"
    let (date_part, rest) = s.split_once('T').ok_or_else(|| "missing 'T' in datetime".to_string())?;
    let mut ymd = date_part.split('-');
    let year: i64 = ymd.next().and_then(|v| v.parse().ok()).ok_or("bad year")?;
    let month: i64 = ymd.next().and_then(|v| v.parse().ok()).ok_or("bad month")?;
    let day: i64 = ymd.next().and_then(|v| v.parse().ok()).ok_or("bad day")?;

    let (tz_idx, offset_min) = if let Some(idx) = rest.find('Z') {
        (idx, 0i16)
    } else if let Some(idx) = rest.rfind(['+', '-']) {
        let tz = &rest[idx..];
        let sign = if tz.starts_with('-') { -1 } else { 1 };
        let tz = &tz[1..];
        let (h, m) = tz.split_once(':').unwrap_or((tz, "0"));
        let h: i64 = h.parse().map_err(|_| "bad tz hour".to_string())?;
        let m: i64 = m.parse().map_err(|_| "bad tz minute".to_string())?;
        (idx, (sign * (h * 60 + m)) as i16)
    } else {
        (rest.len(), 0i16)
    };
    let time_part = &rest[..tz_idx];
    let mut hms = time_part.splitn(3, ':');
    let hour: i64 = hms.next().and_then(|v| v.parse().ok()).ok_or("bad hour")?;
    let min: i64 = hms.next().and_then(|v| v.parse().ok()).ok_or("bad minute")?;
    let sec_part = hms.next().unwrap_or("0");
    let (sec, msec): (i64, i64) = match sec_part.split_once('.') {
        Some((s, f)) => {
            let s: i64 = s.parse().map_err(|_| "bad second".to_string())?;
            let mut f = f.to_string();
            f.truncate(3.min(f.len()));
            while f.len() < 3 {
                f.push('0');
            }
            (s, f.parse().map_err(|_| "bad fraction".to_string())?)
        }
        None => (sec_part.parse().map_err(|_| "bad second".to_string())?, 0),
    };

    let days = days_from_civil(year, month, day);
    let msecs = days * 86_400_000 + hour * 3_600_000 + min * 60_000 + sec * 1000 + msec;
    Ok(DateTime::new(msecs - offset_min as i64 * 60_000, offset_min))
}

/// Howard Hinnant's days-from-civil algorithm, proleptic Gregorian.
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn format_datetime_text(dt: DateTime) -> String {
    let local_ms = dt.msecs_since_epoch + dt.utc_offset_min as i64 * 60_000;
    let days = local_ms.div_euclid(86_400_000);
    let ms_of_day = local_ms.rem_euclid(86_400_000);
    let (y, m, d) = civil_from_days(days);
    let hour = ms_of_day / 3_600_000;
    let min = (ms_of_day / 60_000) % 60;
    let sec = (ms_of_day / 1000) % 60;
    let msec = ms_of_day % 1000;
    let tz = if dt.utc_offset_min == 0 {
        "Z".to_string()
    } else {
        let sign = if dt.utc_offset_min < 0 { '-' } else { '+' };
        let abs = dt.utc_offset_min.abs();
        format!("{sign}{:02}:{:02}", abs / 60, abs % 60)
    };
    if msec == 0 {
        format!("{y:04}-{m:02}-{d:02}T{hour:02}:{min:02}:{sec:02}{tz}")
    } else {
        format!("{y:04}-{m:02}-{d:02}T{hour:02}:{min:02}:{sec:02}.{msec:03}{tz}")
    }
}

struct Writer<'a> {
    out: &'a mut String,
    depth: usize,
    depth_limit: usize,
}

impl<'a> Writer<'a> {
    fn enter(&mut self) -> Result<(), EncodeError> {
        if self.depth >= self.depth_limit {
            return Err(EncodeError::DepthLimitExceeded {
                limit: self.depth_limit,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn write_rpcvalue(&mut self, v: &RpcValue) -> Result<(), EncodeError> {
        if !v.meta.is_empty() {
            self.out.push('<');
            self.enter()?;
            for (i, (k, val)) in v.meta.0.iter().enumerate() {
                if i > 0 {
                    self.out.push(',');
                }
                match k {
                    MetaKey::Int(n) => self.out.push_str(&n.to_string()),
                    MetaKey::Str(s) => self.write_string_literal(s),
                }
                self.out.push(':');
                self.write_value(val)?;
            }
            self.leave();
            self.out.push('>');
        }
        self.write_value(&v.value)
    }

    fn write_string_literal(&mut self, s: &str) {
        self.out.push('"');
        for c in s.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\t' => self.out.push_str("\\t"),
                '\r' => self.out.push_str("\\r"),
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }

    fn write_value(&mut self, v: &Value) -> Result<(), EncodeError> {
        match v {
            Value::Invalid => self.out.push_str("<invalid>"),
            Value::Null => self.out.push_str("null"),
            Value::Bool(true) => self.out.push_str("true"),
            Value::Bool(false) => self.out.push_str("false"),
            Value::Int(i) => self.out.push_str(&i.to_string()),
            Value::UInt(u) => {
                self.out.push_str(&u.to_string());
                self.out.push('u');
            }
            Value::Double(d) => {
                if d.fract() == 0.0 && d.is_finite() {
                    self.out.push_str(&format!("{d:.1}"));
                } else {
                    self.out.push_str(&d.to_string());
                }
            }
            Value::Decimal(dec) => {
                let dec = dec.normalize();
                if dec.prefers_point_form() && dec.exponent <= 0 {
                    let scale = (-dec.exponent) as usize;
                    let s = dec.mantissa.unsigned_abs().to_string();
                    let s = if s.len() <= scale {
                        format!("{}{}", "0".repeat(scale - s.len() + 1), s)
                    } else {
                        s
                    };
                    let (int_part, frac_part) = s.split_at(s.len() - scale);
                    let sign = if dec.mantissa < 0 { "-" } else { "" };
                    if scale == 0 {
                        self.out.push_str(&format!("{sign}{int_part}n"));
                    } else {
                        self.out.push_str(&format!("{sign}{int_part}.{frac_part}"));
                    }
                } else {
                    self.out.push_str(&format!("{}e{}", dec.mantissa, dec.exponent));
                }
            }
            Value::DateTime(dt) => {
                self.out.push('d');
                self.write_string_literal(&format_datetime_text(*dt));
            }
            Value::Blob(b) => {
                self.out.push_str("hex\"");
                for byte in b {
                    self.out.push_str(&format!("{byte:02x}"));
                }
                self.out.push('"');
            }
            Value::String(s) => self.write_string_literal(s),
            Value::List(items) => {
                self.out.push('[');
                self.enter()?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.write_rpcvalue(item)?;
                }
                self.leave();
                self.out.push(']');
            }
            Value::Map(entries) => {
                self.out.push('{');
                self.enter()?;
                for (i, (k, val)) in entries.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.write_string_literal(k);
                    self.out.push(':');
                    self.write_rpcvalue(val)?;
                }
                self.leave();
                self.out.push('}');
            }
            Value::IMap(entries) => {
                self.out.push_str("i{");
                self.enter()?;
                for (i, (k, val)) in entries.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.out.push_str(&k.to_string());
                    self.out.push(':');
                    self.write_rpcvalue(val)?;
                }
                self.leave();
                self.out.push('}');
            }
        }
        Ok(())
    }
}

#[allow(dead_code)]
fn unused_epoch_reference() -> i64 {
    CHAINPACK_EPOCH_MSEC
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: Value) -> Value {
        let rv = RpcValue::new(v);
        let text = to_string(&rv).unwrap();
        parse(&text).unwrap().value
    }

    #[test]
    fn null_true_false() {
        assert_eq!(parse("null").unwrap().value, Value::Null);
        assert_eq!(parse("true").unwrap().value, Value::Bool(true));
        assert_eq!(parse("false").unwrap().value, Value::Bool(false));
    }

    #[test]
    fn integers_and_uints() {
        assert_eq!(parse("42").unwrap().value, Value::Int(42));
        assert_eq!(parse("-7").unwrap().value, Value::Int(-7));
        assert_eq!(parse("42u").unwrap().value, Value::UInt(42));
    }

    #[test]
    fn decimal_point_and_scientific_forms_are_equivalent() {
        let a = parse("1.25").unwrap().value;
        let b = parse("125e-2").unwrap().value;
        match (a, b) {
            (Value::Decimal(da), Value::Decimal(db)) => {
                assert_eq!(da.normalize(), db.normalize());
            }
            other => panic!("expected decimals, got {other:?}"),
        }
    }

    #[test]
    fn string_roundtrips() {
        assert_eq!(roundtrip(Value::String("hi \"there\"\n".into())), Value::String("hi \"there\"\n".into()));
    }

    #[test]
    fn blob_roundtrips_as_hex() {
        let data = vec![0xDE, 0xAD, 0xBE, 0xEF];
        assert_eq!(roundtrip(Value::Blob(data.clone())), Value::Blob(data));
    }

    #[test]
    fn list_and_map_roundtrip() {
        let v = Value::List(vec![
            RpcValue::new(Value::Int(1)),
            RpcValue::new(Value::Map(vec![("a".into(), RpcValue::new(Value::Bool(true)))])),
        ]);
        assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn imap_roundtrips() {
        let v = Value::IMap(vec![(1, RpcValue::new(Value::Int(10))), (8, RpcValue::new(Value::String("get".into())))]);
        assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn meta_roundtrips() {
        let mut meta = MetaMap::new();
        meta.insert(1i64, Value::Int(1));
        meta.insert(8i64, Value::String("get".to_string()));
        let rv = RpcValue::with_meta(meta.clone(), Value::Int(42));
        let text = to_string(&rv).unwrap();
        let back = parse(&text).unwrap();
        assert_eq!(back.meta, meta);
        assert_eq!(back.value, Value::Int(42));
    }

    #[test]
    fn datetime_text_roundtrips() {
        let dt = DateTime::new(CHAINPACK_EPOCH_MSEC + 3_661_500, 60);
        assert_eq!(roundtrip(Value::DateTime(dt)), Value::DateTime(dt));
    }

    #[test]
    fn datetime_utc_epoch_text() {
        let text = format_datetime_text(DateTime::utc(CHAINPACK_EPOCH_MSEC));
        assert_eq!(text, "2018-02-02T00:00:00Z");
    }
}
