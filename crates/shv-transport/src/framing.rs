//! Message framing (§4.2): Block framing for byte streams where messages
//! are simply concatenated, and Serial (STX/ETX byte-stuffed) framing for
//! links where resynchronization after noise matters, optionally protected
//! by a CRC-32.

use std::io::{Read, Write};

use shv_chainpack::crc32;

use crate::error::TransportError;

const DEFAULT_FRAME_LIMIT: usize = 64 * 1024 * 1024;

/// Delimits individual messages within a transport's byte stream.
pub trait Framer {
    fn write_message(&self, w: &mut dyn Write, msg: &[u8]) -> Result<(), TransportError>;
    fn read_message(&self, r: &mut dyn Read) -> Result<Vec<u8>, TransportError>;

    /// Emit a RESET control frame (§4.2/§4.3), for framings that carry
    /// one. `read_message` on the peer surfaces this as
    /// [`TransportError::SessionReset`]. Block framing has no RESET
    /// concept, so it keeps the no-op default.
    fn write_reset(&self, _w: &mut dyn Write) -> Result<(), TransportError> {
        Ok(())
    }
}

/// `uvarint(len + 1) | 0x01 | message`. The `0x01` byte is a message-type
/// discriminant reserved for future framing extensions (e.g. keep-alive
/// frames with a different type byte); only `0x01` ("user message") is
/// produced or accepted today.
pub struct BlockFramer {
    pub frame_limit: usize,
}

impl Default for BlockFramer {
    fn default() -> Self {
        BlockFramer {
            frame_limit: DEFAULT_FRAME_LIMIT,
        }
    }
}

const BLOCK_MSG_TYPE: u8 = 0x01;

impl Framer for BlockFramer {
    fn write_message(&self, w: &mut dyn Write, msg: &[u8]) -> Result<(), TransportError> {
        shv_chainpack::chainpack::write_uvarint(w, (msg.len() + 1) as u64)?;
        w.write_all(&[BLOCK_MSG_TYPE])?;
        w.write_all(msg)?;
        tracing::trace!(len = msg.len(), "block frame written");
        Ok(())
    }

    fn read_message(&self, r: &mut dyn Read) -> Result<Vec<u8>, TransportError> {
        let total_len = shv_chainpack::chainpack::read_uvarint(r)
            .map_err(|e| TransportError::Framing(e.to_string()))? as usize;
        if total_len == 0 {
            return Err(TransportError::Framing("zero-length block frame".to_string()));
        }
        if total_len - 1 > self.frame_limit {
            return Err(TransportError::FrameTooLarge {
                size: total_len - 1,
                limit: self.frame_limit,
            });
        }
        let mut type_byte = [0u8; 1];
        r.read_exact(&mut type_byte)?;
        let mut msg = vec![0u8; total_len - 1];
        r.read_exact(&mut msg)?;
        tracing::trace!(len = msg.len(), "block frame read");
        Ok(msg)
    }
}

const STX: u8 = 0xA2;
const ETX: u8 = 0xA3;
const ESC: u8 = 0xAA;
const RESET: u8 = 0xA1;
const ESC_STX: u8 = 0x42;
const ESC_ETX: u8 = 0x43;
const ESC_ESC: u8 = 0x4A;
const ESC_RESET: u8 = 0x41;

/// STX-delimited, byte-stuffed framing, with an optional trailing CRC-32
/// (IEEE 802.3) over the unescaped payload for links prone to corruption.
pub struct SerialFramer {
    pub with_crc: bool,
    pub frame_limit: usize,
}

impl SerialFramer {
    pub fn new(with_crc: bool) -> Self {
        SerialFramer {
            with_crc,
            frame_limit: DEFAULT_FRAME_LIMIT,
        }
    }

    fn write_escaped(&self, w: &mut dyn Write, byte: u8) -> Result<(), TransportError> {
        match byte {
            STX => w.write_all(&[ESC, ESC_STX])?,
            ETX => w.write_all(&[ESC, ESC_ETX])?,
            ESC => w.write_all(&[ESC, ESC_ESC])?,
            RESET => w.write_all(&[ESC, ESC_RESET])?,
            b => w.write_all(&[b])?,
        }
        Ok(())
    }
}

impl Framer for SerialFramer {
    fn write_message(&self, w: &mut dyn Write, msg: &[u8]) -> Result<(), TransportError> {
        w.write_all(&[STX])?;
        for &b in msg {
            self.write_escaped(w, b)?;
        }
        if self.with_crc {
            let crc = crc32(msg);
            for b in crc.to_be_bytes() {
                self.write_escaped(w, b)?;
            }
        }
        w.write_all(&[ETX])?;
        tracing::trace!(len = msg.len(), crc = self.with_crc, "serial frame written");
        Ok(())
    }

    fn read_message(&self, r: &mut dyn Read) -> Result<Vec<u8>, TransportError> {
        let mut one = [0u8; 1];
        loop {
            r.read_exact(&mut one)?;
            if one[0] == STX {
                break;
            }
            if one[0] == RESET {
                return Err(TransportError::SessionReset);
            }
        }
        let mut raw = Vec::new();
        loop {
            r.read_exact(&mut one)?;
            match one[0] {
                ETX => break,
                RESET => return Err(TransportError::SessionReset),
                ESC => {
                    r.read_exact(&mut one)?;
                    let unescaped = match one[0] {
                        ESC_STX => STX,
                        ESC_ETX => ETX,
                        ESC_ESC => ESC,
                        ESC_RESET => RESET,
                        other => {
                            return Err(TransportError::Framing(format!(
                                "invalid escape sequence 0x{other:02x}"
                            )))
                        }
                    };
                    raw.push(unescaped);
                }
                b => raw.push(b),
            }
            if raw.len() > self.frame_limit {
                return Err(TransportError::FrameTooLarge {
                    size: raw.len(),
                    limit: self.frame_limit,
                });
            }
        }
        let msg = if self.with_crc {
            if raw.len() < 4 {
                return Err(TransportError::Framing("frame shorter than crc trailer".to_string()));
            }
            let split = raw.len() - 4;
            let (msg, crc_bytes) = raw.split_at(split);
            let expected = u32::from_be_bytes(crc_bytes.try_into().unwrap());
            let got = crc32(msg);
            if expected != got {
                return Err(TransportError::CrcMismatch { expected, got });
            }
            msg.to_vec()
        } else {
            raw
        };
        tracing::trace!(len = msg.len(), crc = self.with_crc, "serial frame read");
        Ok(msg)
    }

    fn write_reset(&self, w: &mut dyn Write) -> Result<(), TransportError> {
        w.write_all(&[RESET])?;
        tracing::trace!("reset frame written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_framer_roundtrips() {
        let f = BlockFramer::default();
        let mut buf = Vec::new();
        f.write_message(&mut buf, b"hello world").unwrap();
        let msg = f.read_message(&mut buf.as_slice()).unwrap();
        assert_eq!(msg, b"hello world");
    }

    #[test]
    fn serial_framer_roundtrips_with_special_bytes() {
        let f = SerialFramer::new(false);
        let payload = vec![STX, ETX, ESC, 0x00, 0xFF];
        let mut buf = Vec::new();
        f.write_message(&mut buf, &payload).unwrap();
        let msg = f.read_message(&mut buf.as_slice()).unwrap();
        assert_eq!(msg, payload);
    }

    #[test]
    fn serial_framer_with_crc_detects_corruption() {
        let f = SerialFramer::new(true);
        let mut buf = Vec::new();
        f.write_message(&mut buf, b"payload").unwrap();
        let last = buf.len() - 2;
        buf[last] ^= 0xFF;
        let err = f.read_message(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, TransportError::CrcMismatch { .. }));
    }

    #[test]
    fn serial_framer_skips_noise_before_stx() {
        let f = SerialFramer::new(false);
        let mut buf = vec![0x00, 0xFF, 0x11];
        f.write_message(&mut buf, b"abc").unwrap();
        let msg = f.read_message(&mut buf.as_slice()).unwrap();
        assert_eq!(msg, b"abc");
    }

    #[test]
    fn serial_framer_escapes_reset_byte_in_payload() {
        let f = SerialFramer::new(false);
        let payload = vec![RESET, 0x01];
        let mut buf = Vec::new();
        f.write_message(&mut buf, &payload).unwrap();
        let msg = f.read_message(&mut buf.as_slice()).unwrap();
        assert_eq!(msg, payload);
    }

    #[test]
    fn serial_framer_write_reset_is_seen_as_session_reset() {
        let f = SerialFramer::new(false);
        let mut buf = Vec::new();
        f.write_reset(&mut buf).unwrap();
        let err = f.read_message(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, TransportError::SessionReset));
    }

    #[test]
    fn serial_framer_reset_mid_frame_aborts_partial_message() {
        let f = SerialFramer::new(false);
        let mut buf = vec![STX, b'a', b'b'];
        buf.push(RESET);
        buf.extend_from_slice(b"next");
        f.write_message(&mut buf, b"cd").unwrap();
        let err = f.read_message(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, TransportError::SessionReset));
    }

    #[test]
    fn block_framer_write_reset_is_a_no_op() {
        let f = BlockFramer::default();
        let mut buf = Vec::new();
        f.write_reset(&mut buf).unwrap();
        assert!(buf.is_empty());
    }
}
