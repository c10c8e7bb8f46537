//! Optional binary mirror of the chat/offer/answer/ICE JSON messages.
//!
//! Frame layout: `[type:1][flags_version:1][checksum:1][reserved:1][len:4 BE][payload:len]`.
//! `flags_version` packs a 3-bit version in the low bits and a compressed
//! flag in bit 7. Strings are length-prefixed UTF-8 (1- or 2-byte length,
//! chosen by the encoder based on string length). Timestamps are 64-bit
//! big-endian millis. The checksum is an 8-bit rolling sum of the
//! (decompressed) payload bytes; a mismatch means the frame is dropped.

use thiserror::Error;

const VERSION: u8 = 1;
const COMPRESSED_BIT: u8 = 0b1000_0000;
const HEADER_LEN: usize = 8;
/// Payloads above this size are gzip-compressed before framing.
const COMPRESS_THRESHOLD: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    ChatMessage = 1,
    Offer = 2,
    Answer = 3,
    IceCandidate = 4,
}

impl FrameType {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::ChatMessage),
            2 => Some(Self::Offer),
            3 => Some(Self::Answer),
            4 => Some(Self::IceCandidate),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BinaryError {
    #[error("frame shorter than header")]
    Truncated,
    #[error("unknown frame type {0}")]
    UnknownType(u8),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("declared length {declared} does not match remaining {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("string field exceeds 65535 bytes")]
    StringTooLong,
    #[error("unexpected end of payload while decoding field {0}")]
    UnexpectedEnd(&'static str),
    #[error("compression error: {0}")]
    Compression(String),
}

type Result<T> = std::result::Result<T, BinaryError>;

fn rolling_checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Encode a raw payload (already serialized by a type-specific encoder) into
/// a framed binary message, compressing it when it crosses the threshold.
pub fn encode_frame(frame_type: FrameType, payload: &[u8]) -> Vec<u8> {
    let (compressed, body) = if payload.len() > COMPRESS_THRESHOLD {
        (true, gzip_compress(payload))
    } else {
        (false, payload.to_vec())
    };

    let mut flags_version = VERSION & 0b0111_1111;
    if compressed {
        flags_version |= COMPRESSED_BIT;
    }

    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.push(frame_type as u8);
    out.push(flags_version);
    out.push(rolling_checksum(payload));
    out.push(0); // reserved
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
    out
}

/// Decode a framed binary message, returning the frame type and the
/// (decompressed, checksum-verified) payload bytes.
pub fn decode_frame(bytes: &[u8]) -> Result<(FrameType, Vec<u8>)> {
    if bytes.len() < HEADER_LEN {
        return Err(BinaryError::Truncated);
    }
    let frame_type = FrameType::from_u8(bytes[0]).ok_or(BinaryError::UnknownType(bytes[0]))?;
    let flags_version = bytes[1];
    let checksum = bytes[2];
    let declared_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let body = &bytes[HEADER_LEN..];
    if body.len() != declared_len {
        return Err(BinaryError::LengthMismatch {
            declared: declared_len,
            actual: body.len(),
        });
    }

    let payload = if flags_version & COMPRESSED_BIT != 0 {
        gzip_decompress(body)?
    } else {
        body.to_vec()
    };

    if rolling_checksum(&payload) != checksum {
        return Err(BinaryError::ChecksumMismatch);
    }

    Ok((frame_type, payload))
}

fn gzip_compress(data: &[u8]) -> Vec<u8> {
    use std::io::Write;
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    // Writing to an in-memory GzEncoder cannot fail.
    encoder.write_all(data).expect("in-memory gzip write");
    encoder.finish().expect("in-memory gzip finish")
}

fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>> {
    use std::io::Read;
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| BinaryError::Compression(e.to_string()))?;
    Ok(out)
}

// ── Field encoders ───────────────────────────────────────────────────────────

/// Writer for the per-type payload layouts (length-prefixed strings, BE
/// timestamps) that sit inside a frame's payload bytes.
pub struct FieldWriter {
    buf: Vec<u8>,
}

impl Default for FieldWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write_string(&mut self, s: &str) -> Result<()> {
        let bytes = s.as_bytes();
        if bytes.len() <= u8::MAX as usize {
            self.buf.push(0);
            self.buf.push(bytes.len() as u8);
        } else if bytes.len() <= u16::MAX as usize {
            self.buf.push(1);
            self.buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        } else {
            return Err(BinaryError::StringTooLong);
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

pub struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn read_string(&mut self, field: &'static str) -> Result<String> {
        let marker = *self
            .buf
            .get(self.pos)
            .ok_or(BinaryError::UnexpectedEnd(field))?;
        self.pos += 1;
        let len = if marker == 0 {
            let b = *self
                .buf
                .get(self.pos)
                .ok_or(BinaryError::UnexpectedEnd(field))?;
            self.pos += 1;
            b as usize
        } else {
            let slice = self
                .buf
                .get(self.pos..self.pos + 2)
                .ok_or(BinaryError::UnexpectedEnd(field))?;
            self.pos += 2;
            u16::from_be_bytes([slice[0], slice[1]]) as usize
        };
        let bytes = self
            .buf
            .get(self.pos..self.pos + len)
            .ok_or(BinaryError::UnexpectedEnd(field))?;
        self.pos += len;
        String::from_utf8(bytes.to_vec()).map_err(|_| BinaryError::UnexpectedEnd(field))
    }

    pub fn read_u64(&mut self, field: &'static str) -> Result<u64> {
        let slice = self
            .buf
            .get(self.pos..self.pos + 8)
            .ok_or(BinaryError::UnexpectedEnd(field))?;
        self.pos += 8;
        Ok(u64::from_be_bytes(slice.try_into().unwrap()))
    }

    pub fn read_bool(&mut self, field: &'static str) -> Result<bool> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or(BinaryError::UnexpectedEnd(field))?;
        self.pos += 1;
        Ok(b != 0)
    }
}

// ── Chat message codec (P6: round-trip preservation) ────────────────────────

pub fn encode_chat_message(msg: &crate::ChatPayload) -> Vec<u8> {
    let mut w = FieldWriter::new();
    w.write_u64(msg.id);
    w.write_string(&msg.username).expect("username within limit");
    w.write_string(&msg.message).expect("message within limit");
    w.write_u64(msg.timestamp);
    w.write_bool(msg.is_system);
    w.write_bool(msg.is_streamer);
    encode_frame(FrameType::ChatMessage, &w.into_bytes())
}

pub fn decode_chat_message(bytes: &[u8]) -> Result<crate::ChatPayload> {
    let (frame_type, payload) = decode_frame(bytes)?;
    if frame_type != FrameType::ChatMessage {
        return Err(BinaryError::UnknownType(frame_type as u8));
    }
    let mut r = FieldReader::new(&payload);
    Ok(crate::ChatPayload {
        id: r.read_u64("id")?,
        username: r.read_string("username")?,
        message: r.read_string("message")?,
        timestamp: r.read_u64("timestamp")?,
        is_system: r.read_bool("is_system")?,
        is_streamer: r.read_bool("is_streamer")?,
    })
}

// ── Offer / Answer codec (P6: round-trip preservation) ──────────────────────
//
// The SDP payload itself is an opaque `serde_json::Value` (the hub never
// inspects it) so it travels as a length-prefixed JSON string rather than a
// dedicated field layout.

pub struct OfferWire {
    pub offer_json: String,
    pub streamer_id: String,
    pub timestamp: u64,
}

pub fn encode_offer(msg: &OfferWire) -> Vec<u8> {
    let mut w = FieldWriter::new();
    w.write_string(&msg.offer_json).expect("offer json within limit");
    w.write_string(&msg.streamer_id).expect("streamer id within limit");
    w.write_u64(msg.timestamp);
    encode_frame(FrameType::Offer, &w.into_bytes())
}

pub fn decode_offer(bytes: &[u8]) -> Result<OfferWire> {
    let (frame_type, payload) = decode_frame(bytes)?;
    if frame_type != FrameType::Offer {
        return Err(BinaryError::UnknownType(frame_type as u8));
    }
    let mut r = FieldReader::new(&payload);
    Ok(OfferWire {
        offer_json: r.read_string("offer_json")?,
        streamer_id: r.read_string("streamer_id")?,
        timestamp: r.read_u64("timestamp")?,
    })
}

pub struct AnswerWire {
    pub answer_json: String,
    pub viewer_id: String,
    pub timestamp: u64,
}

pub fn encode_answer(msg: &AnswerWire) -> Vec<u8> {
    let mut w = FieldWriter::new();
    w.write_string(&msg.answer_json).expect("answer json within limit");
    w.write_string(&msg.viewer_id).expect("viewer id within limit");
    w.write_u64(msg.timestamp);
    encode_frame(FrameType::Answer, &w.into_bytes())
}

pub fn decode_answer(bytes: &[u8]) -> Result<AnswerWire> {
    let (frame_type, payload) = decode_frame(bytes)?;
    if frame_type != FrameType::Answer {
        return Err(BinaryError::UnknownType(frame_type as u8));
    }
    let mut r = FieldReader::new(&payload);
    Ok(AnswerWire {
        answer_json: r.read_string("answer_json")?,
        viewer_id: r.read_string("viewer_id")?,
        timestamp: r.read_u64("timestamp")?,
    })
}

// ── ICE candidate codec ──────────────────────────────────────────────────────

pub struct IceCandidateWire {
    pub candidate: String,
    pub sender_id: String,
    pub timestamp: u64,
}

pub fn encode_ice_candidate(msg: &IceCandidateWire) -> Vec<u8> {
    let mut w = FieldWriter::new();
    w.write_string(&msg.candidate).expect("candidate within limit");
    w.write_string(&msg.sender_id).expect("sender id within limit");
    w.write_u64(msg.timestamp);
    encode_frame(FrameType::IceCandidate, &w.into_bytes())
}

pub fn decode_ice_candidate(bytes: &[u8]) -> Result<IceCandidateWire> {
    let (frame_type, payload) = decode_frame(bytes)?;
    if frame_type != FrameType::IceCandidate {
        return Err(BinaryError::UnknownType(frame_type as u8));
    }
    let mut r = FieldReader::new(&payload);
    Ok(IceCandidateWire {
        candidate: r.read_string("candidate")?,
        sender_id: r.read_string("sender_id")?,
        timestamp: r.read_u64("timestamp")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_round_trips() {
        let msg = crate::ChatPayload {
            id: 42,
            username: "alice".into(),
            message: "hello room".into(),
            timestamp: 1_700_000_000_000,
            is_system: false,
            is_streamer: true,
        };
        let encoded = encode_chat_message(&msg);
        let decoded = decode_chat_message(&encoded).unwrap();
        assert_eq!(decoded.id, msg.id);
        assert_eq!(decoded.username, msg.username);
        assert_eq!(decoded.message, msg.message);
        assert_eq!(decoded.timestamp, msg.timestamp);
        assert_eq!(decoded.is_system, msg.is_system);
        assert_eq!(decoded.is_streamer, msg.is_streamer);
    }

    #[test]
    fn large_chat_message_is_compressed_and_still_round_trips() {
        let msg = crate::ChatPayload {
            id: 1,
            username: "bob".into(),
            message: "x".repeat(2000),
            timestamp: 1,
            is_system: false,
            is_streamer: false,
        };
        let encoded = encode_chat_message(&msg);
        // flags_version byte has the compressed bit set.
        assert_ne!(encoded[1] & COMPRESSED_BIT, 0);
        let decoded = decode_chat_message(&encoded).unwrap();
        assert_eq!(decoded.message, msg.message);
    }

    #[test]
    fn offer_round_trips() {
        let sdp = serde_json::json!({"type": "offer", "sdp": "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\n"});
        let msg = OfferWire {
            offer_json: sdp.to_string(),
            streamer_id: "alice".into(),
            timestamp: 1_700_000_000_000,
        };
        let encoded = encode_offer(&msg);
        let decoded = decode_offer(&encoded).unwrap();
        assert_eq!(decoded.streamer_id, msg.streamer_id);
        assert_eq!(decoded.timestamp, msg.timestamp);
        let round_tripped: serde_json::Value = serde_json::from_str(&decoded.offer_json).unwrap();
        assert_eq!(round_tripped, sdp);
    }

    #[test]
    fn answer_round_trips() {
        let sdp = serde_json::json!({"type": "answer", "sdp": "v=0\r\no=- 2 2 IN IP4 0.0.0.0\r\n"});
        let msg = AnswerWire {
            answer_json: sdp.to_string(),
            viewer_id: "bob".into(),
            timestamp: 1_700_000_001_000,
        };
        let encoded = encode_answer(&msg);
        let decoded = decode_answer(&encoded).unwrap();
        assert_eq!(decoded.viewer_id, msg.viewer_id);
        assert_eq!(decoded.timestamp, msg.timestamp);
        let round_tripped: serde_json::Value = serde_json::from_str(&decoded.answer_json).unwrap();
        assert_eq!(round_tripped, sdp);
    }

    #[test]
    fn offer_decoded_as_answer_is_rejected() {
        let msg = OfferWire { offer_json: "{}".into(), streamer_id: "a".into(), timestamp: 0 };
        let encoded = encode_offer(&msg);
        assert!(matches!(decode_answer(&encoded), Err(BinaryError::UnknownType(_))));
    }

    #[test]
    fn ice_candidate_round_trips() {
        let msg = IceCandidateWire {
            candidate: "candidate:1 1 UDP 2122260223 10.0.0.1 54321 typ host".into(),
            sender_id: "peer-123".into(),
            timestamp: 999,
        };
        let encoded = encode_ice_candidate(&msg);
        let decoded = decode_ice_candidate(&encoded).unwrap();
        assert_eq!(decoded.candidate, msg.candidate);
        assert_eq!(decoded.sender_id, msg.sender_id);
        assert_eq!(decoded.timestamp, msg.timestamp);
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let msg = crate::ChatPayload {
            id: 1,
            username: "a".into(),
            message: "b".into(),
            timestamp: 1,
            is_system: false,
            is_streamer: false,
        };
        let mut encoded = encode_chat_message(&msg);
        encoded[2] ^= 0xFF; // corrupt checksum byte
        assert_eq!(decode_chat_message(&encoded), Err(BinaryError::ChecksumMismatch));
    }

    #[test]
    fn truncated_frame_is_rejected() {
        assert_eq!(decode_chat_message(&[1, 2, 3]), Err(BinaryError::Truncated));
    }
}
