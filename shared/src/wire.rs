//! Message framing.
//!
//! Every message on the stream shares a 4-byte envelope:
//!
//! ```text
//! ┌────────┬─────────────────────┬──────────────────┐
//! │ type   │ length (24-bit LE)  │ payload          │
//! │ 1B     │ 3B                  │ `length` bytes   │
//! └────────┴─────────────────────┴──────────────────┘
//! ```
//!
//! Decoding never consumes bytes unless a whole message of the expected kind
//! was parsed, so callers can probe several kinds against one buffer and
//! simply retry once more data arrives.

use thiserror::Error;

/// Size of the type + length envelope.
pub const HEADER_SIZE: usize = 4;

/// Largest payload the 24-bit length field can describe.
pub const MAX_PAYLOAD_SIZE: usize = 0x00FF_FFFF;

/// Message type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    Controls = 1,
    State = b's',
    Login = b'L',
    Instruction = b'I',
    SelectedRole = b'R',
}

impl MessageKind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<MessageKind> {
        match tag {
            1 => Some(MessageKind::Controls),
            b's' => Some(MessageKind::State),
            b'L' => Some(MessageKind::Login),
            b'I' => Some(MessageKind::Instruction),
            b'R' => Some(MessageKind::SelectedRole),
            _ => None,
        }
    }
}

/// Malformed input. Always fatal to the connection it arrived on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A fixed-size message declared the wrong payload length.
    #[error("{kind:?} message with size {actual} != {expected}")]
    SizeMismatch {
        kind: MessageKind,
        expected: usize,
        actual: usize,
    },

    /// A field read would run past the declared payload length.
    #[error("ran out of bytes reading {kind:?} message: need {need} at offset {offset}, payload is {size}")]
    Truncated {
        kind: MessageKind,
        offset: usize,
        need: usize,
        size: usize,
    },

    /// Bytes remain after the last field was read.
    #[error("trailing data in {kind:?} message: {remaining} bytes unread")]
    TrailingBytes { kind: MessageKind, remaining: usize },

    #[error("invalid UTF-8 text in {kind:?} message")]
    InvalidUtf8 { kind: MessageKind },

    #[error("unknown phase {0} in state message")]
    UnknownPhase(u8),

    /// A complete header whose type tag the receiver never accepts.
    #[error("unexpected message type {0:#04x}")]
    UnknownKind(u8),

    /// Encoding side: the payload does not fit in a 24-bit length.
    #[error("{kind:?} payload of {size} bytes exceeds the frame limit")]
    PayloadTooLarge { kind: MessageKind, size: usize },
}

/// Result of looking at the front of a receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePeek {
    /// Header or payload not fully buffered yet.
    Incomplete,
    /// The next message is of another kind.
    WrongKind,
    /// A complete message of the expected kind with `size` payload bytes.
    Ready { size: usize },
}

fn declared_size(buf: &[u8]) -> usize {
    (buf[3] as usize) << 16 | (buf[2] as usize) << 8 | buf[1] as usize
}

/// Inspects the envelope at the front of `buf` without consuming anything.
///
/// For fixed-size kinds the declared length is validated as soon as the
/// header is present, before waiting for the payload.
pub fn peek_frame(
    buf: &[u8],
    kind: MessageKind,
    fixed_size: Option<usize>,
) -> Result<FramePeek, ProtocolError> {
    if buf.len() < HEADER_SIZE {
        return Ok(FramePeek::Incomplete);
    }
    if buf[0] != kind.tag() {
        return Ok(FramePeek::WrongKind);
    }

    let size = declared_size(buf);
    if let Some(expected) = fixed_size {
        if size != expected {
            return Err(ProtocolError::SizeMismatch {
                kind,
                expected,
                actual: size,
            });
        }
    }

    if buf.len() < HEADER_SIZE + size {
        return Ok(FramePeek::Incomplete);
    }
    Ok(FramePeek::Ready { size })
}

/// Decodes one message of `kind` from the front of `buf`.
///
/// Returns `Ok(None)` for an incomplete buffer or a different kind, leaving
/// `buf` untouched. On success exactly `HEADER_SIZE + size` bytes are
/// removed. `parse` must consume the whole payload.
pub fn recv_frame<T, F>(
    buf: &mut Vec<u8>,
    kind: MessageKind,
    fixed_size: Option<usize>,
    parse: F,
) -> Result<Option<T>, ProtocolError>
where
    F: FnOnce(&mut PayloadReader<'_>) -> Result<T, ProtocolError>,
{
    let size = match peek_frame(buf, kind, fixed_size)? {
        FramePeek::Ready { size } => size,
        FramePeek::Incomplete | FramePeek::WrongKind => return Ok(None),
    };

    let value = {
        let mut reader = PayloadReader::new(kind, &buf[HEADER_SIZE..HEADER_SIZE + size]);
        let value = parse(&mut reader)?;
        reader.finish()?;
        value
    };

    buf.drain(..HEADER_SIZE + size);
    Ok(Some(value))
}

/// Bounds-checked little-endian reader over one message payload.
pub struct PayloadReader<'a> {
    kind: MessageKind,
    payload: &'a [u8],
    at: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(kind: MessageKind, payload: &'a [u8]) -> Self {
        Self {
            kind,
            payload,
            at: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.payload.len() - self.at
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], ProtocolError> {
        if count > self.remaining() {
            return Err(ProtocolError::Truncated {
                kind: self.kind,
                offset: self.at,
                need: count,
                size: self.payload.len(),
            });
        }
        let bytes = &self.payload[self.at..self.at + count];
        self.at += count;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_f32(&mut self) -> Result<f32, ProtocolError> {
        let bytes = self.read_bytes(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_string(&mut self, len: usize) -> Result<String, ProtocolError> {
        let kind = self.kind;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8 { kind })
    }

    /// Fails if any payload bytes were left unread.
    pub fn finish(&self) -> Result<(), ProtocolError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(ProtocolError::TrailingBytes {
                kind: self.kind,
                remaining,
            }),
        }
    }
}

/// Appends one framed message to an outbound buffer.
///
/// The length bytes are written as placeholders and patched by `finish`.
pub struct FrameWriter<'a> {
    buf: &'a mut Vec<u8>,
    kind: MessageKind,
    mark: usize,
}

impl<'a> FrameWriter<'a> {
    pub fn begin(buf: &'a mut Vec<u8>, kind: MessageKind) -> Self {
        buf.push(kind.tag());
        buf.extend_from_slice(&[0, 0, 0]);
        let mark = buf.len();
        Self { buf, kind, mark }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Patches the length field. An oversized message is removed from the
    /// buffer again and reported as an error.
    pub fn finish(self) -> Result<(), ProtocolError> {
        let size = self.buf.len() - self.mark;
        if size > MAX_PAYLOAD_SIZE {
            self.buf.truncate(self.mark - HEADER_SIZE);
            return Err(ProtocolError::PayloadTooLarge {
                kind: self.kind,
                size,
            });
        }
        self.buf[self.mark - 3] = size as u8;
        self.buf[self.mark - 2] = (size >> 8) as u8;
        self.buf[self.mark - 1] = (size >> 16) as u8;
        Ok(())
    }
}

/// Longest prefix of `text` that fits in `max_bytes` without splitting a character.
pub fn truncate_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(kind: MessageKind, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut writer = FrameWriter::begin(&mut buf, kind);
        writer.write_bytes(payload);
        writer.finish().unwrap();
        buf
    }

    #[test]
    fn test_writer_patches_little_endian_length() {
        let payload = vec![0xAB; 0x012345];
        let buf = framed(MessageKind::State, &payload);

        assert_eq!(buf[0], b's');
        assert_eq!(&buf[1..4], &[0x45, 0x23, 0x01]);
        assert_eq!(buf.len(), HEADER_SIZE + payload.len());
    }

    #[test]
    fn test_writer_appends_after_existing_bytes() {
        let mut buf = vec![9, 9];
        let mut writer = FrameWriter::begin(&mut buf, MessageKind::Login);
        writer.write_u8(2);
        writer.finish().unwrap();

        assert_eq!(buf, vec![9, 9, b'L', 1, 0, 0, 2]);
    }

    #[test]
    fn test_peek_short_header_is_incomplete() {
        for len in 0..HEADER_SIZE {
            let buf = vec![b'L'; len];
            assert_eq!(
                peek_frame(&buf, MessageKind::Login, Some(1)),
                Ok(FramePeek::Incomplete)
            );
        }
    }

    #[test]
    fn test_peek_other_kind() {
        let buf = framed(MessageKind::Login, &[1]);
        assert_eq!(
            peek_frame(&buf, MessageKind::Controls, Some(5)),
            Ok(FramePeek::WrongKind)
        );
    }

    #[test]
    fn test_peek_fixed_size_mismatch_fails_before_payload_arrives() {
        let buf = vec![MessageKind::Controls.tag(), 6, 0, 0];
        assert_eq!(
            peek_frame(&buf, MessageKind::Controls, Some(5)),
            Err(ProtocolError::SizeMismatch {
                kind: MessageKind::Controls,
                expected: 5,
                actual: 6,
            })
        );
    }

    #[test]
    fn test_peek_waits_for_payload() {
        let buf = framed(MessageKind::Instruction, &[3, 0, b'a', b'b', b'c']);
        for cut in HEADER_SIZE..buf.len() {
            assert_eq!(
                peek_frame(&buf[..cut], MessageKind::Instruction, None),
                Ok(FramePeek::Incomplete)
            );
        }
        assert_eq!(
            peek_frame(&buf, MessageKind::Instruction, None),
            Ok(FramePeek::Ready { size: 5 })
        );
    }

    #[test]
    fn test_recv_frame_consumes_exactly_one_message() {
        let mut buf = framed(MessageKind::Login, &[2]);
        buf.extend(framed(MessageKind::SelectedRole, &[1]));

        let role = recv_frame(&mut buf, MessageKind::Login, Some(1), |r| r.read_u8()).unwrap();
        assert_eq!(role, Some(2));
        assert_eq!(buf, framed(MessageKind::SelectedRole, &[1]));
    }

    #[test]
    fn test_recv_frame_leaves_buffer_on_wrong_kind() {
        let mut buf = framed(MessageKind::Login, &[2]);
        let before = buf.clone();

        let result = recv_frame(&mut buf, MessageKind::SelectedRole, Some(1), |r| r.read_u8());
        assert_eq!(result, Ok(None));
        assert_eq!(buf, before);
    }

    #[test]
    fn test_recv_frame_rejects_trailing_bytes() {
        let mut buf = framed(MessageKind::Instruction, &[1, 0, b'a', b'!']);
        let result = recv_frame(&mut buf, MessageKind::Instruction, None, |r| {
            let n = r.read_u16()? as usize;
            r.read_string(n)
        });
        assert_eq!(
            result,
            Err(ProtocolError::TrailingBytes {
                kind: MessageKind::Instruction,
                remaining: 1,
            })
        );
    }

    #[test]
    fn test_reader_rejects_read_past_payload() {
        let mut reader = PayloadReader::new(MessageKind::State, &[1, 2, 3]);
        assert_eq!(reader.read_u16(), Ok(0x0201));
        assert_eq!(
            reader.read_f32(),
            Err(ProtocolError::Truncated {
                kind: MessageKind::State,
                offset: 2,
                need: 4,
                size: 3,
            })
        );
    }

    #[test]
    fn test_reader_rejects_invalid_utf8() {
        let mut reader = PayloadReader::new(MessageKind::Instruction, &[0xff, 0xfe]);
        assert_eq!(
            reader.read_string(2),
            Err(ProtocolError::InvalidUtf8 {
                kind: MessageKind::Instruction
            })
        );
    }

    #[test]
    fn test_oversized_payload_is_rolled_back() {
        let mut buf = vec![7];
        let mut writer = FrameWriter::begin(&mut buf, MessageKind::State);
        writer.write_bytes(&vec![0; MAX_PAYLOAD_SIZE + 1]);
        let result = writer.finish();

        assert!(matches!(
            result,
            Err(ProtocolError::PayloadTooLarge { size, .. }) if size == MAX_PAYLOAD_SIZE + 1
        ));
        assert_eq!(buf, vec![7]);
    }

    #[test]
    fn test_tags() {
        assert_eq!(MessageKind::Controls.tag(), 1);
        assert_eq!(MessageKind::State.tag(), b's');
        assert_eq!(MessageKind::from_tag(b'R'), Some(MessageKind::SelectedRole));
        assert_eq!(MessageKind::from_tag(0), None);
    }

    #[test]
    fn test_truncate_utf8_respects_char_boundaries() {
        assert_eq!(truncate_utf8("hello", 10), "hello");
        assert_eq!(truncate_utf8("hello", 3), "hel");
        // 'é' is two bytes; cutting through it drops the whole character.
        assert_eq!(truncate_utf8("aé", 2), "a");
    }
}
