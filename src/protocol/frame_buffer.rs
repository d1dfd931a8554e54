//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: Need at least 12 bytes
//! - `WaitingForPayload`: Header parsed, need fields + body bytes
//!
//! # Example
//!
//! ```ignore
//! use mqlink::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! // Data arrives in chunks from the socket
//! buffer.extend(&chunk);
//!
//! // Route each frame before decoding the next one
//! while let Some(frame) = buffer.next_frame()? {
//!     println!("Got frame with method: {}", frame.method);
//! }
//! ```

use bytes::BytesMut;

use super::wire_format::{Header, Method, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use super::Frame;
use crate::codec::MsgPackCodec;
use crate::error::{MqError, Result};

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for complete header (need 12 bytes).
    WaitingForHeader,
    /// Header parsed, waiting for fields and body.
    WaitingForPayload { method: Method, header: Header },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// Any decode error leaves the buffer in an
/// undefined position in the stream; the connection must be dropped.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed fields + body size.
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 64KB, max payload: 16MB.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a new frame buffer with custom max payload size.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForHeader,
            max_payload_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Returns a vector of complete frames (may be empty if still waiting
    /// for data). Partial data is kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns error on an unknown method, an oversized frame, or a field map
    /// that is not valid MsgPack.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.extend(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Append bytes without decoding.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Decode the next complete frame, or `None` if more bytes are needed.
    ///
    /// Frames before a malformed one are still returned by earlier calls.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match &self.state {
                State::WaitingForHeader => {
                    let Some(header) = Header::decode(&self.buffer) else {
                        return Ok(None);
                    };
                    let method = header.validate(self.max_payload_size)?;

                    let _ = self.buffer.split_to(HEADER_SIZE);
                    self.state = State::WaitingForPayload { method, header };
                }

                State::WaitingForPayload { method, header } => {
                    let (method, header) = (*method, *header);

                    // Bounded by max_payload_size (u32), so this fits in usize.
                    let remaining = header.payload_length() as usize;
                    if self.buffer.len() < remaining {
                        return Ok(None);
                    }

                    let fields_bytes = self.buffer.split_to(header.fields_length as usize);
                    let body = self.buffer.split_to(header.body_length as usize).freeze();
                    self.state = State::WaitingForHeader;

                    let fields = MsgPackCodec::decode_fields(&fields_bytes).map_err(|e| {
                        MqError::Protocol(format!("Invalid fields for {}: {}", method, e))
                    })?;

                    return Ok(Some(Frame {
                        method,
                        fields,
                        body,
                    }));
                }
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::build_frame;

    fn bytes_of(frame: &Frame) -> Vec<u8> {
        build_frame(frame).unwrap()
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frame = Frame::push("orders", "7", b"hello".to_vec());

        let frames = buffer.push(&bytes_of(&frame)).unwrap();

        assert_eq!(frames, vec![frame]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let mut combined = Vec::new();
        combined.extend(bytes_of(&Frame::new(Method::BindOk).with_field("queue", "a")));
        combined.extend(bytes_of(&Frame::push("a", "1", b"first".to_vec())));
        combined.extend(bytes_of(&Frame::new(Method::PublishOk).with_body(b"3".to_vec())));

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].method, Method::BindOk);
        assert_eq!(frames[1].method, Method::Push);
        assert_eq!(frames[2].method, Method::PublishOk);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_header() {
        let mut buffer = FrameBuffer::new();
        let bytes = bytes_of(&Frame::unbind("q"));

        let frames = buffer.push(&bytes[..5]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(buffer.state_name(), "WaitingForHeader");

        let frames = buffer.push(&bytes[5..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].queue(), "q");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_payload() {
        let mut buffer = FrameBuffer::new();
        let body = b"this is a longer payload that will be fragmented".to_vec();
        let bytes = bytes_of(&Frame::push("q", "9", body.clone()));

        let partial_len = HEADER_SIZE + 10;
        let frames = buffer.push(&bytes[..partial_len]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        let frames = buffer.push(&bytes[partial_len..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].body(), &body[..]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_empty_frame() {
        let mut buffer = FrameBuffer::new();

        let frames = buffer.push(&bytes_of(&Frame::heartbeat())).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].fields.is_empty());
        assert!(frames[0].body.is_empty());
    }

    #[test]
    fn test_max_payload_validation() {
        let mut buffer = FrameBuffer::with_max_payload(100);
        let header = Header::new(Method::Push, 10, 1000);

        let result = buffer.push(&header.encode());

        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_unknown_method_is_error() {
        let mut buffer = FrameBuffer::new();
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[3] = 200;

        assert!(buffer.push(&bytes).is_err());
    }

    #[test]
    fn test_garbage_fields_is_error() {
        let mut buffer = FrameBuffer::new();
        let mut bytes = Header::new(Method::BindOk, 3, 0).encode().to_vec();
        bytes.extend_from_slice(&[0xc1, 0xc1, 0xc1]);

        let err = buffer.push(&bytes).unwrap_err();
        assert!(err.to_string().contains("Invalid fields"));
    }

    #[test]
    fn test_next_frame_yields_frames_before_malformed_one() {
        let mut buffer = FrameBuffer::new();
        let mut bytes = bytes_of(&Frame::new(Method::PublishOk).with_body(b"42".to_vec()));
        let mut bad = [0u8; HEADER_SIZE];
        bad[3] = 200;
        bytes.extend_from_slice(&bad);

        buffer.extend(&bytes);

        let first = buffer.next_frame().unwrap().unwrap();
        assert_eq!(first.method, Method::PublishOk);
        assert_eq!(first.body(), b"42");
        assert!(buffer.next_frame().is_err());
    }

    #[test]
    fn test_next_frame_waits_for_more_bytes() {
        let mut buffer = FrameBuffer::new();
        let bytes = bytes_of(&Frame::unbind("q"));

        buffer.extend(&bytes[..HEADER_SIZE]);
        assert!(buffer.next_frame().unwrap().is_none());
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        buffer.extend(&bytes[HEADER_SIZE..]);
        assert_eq!(buffer.next_frame().unwrap().unwrap().queue(), "q");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let frame = Frame::push("q", "1", b"hi".to_vec());

        let mut all_frames = Vec::new();
        for byte in bytes_of(&frame) {
            all_frames.extend(buffer.push(&[byte]).unwrap());
        }

        assert_eq!(all_frames, vec![frame]);
    }
}
