//! Frame struct with typed accessors.
//!
//! Represents one decoded protocol unit: a method, a string field map and an
//! opaque body. Uses `bytes::Bytes` for zero-copy body sharing.
//!
//! # Example
//!
//! ```
//! use mqlink::protocol::{Frame, Method};
//!
//! let frame = Frame::bind("orders", "eu.*", true);
//!
//! assert_eq!(frame.method, Method::Bind);
//! assert_eq!(frame.queue(), "orders");
//! ```

use std::collections::BTreeMap;

use bytes::Bytes;

use super::wire_format::{Header, Method, HEADER_SIZE};
use crate::codec::MsgPackCodec;
use crate::error::Result;

/// String field map carried by every frame.
pub type Fields = BTreeMap<String, String>;

/// Well-known field keys.
pub mod field {
    pub const QUEUE: &str = "queue";
    pub const ROUTING_KEY: &str = "routing_key";
    pub const PUB_TYPE: &str = "pub_type";
    pub const MSG_ID: &str = "msg_id";
    pub const NO_ACK: &str = "no_ack";
    /// Error code on `Method::Error` frames.
    pub const CODE: &str = "code";
}

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Protocol method.
    pub method: Method,
    /// Field map.
    pub fields: Fields,
    /// Body bytes (zero-copy via `bytes::Bytes`).
    pub body: Bytes,
}

impl Frame {
    /// Create a frame with no fields and an empty body.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            fields: Fields::new(),
            body: Bytes::new(),
        }
    }

    /// Set a field.
    pub fn with_field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Authentication request carrying the credential digest.
    pub fn auth(digest: &str) -> Self {
        Self::new(Method::Auth).with_body(digest.as_bytes().to_vec())
    }

    /// Liveness frame. Fire-and-forget.
    pub fn heartbeat() -> Self {
        Self::new(Method::Heartbeat)
    }

    /// Publish request.
    pub fn publish(queue: &str, routing_key: &str, pub_type: &str, body: impl Into<Bytes>) -> Self {
        Self::new(Method::Publish)
            .with_field(field::QUEUE, queue)
            .with_field(field::ROUTING_KEY, routing_key)
            .with_field(field::PUB_TYPE, pub_type)
            .with_body(body)
    }

    /// Bind request. `no_ack` is sent as `"1"` / `"0"`.
    pub fn bind(queue: &str, routing_key: &str, no_ack: bool) -> Self {
        Self::new(Method::Bind)
            .with_field(field::QUEUE, queue)
            .with_field(field::ROUTING_KEY, routing_key)
            .with_field(field::NO_ACK, if no_ack { "1" } else { "0" })
    }

    /// Unbind request. An empty queue name unbinds every queue.
    pub fn unbind(queue: &str) -> Self {
        Self::new(Method::Unbind).with_field(field::QUEUE, queue)
    }

    /// Delivery acknowledgment. Fire-and-forget.
    pub fn ack(queue: &str, msg_id: &str) -> Self {
        Self::new(Method::Ack)
            .with_field(field::QUEUE, queue)
            .with_field(field::MSG_ID, msg_id)
    }

    /// Message pushed by the broker.
    pub fn push(queue: &str, msg_id: &str, body: impl Into<Bytes>) -> Self {
        Self::new(Method::Push)
            .with_field(field::QUEUE, queue)
            .with_field(field::MSG_ID, msg_id)
            .with_body(body)
    }

    /// Broker error reply.
    pub fn error(message: &str, code: u32) -> Self {
        Self::new(Method::Error)
            .with_field(field::CODE, code.to_string())
            .with_body(message.as_bytes().to_vec())
    }

    /// Get a field value, empty if absent.
    #[inline]
    pub fn field(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }

    /// Queue name.
    #[inline]
    pub fn queue(&self) -> &str {
        self.field(field::QUEUE)
    }

    /// Message id.
    #[inline]
    pub fn msg_id(&self) -> &str {
        self.field(field::MSG_ID)
    }

    /// Error code.
    #[inline]
    pub fn code(&self) -> &str {
        self.field(field::CODE)
    }

    /// Get a reference to the body bytes.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Build a complete frame as a single byte vector.
///
/// Use [`OutboundFrame`](crate::writer::OutboundFrame) for scatter/gather
/// writes on a live connection.
///
/// # Example
///
/// ```
/// use mqlink::protocol::{build_frame, Frame, HEADER_SIZE};
///
/// let bytes = build_frame(&Frame::heartbeat()).unwrap();
/// assert_eq!(bytes.len(), HEADER_SIZE);
/// ```
pub fn build_frame(frame: &Frame) -> Result<Vec<u8>> {
    let fields = MsgPackCodec::encode_fields(&frame.fields)?;
    let header = Header::for_lengths(frame.method, fields.len(), frame.body.len())?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + fields.len() + frame.body.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(&fields);
    buf.extend_from_slice(&frame.body);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_frame() {
        let frame = Frame::publish("orders", "eu.de", "direct", b"payload".to_vec());

        assert_eq!(frame.method, Method::Publish);
        assert_eq!(frame.queue(), "orders");
        assert_eq!(frame.field(field::ROUTING_KEY), "eu.de");
        assert_eq!(frame.field(field::PUB_TYPE), "direct");
        assert_eq!(frame.body(), b"payload");
    }

    #[test]
    fn test_bind_no_ack_flag() {
        assert_eq!(Frame::bind("q", "rk", true).field(field::NO_ACK), "1");
        assert_eq!(Frame::bind("q", "rk", false).field(field::NO_ACK), "0");
    }

    #[test]
    fn test_unbind_all_has_empty_queue() {
        let frame = Frame::unbind("");
        assert_eq!(frame.method, Method::Unbind);
        assert_eq!(frame.queue(), "");
        assert!(frame.fields.contains_key(field::QUEUE));
    }

    #[test]
    fn test_missing_field_is_empty() {
        let frame = Frame::heartbeat();
        assert_eq!(frame.queue(), "");
        assert_eq!(frame.msg_id(), "");
        assert!(frame.body().is_empty());
    }

    #[test]
    fn test_error_frame() {
        let frame = Frame::error("bad auth", 401);
        assert_eq!(frame.method, Method::Error);
        assert_eq!(frame.code(), "401");
        assert_eq!(frame.body(), b"bad auth");
    }

    #[test]
    fn test_push_and_ack_carry_msg_id() {
        let push = Frame::push("q", "17", b"hi".to_vec());
        assert_eq!(push.msg_id(), "17");

        let ack = Frame::ack("q", "17");
        assert_eq!(ack.method, Method::Ack);
        assert_eq!(ack.msg_id(), "17");
        assert!(ack.body().is_empty());
    }

    #[test]
    fn test_build_frame_layout() {
        let frame = Frame::unbind("q");
        let bytes = build_frame(&frame).unwrap();

        let header = Header::decode(&bytes[..HEADER_SIZE]).unwrap();
        assert_eq!(header.method_code, Method::Unbind.code());
        assert_eq!(header.body_length, 0);
        assert_eq!(bytes.len(), HEADER_SIZE + header.fields_length as usize);

        let fields = MsgPackCodec::decode_fields(&bytes[HEADER_SIZE..]).unwrap();
        assert_eq!(fields, frame.fields);
    }

    #[test]
    fn test_build_frame_roundtrip() {
        use super::super::FrameBuffer;

        let frame = Frame::push("orders", "42", b"0123456789".to_vec());
        let bytes = build_frame(&frame).unwrap();

        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&bytes).unwrap();

        assert_eq!(frames, vec![frame]);
    }
}
