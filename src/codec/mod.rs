//! Codec module - serialization of the frame field map.
//!
//! Frame fields (queue name, routing key, message id, error code, ...) travel
//! as a MessagePack map of strings between the header and the body. The body
//! itself is never interpreted and passes through as raw bytes.
//!
//! # Example
//!
//! ```
//! use mqlink::codec::MsgPackCodec;
//! use mqlink::protocol::Fields;
//!
//! let mut fields = Fields::new();
//! fields.insert("queue".to_string(), "orders".to_string());
//!
//! let encoded = MsgPackCodec::encode_fields(&fields).unwrap();
//! let decoded = MsgPackCodec::decode_fields(&encoded).unwrap();
//! assert_eq!(decoded, fields);
//! ```

mod msgpack;

pub use msgpack::MsgPackCodec;
