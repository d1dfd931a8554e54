//! MsgPack codec using `rmp-serde`.
//!
//! Field maps are encoded with `to_vec_named` so that any struct-shaped
//! values serialize as maps, which is what the broker expects.

use crate::error::Result;
use crate::protocol::Fields;

/// MessagePack codec for structured data.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Encode a frame field map. An empty map encodes to zero bytes.
    pub fn encode_fields(fields: &Fields) -> Result<Vec<u8>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        Self::encode(fields)
    }

    /// Decode a frame field map. Zero bytes decode to an empty map.
    pub fn decode_fields(bytes: &[u8]) -> Result<Fields> {
        if bytes.is_empty() {
            return Ok(Fields::new());
        }
        Self::decode(bytes)
    }
}
