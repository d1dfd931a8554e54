//! Wire format encoding and decoding.
//!
//! Implements the 12-byte frame header:
//! ```text
//! ┌──────────┬───────────┬──────────┐
//! │ Method   │ Fields len│ Body len │
//! │ 4 bytes  │ 4 bytes   │ 4 bytes  │
//! │ uint32 BE│ uint32 BE │ uint32 BE│
//! └──────────┴───────────┴──────────┘
//! ```
//!
//! The header is followed by the MsgPack-encoded field map and the raw body.
//! All multi-byte integers are Big Endian.

use std::fmt;

use crate::error::{MqError, Result};

/// Header size in bytes (fixed, exactly 12).
pub const HEADER_SIZE: usize = 12;

/// Default maximum size of fields + body (16 MB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Protocol method codes. Codes 0 and 1 are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Method {
    Auth = 2,
    AuthOk = 3,
    Error = 4,
    Publish = 5,
    PublishOk = 6,
    Bind = 7,
    BindOk = 8,
    Unbind = 9,
    UnbindOk = 10,
    /// Message pushed by the broker to a bound queue.
    Push = 11,
    Ack = 12,
    Heartbeat = 13,
}

impl Method {
    /// Map a wire code back to a method. Unknown codes yield `None`.
    pub fn from_code(code: u32) -> Option<Self> {
        let method = match code {
            2 => Method::Auth,
            3 => Method::AuthOk,
            4 => Method::Error,
            5 => Method::Publish,
            6 => Method::PublishOk,
            7 => Method::Bind,
            8 => Method::BindOk,
            9 => Method::Unbind,
            10 => Method::UnbindOk,
            11 => Method::Push,
            12 => Method::Ack,
            13 => Method::Heartbeat,
            _ => return None,
        };
        Some(method)
    }

    /// Wire code of this method.
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Lower-case protocol name.
    pub fn name(self) -> &'static str {
        match self {
            Method::Auth => "auth",
            Method::AuthOk => "auth_ok",
            Method::Error => "error",
            Method::Publish => "publish",
            Method::PublishOk => "publish_ok",
            Method::Bind => "bind",
            Method::BindOk => "bind_ok",
            Method::Unbind => "unbind",
            Method::UnbindOk => "unbind_ok",
            Method::Push => "push",
            Method::Ack => "ack",
            Method::Heartbeat => "heartbeat",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Raw method code (validated separately).
    pub method_code: u32,
    /// Length of the MsgPack field map in bytes.
    pub fields_length: u32,
    /// Length of the body in bytes.
    pub body_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(method: Method, fields_length: u32, body_length: u32) -> Self {
        Self {
            method_code: method.code(),
            fields_length,
            body_length,
        }
    }

    /// Header for a frame with the given section sizes.
    ///
    /// Fails if either section does not fit the 32-bit length fields.
    pub fn for_lengths(method: Method, fields_length: usize, body_length: usize) -> Result<Self> {
        let to_u32 = |len: usize, section: &str| {
            u32::try_from(len).map_err(|_| {
                MqError::Protocol(format!("{} of {} bytes too large for {}", section, len, method))
            })
        };
        Ok(Self::new(
            method,
            to_u32(fields_length, "Fields")?,
            to_u32(body_length, "Body")?,
        ))
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use mqlink::protocol::{Header, Method};
    ///
    /// let header = Header::new(Method::Publish, 20, 100);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), 12);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.method_code.to_be_bytes());
        buf[4..8].copy_from_slice(&self.fields_length.to_be_bytes());
        buf[8..12].copy_from_slice(&self.body_length.to_be_bytes());
        buf
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            method_code: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            fields_length: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            body_length: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }

    /// Total bytes following the header.
    #[inline]
    pub fn payload_length(&self) -> u64 {
        self.fields_length as u64 + self.body_length as u64
    }

    /// Validate the header and resolve its method.
    ///
    /// Checks:
    /// - Method code is known
    /// - Fields + body don't exceed max
    pub fn validate(&self, max_payload_size: u32) -> Result<Method> {
        let method = Method::from_code(self.method_code).ok_or_else(|| {
            MqError::Protocol(format!("Unknown method code {}", self.method_code))
        })?;

        if self.payload_length() > max_payload_size as u64 {
            return Err(MqError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length(),
                max_payload_size
            )));
        }

        Ok(method)
    }
}
