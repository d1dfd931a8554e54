//! Error types for mqlink.

use std::num::ParseIntError;

use thiserror::Error;

use crate::protocol::Method;

/// Main error type for all broker connection operations.
#[derive(Debug, Error)]
pub enum MqError {
    /// I/O error on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Dialing the broker failed.
    #[error("Dial {addr} failed: {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing a frame failed. The transport has been closed.
    #[error("Write failed: {0}")]
    Write(#[source] std::io::Error),

    /// MsgPack serialization error (frame fields).
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error (frame fields).
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Protocol error (malformed header, unknown method, oversized frame).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The broker answered with an error frame.
    #[error("Broker error: {message}, code: {code}")]
    Broker { message: String, code: String },

    /// The response method does not match the request.
    #[error("Invalid return method {actual} != {expected}")]
    MethodMismatch { expected: Method, actual: Method },

    /// A pushed message arrived for a queue with no subscription.
    #[error("Pushed message for unbound queue {0}")]
    OrphanPush(String),

    /// Unbind of a queue that is not bound on this connection.
    #[error("Queue {0} not bound")]
    NotBound(String),

    /// The broker confirmed a different queue than requested.
    #[error("Invalid response queue {actual}, expected {expected}")]
    QueueMismatch { expected: String, actual: String },

    /// Publish response body is not a decimal message id.
    #[error("Invalid message id: {0}")]
    MessageId(#[from] ParseIntError),

    /// Connection closed (reader terminated or transport shut down).
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using MqError.
pub type Result<T> = std::result::Result<T, MqError>;
