//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the broker wire protocol:
//! - 12-byte header encoding/decoding and method codes
//! - Frame buffer for accumulating partial reads
//! - Frame struct with constructors for every protocol verb

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{build_frame, field, Fields, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{Header, Method, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
