//! Transport-write guard.
//!
//! Every frame reaches the wire through one [`FrameWriter`], which holds the
//! write half behind an async mutex so concurrent writers (request exchanges,
//! acks, heartbeats) never interleave bytes.
//!
//! ```text
//! exchange ─┐
//! ack      ─┼─► FrameWriter (Mutex<Option<BoxedWriter>>) ─► socket
//! heartbeat─┘
//! ```
//!
//! A failed write closes the write half; from then on every write fails
//! with [`MqError::ConnectionClosed`].

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::codec::MsgPackCodec;
use crate::error::{MqError, Result};
use crate::protocol::{Frame, Header, HEADER_SIZE};
use crate::transport::BoxedWriter;

/// A frame encoded and ready to be written.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded header (12 bytes).
    pub header: [u8; HEADER_SIZE],
    /// MsgPack field map (empty when there are no fields).
    pub fields: Bytes,
    /// Body bytes.
    pub body: Bytes,
}

impl OutboundFrame {
    /// Encode a frame.
    pub fn encode(frame: &Frame) -> Result<Self> {
        let fields = MsgPackCodec::encode_fields(&frame.fields)?;
        let header = Header::for_lengths(frame.method, fields.len(), frame.body.len())?;
        Ok(Self {
            header: header.encode(),
            fields: Bytes::from(fields),
            body: frame.body.clone(),
        })
    }

    /// Total size of this frame.
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.fields.len() + self.body.len()
    }

    fn parts(&self) -> [&[u8]; 3] {
        [&self.header, &self.fields, &self.body]
    }
}

/// Serialized access to the transport write half.
pub struct FrameWriter {
    inner: Mutex<Option<BoxedWriter>>,
}

impl FrameWriter {
    /// Wrap a write half.
    pub fn new(writer: BoxedWriter) -> Self {
        Self {
            inner: Mutex::new(Some(writer)),
        }
    }

    /// Write one frame.
    ///
    /// On failure the write half is shut down and dropped, and the I/O error
    /// is returned as [`MqError::Write`].
    pub async fn write_frame(&self, frame: &OutboundFrame) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let writer = guard.as_mut().ok_or(MqError::ConnectionClosed)?;

        if let Err(e) = write_vectored_all(writer, frame).await {
            if let Some(mut writer) = guard.take() {
                let _ = writer.shutdown().await;
            }
            return Err(MqError::Write(e));
        }
        Ok(())
    }

    /// Shut down and drop the write half. Idempotent.
    pub async fn close(&self) {
        if let Some(mut writer) = self.inner.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }

    /// Whether the write half has been closed.
    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.is_none()
    }
}

/// Write a frame using scatter/gather I/O, continuing after partial writes.
async fn write_vectored_all<W>(writer: &mut W, frame: &OutboundFrame) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let total_size = frame.size();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(frame, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            ));
        }
        total_written += written;
    }

    writer.flush().await
}

/// Build IoSlice array for the data left after `skip_bytes` were written.
fn build_remaining_slices(frame: &OutboundFrame, skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(3);
    let mut start = 0;

    for part in frame.parts() {
        let end = start + part.len();
        if !part.is_empty() && skip_bytes < end {
            slices.push(IoSlice::new(&part[skip_bytes.saturating_sub(start)..]));
        }
        start = end;
    }

    slices
}
