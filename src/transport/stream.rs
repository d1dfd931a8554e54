//! Broker stream: TCP or Unix Domain Socket.
//!
//! # Example
//!
//! ```ignore
//! use mqlink::transport::dial;
//!
//! let stream = dial("127.0.0.1:11181").await?;
//! let (reader, writer) = stream.into_split();
//! ```

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::{MqError, Result};

/// Boxed read half handed to the background reader.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed write half owned by the frame writer.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Whether an address names a local socket path rather than `host:port`.
#[inline]
pub fn is_local_addr(addr: &str) -> bool {
    addr.contains('/')
}

/// Connected broker stream.
pub enum BrokerStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(tokio::net::UnixStream),
}

/// Dial the broker, picking the transport from the address shape.
pub async fn dial(addr: &str) -> Result<BrokerStream> {
    let dial_err = |source| MqError::Dial {
        addr: addr.to_string(),
        source,
    };

    if is_local_addr(addr) {
        #[cfg(unix)]
        {
            let stream = tokio::net::UnixStream::connect(addr)
                .await
                .map_err(dial_err)?;
            return Ok(BrokerStream::Unix(stream));
        }

        #[cfg(not(unix))]
        {
            return Err(dial_err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "local socket addresses require a Unix platform",
            )));
        }
    }

    let stream = TcpStream::connect(addr).await.map_err(dial_err)?;
    // Frames are small and latency-bound.
    stream.set_nodelay(true).map_err(dial_err)?;
    Ok(BrokerStream::Tcp(stream))
}

impl BrokerStream {
    /// Split into owned read and write halves.
    pub fn into_split(self) -> (BoxedReader, BoxedWriter) {
        match self {
            BrokerStream::Tcp(stream) => {
                let (reader, writer) = stream.into_split();
                (Box::new(reader), Box::new(writer))
            }
            #[cfg(unix)]
            BrokerStream::Unix(stream) => {
                let (reader, writer) = stream.into_split();
                (Box::new(reader), Box::new(writer))
            }
        }
    }

    /// Human-readable transport name.
    pub fn kind(&self) -> &'static str {
        match self {
            BrokerStream::Tcp(_) => "tcp",
            #[cfg(unix)]
            BrokerStream::Unix(_) => "unix",
        }
    }
}
