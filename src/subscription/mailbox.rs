//! Bounded in-memory sink for pushed messages.
//!
//! # Example
//!
//! ```ignore
//! let (sink, mut mailbox) = mqlink::mailbox("orders", 1024);
//! conn.bind("orders", "eu.*", false, sink).await?;
//!
//! while let Some(msg) = mailbox.recv().await {
//!     process(&msg.body);
//!     conn.ack(&msg.queue, &msg.msg_id).await?;
//! }
//! ```

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use super::MessageSink;

/// A pushed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub queue: String,
    pub msg_id: String,
    pub body: Bytes,
}

/// Sink half of a mailbox. Hand this to `Connection::bind`.
pub struct MailboxSink {
    queue: String,
    tx: mpsc::Sender<Message>,
}

/// Receiving half of a mailbox.
pub struct Mailbox {
    rx: mpsc::Receiver<Message>,
}

/// Create a mailbox holding at most `capacity` undelivered messages.
pub fn mailbox(queue: &str, capacity: usize) -> (Arc<MailboxSink>, Mailbox) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sink = MailboxSink {
        queue: queue.to_string(),
        tx,
    };
    (Arc::new(sink), Mailbox { rx })
}

impl MessageSink for MailboxSink {
    fn deliver(&self, msg_id: String, body: Bytes) {
        let msg = Message {
            queue: self.queue.clone(),
            msg_id,
            body,
        };

        match self.tx.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!(
                    "Mailbox for queue {} full, dropping message {}",
                    self.queue,
                    msg.msg_id
                );
            }
            Err(mpsc::error::TrySendError::Closed(msg)) => {
                tracing::debug!(
                    "Mailbox for queue {} closed, dropping message {}",
                    self.queue,
                    msg.msg_id
                );
            }
        }
    }
}

impl Mailbox {
    /// Wait for the next message. `None` once every sink is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Take a message if one is ready.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}
