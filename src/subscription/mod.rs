//! Subscriptions: client-side records of queue bindings.
//!
//! A [`Subscription`] pairs a queue's bind parameters with the
//! [`MessageSink`] that receives its pushed messages. The background reader
//! looks subscriptions up by queue name and delivers outside the registry
//! lock, so sinks must never block.

mod mailbox;
mod registry;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

pub use mailbox::{mailbox, Mailbox, MailboxSink, Message};
pub(crate) use registry::{BindOutcome, SubscriptionRegistry};

/// Receiver of pushed messages for one queue.
pub trait MessageSink: Send + Sync + 'static {
    /// Deliver one pushed message. Called from the connection's reader task.
    fn deliver(&self, msg_id: String, body: Bytes);
}

/// Bind parameters of a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindParams {
    pub routing_key: String,
    /// Broker considers messages delivered without an explicit ack.
    pub no_ack: bool,
}

/// One queue binding within a connection.
pub struct Subscription {
    queue: String,
    params: RwLock<BindParams>,
    sink: Arc<dyn MessageSink>,
}

impl Subscription {
    pub(crate) fn new(queue: &str, params: BindParams, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            queue: queue.to_string(),
            params: RwLock::new(params),
            sink,
        }
    }

    /// Queue name.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Current routing key.
    pub fn routing_key(&self) -> String {
        self.params.read().routing_key.clone()
    }

    /// Whether the subscription is in auto-ack mode.
    pub fn no_ack(&self) -> bool {
        self.params.read().no_ack
    }

    /// Snapshot of the bind parameters.
    pub fn params(&self) -> BindParams {
        self.params.read().clone()
    }

    pub(crate) fn matches(&self, params: &BindParams) -> bool {
        *self.params.read() == *params
    }

    pub(crate) fn update(&self, params: BindParams) {
        *self.params.write() = params;
    }

    pub(crate) fn deliver(&self, msg_id: String, body: Bytes) {
        self.sink.deliver(msg_id, body);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("queue", &self.queue)
            .field("params", &*self.params.read())
            .finish_non_exhaustive()
    }
}
