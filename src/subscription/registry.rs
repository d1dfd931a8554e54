//! Subscription registry keyed by queue name.
//!
//! All map mutations happen under one `parking_lot::Mutex`. The lock is only
//! held for map bookkeeping, never across I/O.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{BindParams, MessageSink, Subscription};

/// Local effect of a bind, decided before any network round-trip.
pub(crate) enum BindOutcome {
    /// Already bound with identical parameters. No request needed.
    Unchanged(Arc<Subscription>),
    /// New subscription inserted.
    Created(Arc<Subscription>),
    /// Existing subscription re-parameterized in place.
    Updated(Arc<Subscription>),
}

impl BindOutcome {
    pub(crate) fn needs_request(&self) -> bool {
        !matches!(self, BindOutcome::Unchanged(_))
    }

    pub(crate) fn into_subscription(self) -> Arc<Subscription> {
        match self {
            BindOutcome::Unchanged(sub) | BindOutcome::Created(sub) | BindOutcome::Updated(sub) => {
                sub
            }
        }
    }
}

/// Registry mapping queue names to subscriptions.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    subscriptions: Mutex<HashMap<String, Arc<Subscription>>>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a bind locally.
    ///
    /// `sink` is only used when the queue is not yet bound.
    pub(crate) fn prepare_bind(
        &self,
        queue: &str,
        params: BindParams,
        sink: Arc<dyn MessageSink>,
    ) -> BindOutcome {
        let mut subscriptions = self.subscriptions.lock();

        match subscriptions.get(queue) {
            Some(existing) if existing.matches(&params) => BindOutcome::Unchanged(existing.clone()),
            Some(existing) => {
                existing.update(params);
                BindOutcome::Updated(existing.clone())
            }
            None => {
                let sub = Arc::new(Subscription::new(queue, params, sink));
                subscriptions.insert(queue.to_string(), sub.clone());
                BindOutcome::Created(sub)
            }
        }
    }

    /// Look up a subscription for dispatch.
    pub(crate) fn get(&self, queue: &str) -> Option<Arc<Subscription>> {
        self.subscriptions.lock().get(queue).cloned()
    }

    /// Remove one subscription.
    pub(crate) fn remove(&self, queue: &str) -> Option<Arc<Subscription>> {
        self.subscriptions.lock().remove(queue)
    }

    /// Remove every subscription, returning how many were dropped.
    pub(crate) fn clear(&self) -> usize {
        let mut subscriptions = self.subscriptions.lock();
        let count = subscriptions.len();
        subscriptions.clear();
        count
    }

    pub(crate) fn queues(&self) -> Vec<String> {
        let mut queues: Vec<String> = self.subscriptions.lock().keys().cloned().collect();
        queues.sort();
        queues
    }
}
