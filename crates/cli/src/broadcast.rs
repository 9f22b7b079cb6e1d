// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Publish/subscribe hub for login-state and settings-changed events.
//!
//! Observers are invoked synchronously on the publishing thread. Delivery
//! works on a snapshot of the subscriber list taken under the lock; the lock
//! is released before any observer runs, so observers may subscribe,
//! unsubscribe, or call into the login supervisor without deadlocking.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

/// Event channel an observer subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    LoginState,
    SettingsChanged,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoginState => "login-state",
            Self::SettingsChanged => "settings-changed",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload delivered to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A login attempt started (`true`) or finished (`false`).
    LoginState { in_progress: bool },
    /// Persisted settings were replaced.
    SettingsChanged,
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Self::LoginState { .. } => Topic::LoginState,
            Self::SettingsChanged => Topic::SettingsChanged,
        }
    }
}

/// Receives broadcast events. Errors are logged by the broadcaster and never
/// reach the publisher.
pub trait Observer: Send + Sync {
    fn on_event(&self, event: &Event) -> anyhow::Result<()>;
}

impl<F> Observer for F
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync,
{
    fn on_event(&self, event: &Event) -> anyhow::Result<()> {
        self(event)
    }
}

/// Handle returned by [`StateBroadcaster::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    observer: Arc<dyn Observer>,
}

/// Fans events out to every observer registered for their topic.
pub struct StateBroadcaster {
    next_id: AtomicU64,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Default for StateBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl StateBroadcaster {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), subscriptions: Mutex::new(Vec::new()) }
    }

    pub fn subscribe(&self, topic: Topic, observer: Arc<dyn Observer>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.lock().push(Subscription { id, topic, observer });
        id
    }

    /// Subscribe with a channel instead of a callback, for async consumers.
    ///
    /// Events published after the receiver is dropped are discarded until
    /// the subscription is removed.
    pub fn subscribe_channel(
        &self,
        topic: Topic,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = move |event: &Event| -> anyhow::Result<()> {
            let _ = tx.send(*event);
            Ok(())
        };
        (self.subscribe(topic, Arc::new(observer)), rx)
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.lock();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscriptions.lock().iter().filter(|s| s.topic == topic).count()
    }

    /// Deliver `event` to the observers subscribed to its topic right now.
    ///
    /// Returns how many observers accepted the event. Observers that fail or
    /// panic are logged and skipped.
    pub fn publish(&self, event: Event) -> usize {
        let topic = event.topic();
        let snapshot: Vec<(SubscriptionId, Arc<dyn Observer>)> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|s| s.topic == topic)
            .map(|s| (s.id, Arc::clone(&s.observer)))
            .collect();

        let mut delivered = 0;
        for (id, observer) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| observer.on_event(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(topic = %topic, subscription = id.0, "observer failed: {e:#}");
                }
                Err(_) => {
                    warn!(topic = %topic, subscription = id.0, "observer panicked");
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
