//! # World Change Events
//!
//! Every time the live World moves, each subscriber receives one
//! [`EngineEvent`] on its own bounded crossbeam channel.
//!
//! ```text
//!                 ┌──► subscriber 0 (UI)
//! Engine ──► bus ─┼──► subscriber 1 (RuleSet refresh)
//!                 └──► subscriber n
//! ```
//!
//! Publishing never blocks the engine: a full subscriber misses the event
//! and a dropped subscriber is forgotten.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use megalith_core::Digest;
use parking_lot::Mutex;
use std::time::Duration;
use tracing::warn;

/// Why the World changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeCause {
    /// A submitted batch committed.
    Submit,
    /// HEAD stepped back.
    Undo,
    /// HEAD stepped forward.
    Redo,
    /// A commit or branch was checked out.
    Checkout,
}

/// Notifications sent to subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    /// The live World now equals the World of `commit`.
    WorldChanged {
        /// The commit HEAD points at.
        commit: Digest,
        /// Digest of the live World.
        world: Digest,
        /// What moved it.
        cause: ChangeCause,
    },
}

/// Fan-out of engine events.
#[derive(Debug)]
pub struct EventBus {
    capacity: usize,
    subscribers: Mutex<Vec<Sender<EngineEvent>>>,
}

impl EventBus {
    /// Creates a bus whose subscribers buffer `capacity` events each.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a new subscriber.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        let (sender, receiver) = bounded(self.capacity);
        self.subscribers.lock().push(sender);
        EventReceiver { receiver }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Sends `event` to every subscriber without blocking.
    ///
    /// # Returns
    ///
    /// How many subscribers received it.
    pub fn publish(&self, event: &EngineEvent) -> usize {
        let mut delivered = 0;
        self.subscribers
            .lock()
            .retain(|sender| match sender.try_send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!("event subscriber is full, event dropped");
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            });
        delivered
    }
}

/// Receiving end of a subscription.
#[derive(Debug)]
pub struct EventReceiver {
    receiver: Receiver<EngineEvent>,
}

impl EventReceiver {
    /// Receives one event without blocking.
    #[inline]
    #[must_use]
    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.receiver.try_recv().ok()
    }

    /// Waits up to `timeout` for an event.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Takes every pending event.
    #[must_use]
    pub fn drain(&self) -> Vec<EngineEvent> {
        self.receiver.try_iter().collect()
    }

    /// Number of pending events.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}
