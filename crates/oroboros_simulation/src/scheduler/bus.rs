//! # Tick Event Bus
//!
//! Fan-out of one [`TickEvent`] per tick to every subscriber.
//!
//! Each subscriber gets its own bounded channel, so a slow consumer loses
//! its own events instead of stalling the clock or starving the others.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

/// Published once per tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickEvent {
    /// Tick number, strictly increasing by one.
    pub tick: u64,
    /// Wall-clock time of the tick (Unix epoch ms).
    pub utc_ms: i64,
    /// Fixed step length in seconds.
    pub delta_time_seconds: f32,
}

/// Cloneable handle to the subscriber list.
///
/// Subscribing may happen from any thread; publishing happens on the
/// scheduler's own context.
#[derive(Clone)]
pub struct TickBus {
    subscribers: Arc<Mutex<Vec<Sender<TickEvent>>>>,
    capacity: usize,
}

impl TickBus {
    /// Creates a bus whose subscriber channels hold `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
        }
    }

    /// Adds a subscriber and returns its receiving end.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<TickEvent> {
        let (sender, receiver) = bounded(self.capacity);
        self.subscribers.lock().push(sender);
        receiver
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Sends `event` to every subscriber (non-blocking).
    ///
    /// A full subscriber misses this event; a dropped one is pruned.
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, event: TickEvent) -> usize {
        let mut subscribers = self.subscribers.lock();
        let mut delivered = 0;
        subscribers.retain(|sender| match sender.try_send(event) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Tick subscriber lagging, dropped tick {}", event.tick);
                true
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!("Tick subscriber disconnected, pruning");
                false
            }
        });
        delivered
    }
}
