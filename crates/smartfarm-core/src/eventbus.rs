//! In-process event bus.
//!
//! Fan-out of [`FarmEvent`]s to zero or more subscribers over a tokio
//! broadcast channel. Delivery is best-effort and never blocks the
//! publisher: a subscriber that falls more than the channel capacity
//! behind loses its oldest events, and its receiver counts the losses.

use tokio::sync::broadcast;

use crate::event::FarmEvent;

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Event bus for the engine.
///
/// Cloning is cheap; clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FarmEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with the specified per-subscriber capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Returns `true` if at least one subscriber existed; with no
    /// subscribers the event is simply discarded.
    pub fn publish(&self, event: FarmEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Subscribe to all events published from now on (no history replay).
    pub fn subscribe(&self) -> EventBusReceiver {
        EventBusReceiver {
            rx: self.tx.subscribe(),
            dropped: 0,
        }
    }

    /// Subscribe to events matching a filter predicate.
    pub fn subscribe_filtered<F>(&self, filter: F) -> FilteredReceiver<F>
    where
        F: Fn(&FarmEvent) -> bool + Send + 'static,
    {
        FilteredReceiver {
            inner: self.subscribe(),
            filter,
        }
    }

    /// Get the number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver for all events from the bus.
pub struct EventBusReceiver {
    rx: broadcast::Receiver<FarmEvent>,
    dropped: u64,
}

impl EventBusReceiver {
    /// Receive the next event.
    ///
    /// Returns `None` once the bus is closed. If this subscriber lagged,
    /// the overwritten events are added to [`dropped`](Self::dropped) and
    /// reception continues with the oldest retained event.
    pub async fn recv(&mut self) -> Option<FarmEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.dropped += n;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&mut self) -> Option<FarmEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    self.dropped += n;
                }
                Err(_) => return None,
            }
        }
    }

    /// Number of events this subscriber has lost to overflow.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Receiver that only yields events matching a predicate.
pub struct FilteredReceiver<F>
where
    F: Fn(&FarmEvent) -> bool + Send,
{
    inner: EventBusReceiver,
    filter: F,
}

impl<F> FilteredReceiver<F>
where
    F: Fn(&FarmEvent) -> bool + Send,
{
    /// Receive the next matching event, or `None` once the bus is closed.
    pub async fn recv(&mut self) -> Option<FarmEvent> {
        loop {
            let event = self.inner.recv().await?;
            if (self.filter)(&event) {
                return Some(event);
            }
        }
    }

    /// Try to receive a matching event without blocking.
    pub fn try_recv(&mut self) -> Option<FarmEvent> {
        while let Some(event) = self.inner.try_recv() {
            if (self.filter)(&event) {
                return Some(event);
            }
        }
        None
    }

    /// Number of events this subscriber has lost to overflow.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped()
    }
}
