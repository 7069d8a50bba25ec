//! Event channel plumbing over crossbeam-channel.
//!
//! Workers and the control loop all hold cloned senders; the UI side owns
//! the single receiver. Dropping the receiver silently disables progress
//! reporting instead of failing sends, so the core never has to care
//! whether anyone is listening.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};

use super::Event;

/// Create an unbounded event channel. The usual choice: events are small
/// and the UI drains them fast.
pub fn channel() -> (EventSender, EventReceiver) {
    let (sender, receiver) = unbounded();
    (EventSender { inner: sender }, EventReceiver { inner: receiver })
}

/// Create a bounded event channel for backpressure on a slow consumer.
/// Sends beyond `capacity` are dropped rather than blocking a worker.
pub fn bounded_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (sender, receiver) = bounded(capacity);
    (EventSender { inner: sender }, EventReceiver { inner: receiver })
}

/// A sender with no receiver, for tests and headless runs.
pub fn null_sender() -> EventSender {
    let (sender, _receiver) = channel();
    sender
}

/// Cloneable handle the core uses to emit events.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    /// Emit one event. Never blocks a worker: a full bounded channel or a
    /// dropped receiver both discard the event.
    pub fn send(&self, event: Event) {
        match self.inner.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// The UI side of the channel.
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Block until the next event, or None once every sender is gone
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    /// Non-blocking poll
    pub fn try_recv(&self) -> Option<Event> {
        self.inner.try_recv().ok()
    }

    /// Iterate until every sender is dropped
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}
