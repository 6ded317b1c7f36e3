//! Per-query subject backed by `std::sync::mpsc` channels.

use std::sync::mpsc::{self, Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

/// Identifier of one subscriber within its subject.
pub type SubscriptionId = u64;

struct SubjectState<T> {
    next_id: SubscriptionId,
    subscribers: Vec<(SubscriptionId, Sender<T>)>,
}

trait Detach: Send + Sync {
    fn detach(&self, id: SubscriptionId) -> bool;
    fn is_attached(&self, id: SubscriptionId) -> bool;
}

impl<T: Send> Detach for Mutex<SubjectState<T>> {
    fn detach(&self, id: SubscriptionId) -> bool {
        let mut state = lock_state(self);
        let before = state.subscribers.len();
        state.subscribers.retain(|(sub_id, _)| *sub_id != id);
        state.subscribers.len() != before
    }

    fn is_attached(&self, id: SubscriptionId) -> bool {
        lock_state(self)
            .subscribers
            .iter()
            .any(|(sub_id, _)| *sub_id == id)
    }
}

// Subject state is a plain subscriber list; a panic while holding the lock
// cannot leave it half-updated, so poisoning is ignored.
fn lock_state<T>(state: &Mutex<SubjectState<T>>) -> MutexGuard<'_, SubjectState<T>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fan-out point for one query.
///
/// Every subscriber owns an unbounded channel; publishing clones the value
/// into each channel and prunes subscribers whose receiver is gone.
pub struct Subject<T> {
    state: Arc<Mutex<SubjectState<T>>>,
}

impl<T: Clone + Send + 'static> Subject<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SubjectState {
                next_id: 1,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Registers a subscriber whose first emission is `current`.
    pub fn subscribe(&self, current: T) -> Subscription<T> {
        let (sender, receiver) = mpsc::channel();
        // The receiver is held right here, so this send cannot fail.
        let _ = sender.send(current);

        let mut state = lock_state(&self.state);
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push((id, sender));

        let weak: Weak<Mutex<SubjectState<T>>> = Arc::downgrade(&self.state);
        Subscription {
            receiver,
            detacher: Detacher { id, subject: weak },
        }
    }

    /// Pushes `value` to every live subscriber. Returns the delivery count.
    pub fn publish(&self, value: T) -> usize {
        let mut state = lock_state(&self.state);
        state
            .subscribers
            .retain(|(_, sender)| sender.send(value.clone()).is_ok());
        state.subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        lock_state(&self.state).subscribers.len()
    }

    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() > 0
    }
}

impl<T: Clone + Send + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation handle detached from the receiving end of a subscription.
///
/// Detaching drops the subject's sender, so the subscription drains what is
/// already queued and then reports `Disconnected`.
#[derive(Clone)]
pub struct Detacher {
    id: SubscriptionId,
    subject: Weak<dyn Detach>,
}

impl Detacher {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Removes the subscriber. Returns `false` if it was already gone.
    pub fn detach(&self) -> bool {
        self.subject
            .upgrade()
            .is_some_and(|subject| subject.detach(self.id))
    }

    pub fn is_attached(&self) -> bool {
        self.subject
            .upgrade()
            .is_some_and(|subject| subject.is_attached(self.id))
    }
}

impl std::fmt::Debug for Detacher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detacher").field("id", &self.id).finish()
    }
}

/// Receiving end of a subject. Dropping it unsubscribes.
pub struct Subscription<T> {
    receiver: Receiver<T>,
    detacher: Detacher,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriptionId {
        self.detacher.id
    }

    /// Blocks until the next emission, or fails once detached and drained.
    pub fn recv(&self) -> Result<T, RecvError> {
        self.receiver.recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Drains queued emissions and returns the newest one, if any.
    pub fn latest(&self) -> Option<T> {
        let mut newest = None;
        while let Ok(value) = self.receiver.try_recv() {
            newest = Some(value);
        }
        newest
    }

    /// Returns a handle that can cancel this subscription from elsewhere.
    pub fn detacher(&self) -> Detacher {
        self.detacher.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.detacher.is_attached()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.detacher.detach();
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.detacher.id)
            .finish()
    }
}
