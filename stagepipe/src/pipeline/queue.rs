//! Bounded queues linking consecutive stages.

use async_channel::{Receiver, Sender};

/// A fixed-capacity FIFO shared between one producer side and one consumer side.
///
/// Cloning yields another handle to the same channel. The queue stays open
/// until [`BoundedQueue::close`] is called, no matter how many handles are
/// dropped; receivers drain remaining items after closing and then observe
/// completion.
#[derive(Debug)]
pub struct BoundedQueue<M> {
    tx: Sender<M>,
    rx: Receiver<M>,
    capacity: usize,
}

impl<M> BoundedQueue<M> {
    /// Creates a queue holding at most `capacity` items (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = async_channel::bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Returns a sending handle.
    #[must_use]
    pub fn sender(&self) -> Sender<M> {
        self.tx.clone()
    }

    /// Returns a receiving handle.
    #[must_use]
    pub fn receiver(&self) -> Receiver<M> {
        self.rx.clone()
    }

    /// Closes the queue. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    /// Returns true once the queue has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Returns the number of buffered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Returns true if no items are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Returns the maximum number of buffered items.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true if both handles refer to the same channel.
    #[must_use]
    pub fn same_channel(&self, other: &Self) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

impl<M> Clone for BoundedQueue<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            capacity: self.capacity,
        }
    }
}
