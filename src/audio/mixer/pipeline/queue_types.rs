// Queue types connecting the capture side of the pipeline to the playback side
//
// The transfer queue is the only synchronization point between the capture
// loop (single producer) and the playback loop (single consumer). Both ends
// are non-blocking: a full queue rejects the block (lossy backpressure) and
// an empty queue returns nothing (underrun).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender, TryRecvError, TrySendError};
use serde::Serialize;

use crate::audio::types::AudioBlock;

/// Queue state information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueInfo {
    /// `None` for an unbounded queue
    pub capacity: Option<usize>,
    pub occupancy: usize,
    pub total_pushed: usize,
    pub total_popped: usize,
    pub total_rejected: usize,
    pub usage_percent: f32,
}

/// Thread-safe queue counters shared by producer and consumer
#[derive(Debug, Clone, Default)]
pub struct QueueTracker {
    total_pushed: Arc<AtomicUsize>,
    total_popped: Arc<AtomicUsize>,
    total_rejected: Arc<AtomicUsize>,
}

impl QueueTracker {
    fn record_pushed(&self) {
        self.total_pushed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_popped(&self, count: usize) {
        self.total_popped.fetch_add(count, Ordering::Relaxed);
    }

    fn record_rejected(&self) {
        self.total_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_pushed(&self) -> usize {
        self.total_pushed.load(Ordering::Relaxed)
    }

    pub fn total_popped(&self) -> usize {
        self.total_popped.load(Ordering::Relaxed)
    }

    pub fn total_rejected(&self) -> usize {
        self.total_rejected.load(Ordering::Relaxed)
    }
}

/// Bounded (or unbounded) FIFO carrying equalized blocks to playback
pub struct TransferQueue<T = AudioBlock> {
    sender: Sender<T>,
    receiver: Receiver<T>,
    capacity: Option<usize>,
    tracker: QueueTracker,
}

impl<T> TransferQueue<T> {
    /// Capacity 0 means unbounded
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            Self::unbounded()
        } else {
            Self::bounded(capacity)
        }
    }

    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = channel::bounded(capacity);
        Self {
            sender,
            receiver,
            capacity: Some(capacity),
            tracker: QueueTracker::default(),
        }
    }

    pub fn unbounded() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            sender,
            receiver,
            capacity: None,
            tracker: QueueTracker::default(),
        }
    }

    /// Never blocks. Returns false and discards `item` when the queue is full;
    /// the queue contents are left untouched in that case.
    pub fn try_push(&self, item: T) -> bool {
        match self.sender.try_send(item) {
            Ok(()) => {
                self.tracker.record_pushed();
                true
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.tracker.record_rejected();
                false
            }
        }
    }

    /// Never blocks. `None` on underrun.
    pub fn try_pop(&self) -> Option<T> {
        match self.receiver.try_recv() {
            Ok(item) => {
                self.tracker.record_popped(1);
                Some(item)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Discard everything currently queued, returning how many items went
    pub fn clear(&self) -> usize {
        let discarded = self.receiver.try_iter().count();
        self.tracker.record_popped(discarded);
        discarded
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.sender.is_full()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn tracker(&self) -> &QueueTracker {
        &self.tracker
    }

    pub fn get_queue_info(&self) -> QueueInfo {
        let occupancy = self.len();
        let usage_percent = match self.capacity {
            Some(capacity) => (occupancy as f32 / capacity as f32) * 100.0,
            None => 0.0,
        };

        QueueInfo {
            capacity: self.capacity,
            occupancy,
            total_pushed: self.tracker.total_pushed(),
            total_popped: self.tracker.total_popped(),
            total_rejected: self.tracker.total_rejected(),
            usage_percent,
        }
    }
}

// Manual impl: cloning the handles must not require `T: Clone`
impl<T> Clone for TransferQueue<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            capacity: self.capacity,
            tracker: self.tracker.clone(),
        }
    }
}

impl<T> std::fmt::Debug for TransferQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
