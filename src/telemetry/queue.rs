use std::collections::VecDeque;
use std::sync::Mutex;

/// A bounded in-memory queue drained wholesale on flush.
///
/// When the queue is full, new items are dropped (and counted) instead of growing the queue:
/// delivery problems must never turn into unbounded memory growth.
#[derive(Debug)]
pub(crate) struct BoundedQueue<T> {
    capacity: usize,
    queue: Mutex<VecDeque<T>>,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> BoundedQueue<T> {
        BoundedQueue {
            capacity,
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns `false` if the queue was full and the item was dropped.
    pub fn push(&self, item: T) -> bool {
        let mut queue = self.queue.lock().unwrap();
        if queue.len() >= self.capacity {
            return false;
        }
        queue.push_back(item);
        true
    }

    /// Take everything currently queued.
    pub fn drain(&self) -> Vec<T> {
        let mut queue = self.queue.lock().unwrap();
        queue.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}
