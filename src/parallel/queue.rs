//! Closeable blocking FIFO used between pipeline stages.
//!
//! A [`BlockingQueue`] is either bounded, in which case `push` waits while the
//! queue is full, or unbounded, in which case `push` never waits. `pop_blocking`
//! waits while the queue is empty.
//!
//! Shutdown never needs extra "sentinel" traffic:
//!
//! - [`BlockingQueue::close`] is the graceful end of stream. Pushes fail from
//!   then on, while consumers keep draining what is queued and then observe
//!   `Ok(None)`.
//! - [`BlockingQueue::cancel`] aborts. Queued items are dropped, every waiter on
//!   either side wakes up, and every later operation fails with
//!   [`BlocksumError::QueueClosed`].

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::error::{BlocksumError, Result};

/// Represents the operational state of the queue
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum QueueState {
    /// Items can be pushed and popped
    Normal,
    /// No more items will be pushed; remaining items can still be popped
    Closed,
    /// Aborted; nothing can be pushed or popped
    Cancelled,
}

/// Inner state of the queue, protected by a mutex
#[derive(Debug)]
struct QueueInner<T> {
    /// Queued items in push order
    queue: VecDeque<T>,
    /// Operational state of the queue
    state: QueueState,
    /// Largest length ever observed under the lock
    high_water: usize,
}

/// A thread-safe FIFO with optional capacity and close/cancel support.
#[derive(Debug)]
pub struct BlockingQueue<T> {
    /// Inner state protected by mutex
    inner: Mutex<QueueInner<T>>,
    /// Signalled when an item is pushed or the state changes
    not_empty: Condvar,
    /// Signalled when an item is popped or the state changes
    not_full: Condvar,
    /// Maximum number of queued items, `None` when unbounded
    capacity: Option<usize>,
}

#[inline]
fn queue_closed_err(msg: &str) -> BlocksumError {
    BlocksumError::QueueClosed(msg.to_string())
}

impl<T> BlockingQueue<T> {
    /// Create an empty queue holding at most `capacity` items.
    ///
    /// A capacity of zero is raised to one so that `push` can make progress.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity.max(1)))
    }

    /// Create an empty queue without a capacity limit.
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                queue: VecDeque::new(),
                state: QueueState::Normal,
                high_water: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Acquires the inner lock and maps poisoning to BlocksumError
    #[inline]
    fn acquire_lock(&self) -> Result<MutexGuard<'_, QueueInner<T>>> {
        self.inner
            .lock()
            .map_err(|e| BlocksumError::Other(e.to_string()))
    }

    #[inline]
    fn await_signal<'a>(
        &'a self,
        signal: &Condvar,
        inner: MutexGuard<'a, QueueInner<T>>,
    ) -> Result<MutexGuard<'a, QueueInner<T>>> {
        signal
            .wait(inner)
            .map_err(|e| BlocksumError::Other(e.to_string()))
    }

    #[inline]
    fn is_full(&self, inner: &QueueInner<T>) -> bool {
        match self.capacity {
            Some(capacity) => inner.queue.len() >= capacity,
            None => false,
        }
    }

    /// Append an item, waiting while the queue is full.
    ///
    /// Fails with `QueueClosed` if the queue is closed or cancelled, including
    /// while waiting for space. The rejected item is dropped.
    pub fn push(&self, item: T) -> Result<()> {
        let mut inner = self.acquire_lock()?;

        loop {
            match inner.state {
                QueueState::Cancelled => return Err(queue_closed_err("queue was cancelled")),
                QueueState::Closed => return Err(queue_closed_err("cannot push to a closed queue")),
                QueueState::Normal => {
                    if !self.is_full(&inner) {
                        break;
                    }
                    inner = self.await_signal(&self.not_full, inner)?;
                }
            }
        }

        inner.queue.push_back(item);
        inner.high_water = inner.high_water.max(inner.queue.len());
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the front item, waiting while the queue is empty.
    ///
    /// Returns `Ok(None)` once the queue is closed and drained, and
    /// `QueueClosed` if it was cancelled.
    pub fn pop_blocking(&self) -> Result<Option<T>> {
        let mut inner = self.acquire_lock()?;

        loop {
            if inner.state == QueueState::Cancelled {
                return Err(queue_closed_err("queue was cancelled"));
            }

            if let Some(item) = inner.queue.pop_front() {
                self.not_full.notify_one();
                return Ok(Some(item));
            }

            if inner.state == QueueState::Closed {
                return Ok(None);
            }

            inner = self.await_signal(&self.not_empty, inner)?;
        }
    }

    /// Remove the front item if there is one, without waiting.
    pub fn try_pop(&self) -> Result<Option<T>> {
        let mut inner = self.acquire_lock()?;

        if inner.state == QueueState::Cancelled {
            return Err(queue_closed_err("queue was cancelled"));
        }

        let item = inner.queue.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        Ok(item)
    }

    /// Mark the end of the stream.
    ///
    /// Items already queued stay available. Closing twice, or closing a
    /// cancelled queue, is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.acquire_lock()?;

        if inner.state == QueueState::Normal {
            inner.state = QueueState::Closed;
        }

        self.not_empty.notify_all();
        self.not_full.notify_all();
        Ok(())
    }

    /// Abort the queue and hand back whatever was still queued.
    pub fn cancel_and_drain(&self) -> Result<Vec<T>> {
        let mut inner = self.acquire_lock()?;

        inner.state = QueueState::Cancelled;
        let pending: Vec<T> = inner.queue.drain(..).collect();

        self.not_empty.notify_all();
        self.not_full.notify_all();
        Ok(pending)
    }

    /// Abort the queue, dropping queued items. Returns how many were dropped.
    pub fn cancel(&self) -> Result<usize> {
        // Items are dropped after the lock is released
        let pending = self.cancel_and_drain()?;
        Ok(pending.len())
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> Result<bool> {
        let inner = self.acquire_lock()?;
        Ok(inner.queue.is_empty())
    }

    /// Get the number of queued items
    pub fn len(&self) -> Result<usize> {
        let inner = self.acquire_lock()?;
        Ok(inner.queue.len())
    }

    /// Maximum number of items, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Get the current state of the queue
    pub fn state(&self) -> Result<QueueState> {
        let inner = self.acquire_lock()?;
        Ok(inner.state)
    }

    /// Largest number of items ever queued at once
    pub fn high_water_mark(&self) -> Result<usize> {
        let inner = self.acquire_lock()?;
        Ok(inner.high_water)
    }
}

/// Something that can be aborted to release every thread waiting on it.
pub trait Cancellable: Send + Sync {
    /// Wake all waiters and make further operations fail.
    fn cancel(&self) -> Result<()>;
}

impl<T: Send> Cancellable for BlockingQueue<T> {
    fn cancel(&self) -> Result<()> {
        BlockingQueue::cancel(self).map(|_| ())
    }
}
