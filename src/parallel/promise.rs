//! One-shot result handoff between a worker and a waiter.
//!
//! [`promise`] returns a connected pair: the [`Promise`] is moved into the task
//! and fulfilled exactly once, the [`PendingResult`] is handed to whoever needs
//! the value and waited on exactly once. Both sides consume themselves, so
//! double fulfilment and double consumption are ruled out by the type system.
//!
//! If a `Promise` is dropped without being fulfilled (the task was discarded
//! or its thread unwound), the pending side resolves with
//! [`BlocksumError::QueueClosed`] instead of waiting forever.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::error::{BlocksumError, Result};

/// State of the shared slot
#[derive(Debug)]
enum PromiseState<T> {
    /// No value has been provided yet
    Waiting,
    /// The task finished, successfully or not
    Fulfilled(Result<T>),
    /// The producing side went away without a value
    Abandoned,
    /// The value has been taken by the waiter
    Consumed,
}

#[derive(Debug)]
struct Shared<T> {
    state: Mutex<PromiseState<T>>,
    signal: Condvar,
}

impl<T> Shared<T> {
    fn lock(&self) -> Result<MutexGuard<'_, PromiseState<T>>> {
        self.state
            .lock()
            .map_err(|e| BlocksumError::Other(format!("Failed to lock promise state: {}", e)))
    }

    fn settle(&self, outcome: PromiseState<T>) -> Result<()> {
        let mut state = self.lock()?;
        match *state {
            PromiseState::Waiting => {
                *state = outcome;
                self.signal.notify_all();
                Ok(())
            }
            _ => Err(BlocksumError::Other("Promise already settled".to_string())),
        }
    }
}

/// Create a connected promise / pending result pair.
pub fn promise<T>() -> (Promise<T>, PendingResult<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(PromiseState::Waiting),
        signal: Condvar::new(),
    });
    (
        Promise {
            shared: Some(Arc::clone(&shared)),
        },
        PendingResult { shared },
    )
}

/// Producer side: fulfilled once with the task's outcome.
pub struct Promise<T> {
    // Taken on fulfilment so that Drop knows the value was delivered
    shared: Option<Arc<Shared<T>>>,
}

impl<T> Promise<T> {
    /// Deliver the task outcome to the waiter.
    pub fn fulfill(mut self, outcome: Result<T>) -> Result<()> {
        match self.shared.take() {
            Some(shared) => shared.settle(PromiseState::Fulfilled(outcome)),
            None => Err(BlocksumError::Other("Promise already settled".to_string())),
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            let _ = shared.settle(PromiseState::Abandoned);
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("settled", &self.shared.is_none())
            .finish()
    }
}

/// Consumer side: resolves to the task's `Result` exactly once.
pub struct PendingResult<T> {
    shared: Arc<Shared<T>>,
}

impl<T> PendingResult<T> {
    /// Build an already-resolved handle.
    pub fn ready(outcome: Result<T>) -> Self {
        let (promise, pending) = promise();
        // A fresh pair cannot already be settled
        let _ = promise.fulfill(outcome);
        pending
    }

    /// Block until the task has finished and return its outcome.
    pub fn wait(self) -> Result<T> {
        let mut state = self.shared.lock()?;

        while let PromiseState::Waiting = *state {
            state = self
                .shared
                .signal
                .wait(state)
                .map_err(|e| BlocksumError::Other(format!("Condvar wait failed: {}", e)))?;
        }

        let taken = std::mem::replace(&mut *state, PromiseState::Consumed);
        match taken {
            PromiseState::Fulfilled(outcome) => outcome,
            PromiseState::Abandoned => Err(BlocksumError::QueueClosed(
                "task was dropped before it produced a result".to_string(),
            )),
            PromiseState::Consumed | PromiseState::Waiting => Err(BlocksumError::Other(
                "Promise in invalid state".to_string(),
            )),
        }
    }

    /// Check whether waiting would return immediately.
    pub fn is_ready(&self) -> Result<bool> {
        let state = self.shared.lock()?;
        Ok(!matches!(*state, PromiseState::Waiting))
    }
}

impl<T> fmt::Debug for PendingResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ready = self.is_ready().unwrap_or(false);
        f.debug_struct("PendingResult").field("ready", &ready).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fulfill_then_wait() {
        let (promise, pending) = promise();
        assert!(!pending.is_ready().unwrap());
        promise.fulfill(Ok(42u32)).unwrap();
        assert!(pending.is_ready().unwrap());
        assert_eq!(pending.wait().unwrap(), 42);
    }

    #[test]
    fn test_wait_across_threads() {
        let (promise, pending) = promise();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            promise.fulfill(Ok(7u32)).unwrap();
        });

        assert_eq!(pending.wait().unwrap(), 7);
        handle.join().unwrap();
    }

    #[test]
    fn test_error_is_delivered() {
        let (promise, pending) = promise::<u32>();
        promise
            .fulfill(Err(BlocksumError::Task("bad block".to_string())))
            .unwrap();

        match pending.wait() {
            Err(BlocksumError::Task(msg)) => assert_eq!(msg, "bad block"),
            other => panic!("Expected Task error, got {:?}", other),
        }
    }

    #[test]
    fn test_dropped_promise_releases_waiter() {
        let (promise, pending) = promise::<u32>();

        let handle = thread::spawn(move || pending.wait());
        thread::sleep(Duration::from_millis(10));
        drop(promise);

        assert!(matches!(
            handle.join().unwrap(),
            Err(BlocksumError::QueueClosed(_))
        ));
    }

    #[test]
    fn test_ready_handle() {
        let pending = PendingResult::ready(Ok(5u32));
        assert!(pending.is_ready().unwrap());
        assert_eq!(pending.wait().unwrap(), 5);
    }
}
