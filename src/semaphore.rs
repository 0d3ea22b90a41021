//! Counting semaphore used for the render/worker handoff.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

/// A blocking counter.
///
/// [`signal`](Self::signal) increments the count and wakes at most one
/// waiter, [`wait`](Self::wait) blocks until the count is positive and then
/// decrements it. Signals issued before anyone waits are not lost.
#[derive(Debug)]
pub struct Semaphore {
    count: Mutex<usize>,
    available: Condvar,
    signals: AtomicU64,
    waits: AtomicU64,
}

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            available: Condvar::new(),
            signals: AtomicU64::new(0),
            waits: AtomicU64::new(0),
        }
    }

    /// Increment the count and wake one blocked waiter, if any.
    pub fn signal(&self) {
        // The count is a plain integer, a poisoned guard still holds a valid value.
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count += 1;
        self.signals.fetch_add(1, Ordering::Relaxed);
        drop(count);
        self.available.notify_one();
    }

    /// Block until the count is positive, then decrement it.
    pub fn wait(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count == 0 {
            count = self
                .available
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *count -= 1;
        self.waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Total number of [`signal`](Self::signal) calls so far.
    #[inline]
    pub fn signals(&self) -> u64 {
        self.signals.load(Ordering::Relaxed)
    }

    /// Total number of completed [`wait`](Self::wait) calls so far.
    #[inline]
    pub fn waits(&self) -> u64 {
        self.waits.load(Ordering::Relaxed)
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn signal_before_wait_is_not_lost() {
        let sem = Semaphore::new(0);
        sem.signal();
        sem.signal();
        sem.wait();
        sem.wait();
        assert_eq!(sem.signals(), 2);
        assert_eq!(sem.waits(), 2);
    }

    #[test]
    fn initial_count_is_available() {
        let sem = Semaphore::new(3);
        for _ in 0..3 {
            sem.wait();
        }
        assert_eq!(sem.signals(), 0);
        assert_eq!(sem.waits(), 3);
    }

    #[test]
    fn wakes_blocked_waiters() {
        let sem = Arc::new(Semaphore::new(0));
        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let sem = sem.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        sem.wait();
                    }
                })
            })
            .collect();

        let signaler = {
            let sem = sem.clone();
            thread::spawn(move || {
                for _ in 0..800 {
                    sem.signal();
                }
            })
        };

        signaler.join().unwrap();
        for w in waiters {
            w.join().unwrap();
        }
        assert_eq!(sem.signals(), 800);
        assert_eq!(sem.waits(), 800);
    }
}
