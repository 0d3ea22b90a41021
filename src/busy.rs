//! Busy threads: spin to keep the CPU loaded, independent of the render cadence.

use std::hint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::{HostError, HostResult};

/// A set of threads that do nothing but spin while active.
///
/// They never touch the render semaphores. Dropping the pool clears the
/// active flag and joins every thread.
pub(crate) struct BusyPool {
    active: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl BusyPool {
    pub(crate) fn spawn(count: usize) -> HostResult<Self> {
        let mut pool = Self {
            active: Arc::new(AtomicBool::new(true)),
            threads: Vec::with_capacity(count),
        };

        for index in 0..count {
            let active = pool.active.clone();
            let handle = thread::Builder::new()
                .name(format!("renderhost-busy-{}", index))
                .spawn(move || {
                    while active.load(Ordering::Relaxed) {
                        hint::spin_loop();
                    }
                })
                .map_err(|source| HostError::ThreadSpawn {
                    role: "busy",
                    source,
                })?;
            pool.threads.push(handle);
        }

        debug!("spawned {} busy threads", count);
        Ok(pool)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.threads.len()
    }

    fn teardown(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.active.store(false, Ordering::Relaxed);
        let count = self.threads.len();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("a busy thread panicked");
            }
        }
        debug!("joined {} busy threads", count);
    }
}

impl Drop for BusyPool {
    fn drop(&mut self) {
        self.teardown();
    }
}
