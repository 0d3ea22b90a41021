//! Persistent worker threads released once per render cycle.
//!
//! The render thread publishes the cycle's frame count, signals each worker's
//! `start_work` semaphore once and then waits on the shared `finished_work`
//! semaphore once per worker. Workers block on their own `start_work` between
//! cycles, so no thread is created, no memory is allocated and no lock other
//! than the semaphores is taken per buffer.
//!
//! Each worker waits only on its own start semaphore, so every worker index
//! runs exactly once per cycle.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::callbacks::{ProcessThread, RenderCallbacks};
use crate::driver::WorkIntervalJoin;
use crate::error::{HostError, HostResult};
use crate::semaphore::Semaphore;

/// State shared between the render thread and the workers
#[derive(Debug)]
struct Handoff {
    /// One per worker, indexed by worker index
    start_work: Box<[Semaphore]>,
    finished_work: Semaphore,
    /// Frames of the cycle in flight, published before `start_work` is signaled
    num_frames: AtomicUsize,
    active: AtomicBool,
}

/// Render-side half of a [`WorkerPool`].
///
/// Cheap to clone, owns no threads. Only valid while the pool it came from is
/// alive, which the host guarantees by stopping the driver before tearing the
/// pool down.
#[derive(Clone, Debug)]
pub(crate) struct Fanout {
    handoff: Arc<Handoff>,
    num_workers: usize,
}

impl Fanout {
    /// Release every worker for one cycle and block until all have finished.
    ///
    /// Returns `false` without touching the semaphores once the pool has been
    /// torn down; the caller has to process the cycle itself.
    pub(crate) fn run_cycle(&self, num_frames: usize) -> bool {
        if !self.handoff.active.load(Ordering::Acquire) {
            return false;
        }
        self.handoff.num_frames.store(num_frames, Ordering::Release);
        for start in &self.handoff.start_work[..self.num_workers] {
            start.signal();
        }
        for _ in 0..self.num_workers {
            self.handoff.finished_work.wait();
        }
        true
    }

    #[inline]
    pub(crate) fn num_workers(&self) -> usize {
        self.num_workers
    }

    #[cfg(test)]
    pub(crate) fn stats(&self) -> HandoffStats {
        HandoffStats {
            start_signals: self.handoff.start_work.iter().map(Semaphore::signals).sum(),
            start_waits: self.handoff.start_work.iter().map(Semaphore::waits).sum(),
            finished_signals: self.handoff.finished_work.signals(),
            finished_waits: self.handoff.finished_work.waits(),
        }
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HandoffStats {
    pub(crate) start_signals: u64,
    pub(crate) start_waits: u64,
    pub(crate) finished_signals: u64,
    pub(crate) finished_waits: u64,
}

/// A fixed set of worker threads.
///
/// Dropping the pool stops and joins every thread it spawned, including when
/// spawning failed halfway.
pub(crate) struct WorkerPool {
    handoff: Arc<Handoff>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` workers that call `callbacks.process` once per cycle.
    pub(crate) fn spawn(
        count: usize,
        callbacks: Arc<dyn RenderCallbacks>,
        work_interval: Option<Arc<dyn WorkIntervalJoin>>,
    ) -> HostResult<Self> {
        let mut pool = Self {
            handoff: Arc::new(Handoff {
                start_work: (0..count).map(|_| Semaphore::new(0)).collect(),
                finished_work: Semaphore::new(0),
                num_frames: AtomicUsize::new(0),
                active: AtomicBool::new(true),
            }),
            threads: Vec::with_capacity(count),
        };

        for index in 0..count {
            let handoff = pool.handoff.clone();
            let callbacks = callbacks.clone();
            let work_interval = work_interval.clone();
            let handle = thread::Builder::new()
                .name(format!("renderhost-worker-{}", index))
                .spawn(move || {
                    if let Some(interval) = work_interval {
                        if let Err(e) = interval.join_current_thread() {
                            warn!("worker {} could not join work interval: {}", index, e);
                        }
                    }
                    worker_loop(index, &handoff, callbacks.as_ref());
                })
                .map_err(|source| HostError::ThreadSpawn {
                    role: "worker",
                    source,
                })?;
            pool.threads.push(handle);
        }

        debug!("spawned {} worker threads", count);
        Ok(pool)
    }

    pub(crate) fn fanout(&self) -> Fanout {
        Fanout {
            handoff: self.handoff.clone(),
            num_workers: self.threads.len(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.threads.len()
    }

    fn teardown(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.handoff.active.store(false, Ordering::Release);
        for start in &self.handoff.start_work[..self.threads.len()] {
            start.signal();
        }
        let count = self.threads.len();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("a worker thread panicked");
            }
        }
        debug!("joined {} worker threads", count);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn worker_loop(index: usize, handoff: &Handoff, callbacks: &dyn RenderCallbacks) {
    loop {
        handoff.start_work[index].wait();
        if !handoff.active.load(Ordering::Acquire) {
            return;
        }
        let num_frames = handoff.num_frames.load(Ordering::Acquire);
        callbacks.process(ProcessThread::Worker(index), num_frames);
        handoff.finished_work.signal();
    }
}
