//! Lifecycle callbacks invoked by the host.

use crate::buffer::StereoBuffer;

/// The thread a [`RenderCallbacks::process`] call runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessThread {
    /// The driver's realtime thread, processing the whole cycle by itself
    Driver,
    /// Pool worker with a stable 0-based index
    Worker(usize),
}

impl ProcessThread {
    /// Worker index, or `None` for the driver thread.
    #[inline]
    pub fn index(self) -> Option<usize> {
        match self {
            ProcessThread::Driver => None,
            ProcessThread::Worker(i) => Some(i),
        }
    }
}

/// The four operations an embedding application supplies to the host.
///
/// Everything except [`setup`](Self::setup) runs on realtime threads and must
/// not block, panic or allocate. `process` is called concurrently from every
/// worker, so per-thread state belongs in memory sized during `setup`.
///
/// Per render cycle the order is `render_started`, one `process` per worker
/// (or one on the driver thread), then `render_ended`. All `process` calls of
/// a cycle have returned before `render_ended` runs.
pub trait RenderCallbacks: Send + Sync + 'static {
    /// Called on every host start with the number of worker threads, before
    /// the first cycle.
    fn setup(&self, num_worker_threads: usize);

    /// Called on the driver thread at the beginning of each cycle.
    fn render_started(&self, num_frames: usize);

    /// Process this thread's share of the cycle.
    fn process(&self, thread: ProcessThread, num_frames: usize);

    /// Called on the driver thread once processing is done, with the
    /// hardware output buffer and the cycle's host time.
    fn render_ended(&self, output: &mut StereoBuffer<'_>, host_time: u64, num_frames: usize);
}

/// [`RenderCallbacks`] built from four closures.
///
/// ```
/// use renderhost::{Callbacks, ProcessThread};
///
/// let callbacks = Callbacks::new(
///     |workers| println!("sizing scratch for {} workers", workers),
///     |_frames| {},
///     |_thread: ProcessThread, _frames| {},
///     |output, _host_time, _frames| output.clear(),
/// );
/// # let _ = callbacks;
/// ```
pub struct Callbacks<S, R, P, E> {
    setup: S,
    render_started: R,
    process: P,
    render_ended: E,
}

impl<S, R, P, E> Callbacks<S, R, P, E>
where
    S: Fn(usize) + Send + Sync + 'static,
    R: Fn(usize) + Send + Sync + 'static,
    P: Fn(ProcessThread, usize) + Send + Sync + 'static,
    E: Fn(&mut StereoBuffer<'_>, u64, usize) + Send + Sync + 'static,
{
    pub fn new(setup: S, render_started: R, process: P, render_ended: E) -> Self {
        Self {
            setup,
            render_started,
            process,
            render_ended,
        }
    }
}

impl<S, R, P, E> RenderCallbacks for Callbacks<S, R, P, E>
where
    S: Fn(usize) + Send + Sync + 'static,
    R: Fn(usize) + Send + Sync + 'static,
    P: Fn(ProcessThread, usize) + Send + Sync + 'static,
    E: Fn(&mut StereoBuffer<'_>, u64, usize) + Send + Sync + 'static,
{
    #[inline]
    fn setup(&self, num_worker_threads: usize) {
        (self.setup)(num_worker_threads)
    }

    #[inline]
    fn render_started(&self, num_frames: usize) {
        (self.render_started)(num_frames)
    }

    #[inline]
    fn process(&self, thread: ProcessThread, num_frames: usize) {
        (self.process)(thread, num_frames)
    }

    #[inline]
    fn render_ended(&self, output: &mut StereoBuffer<'_>, host_time: u64, num_frames: usize) {
        (self.render_ended)(output, host_time, num_frames)
    }
}
