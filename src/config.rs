//! Host configuration
//!
//! Defines the parameters of an [`AudioHost`](crate::AudioHost). Some of them
//! can be changed while audio is running, the rest force a stop/restart.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default buffer size requested from the driver (frames)
pub const DEFAULT_BUFFER_SIZE: usize = 128;

/// Default number of worker threads
pub const DEFAULT_NUM_WORKER_THREADS: usize = 2;

/// Default number of busy threads
pub const DEFAULT_NUM_BUSY_THREADS: usize = 0;

/// Configuration for the audio host
///
/// | field | changes while running |
/// |---|---|
/// | `preferred_buffer_size` | stop/restart |
/// | `num_worker_threads` | stop/restart |
/// | `num_busy_threads` | stop/restart |
/// | `is_work_interval_on` | stop/restart |
/// | `process_in_driver_thread` | live |
/// | `minimum_load` | live |
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HostConfig {
    /// Frames per hardware buffer to ask the driver for
    pub preferred_buffer_size: usize,

    /// Worker threads the render cycle fans out to
    pub num_worker_threads: usize,

    /// Threads that only spin to keep the CPU loaded
    pub num_busy_threads: usize,

    /// Run all processing on the driver thread instead of the workers
    pub process_in_driver_thread: bool,

    /// Ask the driver to group render threads in its work interval
    pub is_work_interval_on: bool,

    /// Fraction of the buffer duration the driver thread stays busy, 0..=1
    pub minimum_load: f64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            preferred_buffer_size: DEFAULT_BUFFER_SIZE,
            num_worker_threads: DEFAULT_NUM_WORKER_THREADS,
            num_busy_threads: DEFAULT_NUM_BUSY_THREADS,
            process_in_driver_thread: true,
            is_work_interval_on: false,
            minimum_load: 0.0,
        }
    }
}

impl HostConfig {
    pub fn with_buffer_size(mut self, frames: usize) -> Self {
        self.preferred_buffer_size = frames;
        self
    }

    pub fn with_worker_threads(mut self, count: usize) -> Self {
        self.num_worker_threads = count;
        self
    }

    pub fn with_busy_threads(mut self, count: usize) -> Self {
        self.num_busy_threads = count;
        self
    }

    pub fn with_process_in_driver_thread(mut self, enabled: bool) -> Self {
        self.process_in_driver_thread = enabled;
        self
    }

    pub fn with_work_interval(mut self, on: bool) -> Self {
        self.is_work_interval_on = on;
        self
    }

    /// Set the minimum load, clamped to `0.0..=1.0`
    pub fn with_minimum_load(mut self, load: f64) -> Self {
        self.minimum_load = clamp_load(load);
        self
    }
}

/// Clamp a load fraction into `0.0..=1.0`. NaN maps to 0.
pub(crate) fn clamp_load(load: f64) -> f64 {
    if load.is_nan() {
        0.0
    } else {
        load.clamp(0.0, 1.0)
    }
}

/// Parameters that can be changed while the host renders.
///
/// Shared between the controller and the render thread; every access is a
/// single atomic load or store.
#[derive(Debug)]
pub(crate) struct LiveParams {
    process_in_driver_thread: AtomicBool,
    /// `f64` bit pattern
    minimum_load: AtomicU64,
}

impl LiveParams {
    pub(crate) fn new(process_in_driver_thread: bool, minimum_load: f64) -> Self {
        Self {
            process_in_driver_thread: AtomicBool::new(process_in_driver_thread),
            minimum_load: AtomicU64::new(clamp_load(minimum_load).to_bits()),
        }
    }

    #[inline]
    pub(crate) fn process_in_driver_thread(&self) -> bool {
        self.process_in_driver_thread.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_process_in_driver_thread(&self, enabled: bool) {
        self.process_in_driver_thread.store(enabled, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn minimum_load(&self) -> f64 {
        f64::from_bits(self.minimum_load.load(Ordering::Relaxed))
    }

    #[inline]
    pub(crate) fn set_minimum_load(&self, load: f64) {
        self.minimum_load
            .store(clamp_load(load).to_bits(), Ordering::Relaxed);
    }
}

/// Clonable handle to the live parameters of an
/// [`AudioHost`](crate::AudioHost).
///
/// Unlike the host itself (which owns a driver that may be tied to its
/// thread), this can be sent to any thread. Writes apply from the next render
/// cycle.
///
/// ```
/// use renderhost::{AudioHost, Callbacks, ManualDriver};
///
/// let callbacks = Callbacks::new(|_| {}, |_| {}, |_, _| {}, |out, _, _| out.clear());
/// let host = AudioHost::new(ManualDriver::new(48_000), callbacks);
/// let controls = host.live_controls();
///
/// std::thread::spawn(move || controls.set_minimum_load(0.5))
///     .join()
///     .unwrap();
/// assert_eq!(host.minimum_load(), 0.5);
/// ```
#[derive(Clone, Debug)]
pub struct LiveControls {
    live: Arc<LiveParams>,
}

impl LiveControls {
    pub(crate) fn new(live: Arc<LiveParams>) -> Self {
        Self { live }
    }

    pub fn process_in_driver_thread(&self) -> bool {
        self.live.process_in_driver_thread()
    }

    pub fn set_process_in_driver_thread(&self, enabled: bool) {
        self.live.set_process_in_driver_thread(enabled);
    }

    pub fn minimum_load(&self) -> f64 {
        self.live.minimum_load()
    }

    /// Clamped to `0.0..=1.0`.
    pub fn set_minimum_load(&self, load: f64) {
        self.live.set_minimum_load(load);
    }
}

/// Parameters only changed while the host is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StoppedParams {
    pub(crate) preferred_buffer_size: usize,
    pub(crate) num_worker_threads: usize,
    pub(crate) num_busy_threads: usize,
    pub(crate) is_work_interval_on: bool,
}

impl From<&HostConfig> for StoppedParams {
    fn from(config: &HostConfig) -> Self {
        Self {
            preferred_buffer_size: config.preferred_buffer_size,
            num_worker_threads: config.num_worker_threads,
            num_busy_threads: config.num_busy_threads,
            is_work_interval_on: config.is_work_interval_on,
        }
    }
}
