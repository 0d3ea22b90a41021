//! The audio host: lifecycle and configuration controller.

use std::sync::Arc;

use tracing::{debug, info};

use crate::busy::BusyPool;
use crate::callbacks::RenderCallbacks;
use crate::config::{HostConfig, LiveControls, LiveParams, StoppedParams};
use crate::driver::{Driver, StreamRequest};
use crate::error::{HostError, HostResult};
use crate::render::Renderer;
use crate::workers::WorkerPool;

/// Threads that exist only while the host is started
struct Running {
    workers: Option<WorkerPool>,
    busy: Option<BusyPool>,
}

/// Owns a [`Driver`], a worker pool and a busy pool, and runs the
/// [`RenderCallbacks`] on every hardware buffer.
///
/// # Configuration while running
///
/// `process_in_driver_thread` and `minimum_load` are live: their setters take
/// `&self`, never touch the driver and apply from the next cycle on. Use
/// [`live_controls`](Self::live_controls) to change them from another thread.
///
/// The worker count, busy count, buffer size and work-interval flag need new
/// threads or a new stream. Their setters take `&mut self`, stop the host,
/// apply the change and start it again if it was running.
///
/// # Example
///
/// ```
/// use renderhost::{AudioHost, Callbacks, HostConfig, ManualDriver};
///
/// let driver = ManualDriver::new(48_000);
/// let cycles = driver.handle();
/// let callbacks = Callbacks::new(
///     |_workers| {},
///     |_frames| {},
///     |_thread, _frames| {},
///     |output, _host_time, _frames| output.clear(),
/// );
///
/// let config = HostConfig::default()
///     .with_worker_threads(4)
///     .with_process_in_driver_thread(false);
/// let mut host = AudioHost::with_config(driver, callbacks, config).unwrap();
/// host.start().unwrap();
///
/// cycles.render(128);
/// host.set_minimum_load(0.3);
/// host.set_num_worker_threads(2).unwrap();
/// cycles.render(128);
///
/// host.stop();
/// ```
pub struct AudioHost<D: Driver> {
    driver: D,
    callbacks: Arc<dyn RenderCallbacks>,
    live: Arc<LiveParams>,
    params: StoppedParams,
    running: Option<Running>,
}

impl<D: Driver> AudioHost<D> {
    /// Create a stopped host with the default configuration.
    pub fn new<C: RenderCallbacks>(driver: D, callbacks: C) -> Self {
        Self::build(driver, Arc::new(callbacks), &HostConfig::default())
    }

    /// Create a stopped host with the given configuration.
    pub fn with_config<C: RenderCallbacks>(
        driver: D,
        callbacks: C,
        config: HostConfig,
    ) -> HostResult<Self> {
        validate_buffer_size(config.preferred_buffer_size)?;
        Ok(Self::build(driver, Arc::new(callbacks), &config))
    }

    fn build(driver: D, callbacks: Arc<dyn RenderCallbacks>, config: &HostConfig) -> Self {
        Self {
            driver,
            callbacks,
            live: Arc::new(LiveParams::new(
                config.process_in_driver_thread,
                config.minimum_load,
            )),
            params: StoppedParams::from(config),
            running: None,
        }
    }

    /// The driver, for querying hardware parameters.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable driver access. Stopping or starting the driver behind the
    /// host's back is not supported.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Handle for changing the live parameters from other threads.
    pub fn live_controls(&self) -> LiveControls {
        LiveControls::new(self.live.clone())
    }

    pub fn is_started(&self) -> bool {
        self.running.is_some()
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> HostConfig {
        HostConfig {
            preferred_buffer_size: self.params.preferred_buffer_size,
            num_worker_threads: self.params.num_worker_threads,
            num_busy_threads: self.params.num_busy_threads,
            process_in_driver_thread: self.live.process_in_driver_thread(),
            is_work_interval_on: self.params.is_work_interval_on,
            minimum_load: self.live.minimum_load(),
        }
    }

    /// Spawn the pools and start the driver. Does nothing if already started.
    ///
    /// Busy threads come up first, then workers, then
    /// [`setup`](RenderCallbacks::setup) runs with the worker count, then the
    /// driver starts. On failure every thread spawned so far is joined and the
    /// host stays stopped.
    pub fn start(&mut self) -> HostResult<()> {
        if self.running.is_some() {
            return Ok(());
        }
        let params = self.params;

        let busy = match params.num_busy_threads {
            0 => None,
            n => Some(BusyPool::spawn(n)?),
        };

        let work_interval = if params.is_work_interval_on {
            self.driver.work_interval_join()
        } else {
            None
        };
        let workers = match params.num_worker_threads {
            0 => None,
            n => Some(WorkerPool::spawn(n, self.callbacks.clone(), work_interval)?),
        };

        self.callbacks.setup(params.num_worker_threads);

        let renderer = Renderer::new(
            self.callbacks.clone(),
            self.live.clone(),
            workers.as_ref().map(WorkerPool::fanout),
            self.driver.sample_rate(),
        );
        let request = StreamRequest {
            buffer_size: params.preferred_buffer_size,
            work_interval: params.is_work_interval_on,
        };
        // Pools are dropped (and joined) if this fails.
        self.driver.start(request, renderer)?;

        info!(
            "audio host started: {} workers, {} busy threads, {} frames at {} Hz",
            workers.as_ref().map_or(0, WorkerPool::len),
            busy.as_ref().map_or(0, BusyPool::len),
            params.preferred_buffer_size,
            self.driver.sample_rate()
        );
        self.running = Some(Running { workers, busy });
        Ok(())
    }

    /// Stop the driver, then join workers and busy threads. Does nothing if
    /// not started.
    pub fn stop(&mut self) {
        let running = match self.running.take() {
            Some(running) => running,
            None => return,
        };
        // No render cycle can be in flight after this.
        self.driver.stop();

        let Running { workers, busy } = running;
        drop(workers);
        drop(busy);
        info!("audio host stopped");
    }

    /// Run `f` with the host stopped, restarting it afterwards if it was
    /// running.
    fn while_stopped<F>(&mut self, f: F) -> HostResult<()>
    where
        F: FnOnce(&mut StoppedParams),
    {
        let was_started = self.is_started();
        if was_started {
            self.stop();
        }
        f(&mut self.params);
        if was_started {
            self.start()?;
        }
        Ok(())
    }

    pub fn preferred_buffer_size(&self) -> usize {
        self.params.preferred_buffer_size
    }

    /// Requires a restart. Zero frames is rejected and leaves the host as it
    /// was.
    pub fn set_preferred_buffer_size(&mut self, frames: usize) -> HostResult<()> {
        validate_buffer_size(frames)?;
        debug!("preferred buffer size -> {}", frames);
        self.while_stopped(|p| p.preferred_buffer_size = frames)
    }

    pub fn num_worker_threads(&self) -> usize {
        self.params.num_worker_threads
    }

    /// Requires a restart. With zero workers all processing runs on the
    /// driver thread.
    pub fn set_num_worker_threads(&mut self, count: usize) -> HostResult<()> {
        debug!("worker threads -> {}", count);
        self.while_stopped(|p| p.num_worker_threads = count)
    }

    pub fn num_busy_threads(&self) -> usize {
        self.params.num_busy_threads
    }

    /// Requires a restart.
    pub fn set_num_busy_threads(&mut self, count: usize) -> HostResult<()> {
        debug!("busy threads -> {}", count);
        self.while_stopped(|p| p.num_busy_threads = count)
    }

    pub fn is_work_interval_on(&self) -> bool {
        self.params.is_work_interval_on
    }

    /// Requires a restart.
    pub fn set_is_work_interval_on(&mut self, on: bool) -> HostResult<()> {
        debug!("work interval -> {}", on);
        self.while_stopped(|p| p.is_work_interval_on = on)
    }

    pub fn process_in_driver_thread(&self) -> bool {
        self.live.process_in_driver_thread()
    }

    /// Live: applies from the next render cycle without stopping.
    pub fn set_process_in_driver_thread(&self, enabled: bool) {
        self.live.set_process_in_driver_thread(enabled);
    }

    pub fn minimum_load(&self) -> f64 {
        self.live.minimum_load()
    }

    /// Live: applies from the next render cycle without stopping. Clamped to
    /// `0.0..=1.0`.
    pub fn set_minimum_load(&self, load: f64) {
        self.live.set_minimum_load(load);
    }
}

impl<D: Driver> Drop for AudioHost<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn validate_buffer_size(frames: usize) -> HostResult<()> {
    if frames == 0 {
        return Err(HostError::InvalidBufferSize(frames));
    }
    Ok(())
}
