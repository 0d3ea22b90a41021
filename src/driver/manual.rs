//! A driver whose render cycles are triggered by the caller.
//!
//! Useful for tests, benchmarks and offline runs where no audio device is
//! available. The renderer is invoked synchronously on whichever thread calls
//! [`ManualDriverHandle::render`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::buffer::StereoBuffer;
use crate::driver::{BufferError, Driver, DriverError, StreamRequest};
use crate::render::{RenderStatus, Renderer};

struct ManualState {
    renderer: Option<Renderer>,
    buffer_size: usize,
    last_request: Option<StreamRequest>,
    starts: usize,
    stops: usize,
    fail_next_start: bool,
    /// Frames rendered since creation, reported as host time
    host_time: u64,
    left: Vec<f32>,
    right: Vec<f32>,
}

/// In-process [`Driver`] without a device.
///
/// Keep a [`ManualDriverHandle`] around to run cycles after the driver has
/// been moved into a host.
///
/// ```
/// use renderhost::{AudioHost, Callbacks, HostConfig, ManualDriver};
///
/// let driver = ManualDriver::new(48_000);
/// let handle = driver.handle();
/// let callbacks = Callbacks::new(|_| {}, |_| {}, |_, _| {}, |out, _, _| out.clear());
/// let mut host = AudioHost::with_config(driver, callbacks, HostConfig::default()).unwrap();
///
/// host.start().unwrap();
/// assert!(handle.render(128).unwrap().is_ok());
/// host.stop();
/// assert!(handle.render(128).is_none());
/// ```
pub struct ManualDriver {
    sample_rate: u32,
    state: Arc<Mutex<ManualState>>,
}

/// Clonable remote control for a [`ManualDriver`].
#[derive(Clone)]
pub struct ManualDriverHandle {
    state: Arc<Mutex<ManualState>>,
}

fn lock(state: &Mutex<ManualState>) -> MutexGuard<'_, ManualState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ManualDriver {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            state: Arc::new(Mutex::new(ManualState {
                renderer: None,
                buffer_size: 0,
                last_request: None,
                starts: 0,
                stops: 0,
                fail_next_start: false,
                host_time: 0,
                left: Vec::new(),
                right: Vec::new(),
            })),
        }
    }

    pub fn handle(&self) -> ManualDriverHandle {
        ManualDriverHandle {
            state: self.state.clone(),
        }
    }
}

impl Driver for ManualDriver {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn buffer_size(&self) -> usize {
        lock(&self.state).buffer_size
    }

    fn start(&mut self, request: StreamRequest, renderer: Renderer) -> Result<(), DriverError> {
        let mut st = lock(&self.state);
        if st.fail_next_start {
            st.fail_next_start = false;
            return Err(DriverError::Unavailable("start refused on request".into()));
        }
        st.buffer_size = request.buffer_size;
        st.left.resize(request.buffer_size, 0.0);
        st.right.resize(request.buffer_size, 0.0);
        st.last_request = Some(request);
        st.renderer = Some(renderer);
        st.starts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        let mut st = lock(&self.state);
        if st.renderer.take().is_some() {
            st.stops += 1;
        }
    }
}

impl ManualDriverHandle {
    /// Run one cycle of `num_frames`. Returns `None` when the driver isn't
    /// running.
    ///
    /// Holds the driver lock for the whole cycle, so a concurrent
    /// [`Driver::stop`] waits for the cycle to finish.
    pub fn render(&self, num_frames: usize) -> Option<RenderStatus> {
        let mut guard = lock(&self.state);
        let st = &mut *guard;
        let renderer = st.renderer.as_ref()?;

        if st.left.len() < num_frames {
            st.left.resize(num_frames, 0.0);
            st.right.resize(num_frames, 0.0);
        }
        let output = StereoBuffer::new(&mut st.left[..num_frames], &mut st.right[..num_frames])
            .ok_or(BufferError::ChannelMismatch(1));
        let status = renderer.render(output, st.host_time, num_frames);
        st.host_time += num_frames as u64;
        Some(status)
    }

    /// Run one cycle in which the driver failed to prepare its buffer.
    pub fn render_failure(&self, error: BufferError) -> Option<RenderStatus> {
        let st = lock(&self.state);
        let renderer = st.renderer.as_ref()?;
        Some(renderer.render(Err(error), st.host_time, 0))
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).renderer.is_some()
    }

    /// Number of successful starts so far
    pub fn starts(&self) -> usize {
        lock(&self.state).starts
    }

    /// Number of stops of a running stream so far
    pub fn stops(&self) -> usize {
        lock(&self.state).stops
    }

    /// The request of the most recent successful start
    pub fn last_request(&self) -> Option<StreamRequest> {
        lock(&self.state).last_request
    }

    /// Workers of the running renderer, `None` when stopped
    pub fn num_workers(&self) -> Option<usize> {
        lock(&self.state).renderer.as_ref().map(Renderer::num_workers)
    }

    /// Make the next [`Driver::start`] fail with [`DriverError::Unavailable`].
    pub fn fail_next_start(&self) {
        lock(&self.state).fail_next_start = true;
    }

    /// Copy of the left/right output of the last cycle.
    pub fn last_output(&self, num_frames: usize) -> (Vec<f32>, Vec<f32>) {
        let st = lock(&self.state);
        let n = num_frames.min(st.left.len());
        (st.left[..n].to_vec(), st.right[..n].to_vec())
    }
}
