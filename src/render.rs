//! The realtime render entry point.

use std::hint;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::buffer::StereoBuffer;
use crate::callbacks::{ProcessThread, RenderCallbacks};
use crate::config::LiveParams;
use crate::driver::BufferError;
use crate::workers::Fanout;

/// Outcome of one render cycle, handed back to the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderStatus {
    Ok,
    /// The driver's buffer preparation failed; no callback ran
    Failed(BufferError),
}

impl RenderStatus {
    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, RenderStatus::Ok)
    }
}

/// Per-stream render state, handed to [`Driver::start`](crate::driver::Driver::start).
///
/// Built by the host on every start. Stop-required settings (worker count,
/// sample rate) are fixed for its lifetime; the live settings are read fresh
/// on every cycle.
pub struct Renderer {
    callbacks: Arc<dyn RenderCallbacks>,
    live: Arc<LiveParams>,
    fanout: Option<Fanout>,
    sample_rate: u32,
}

impl Renderer {
    pub(crate) fn new(
        callbacks: Arc<dyn RenderCallbacks>,
        live: Arc<LiveParams>,
        fanout: Option<Fanout>,
        sample_rate: u32,
    ) -> Self {
        Self {
            callbacks,
            live,
            fanout,
            sample_rate,
        }
    }

    /// Sample rate used for the minimum-load computation
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of workers cycles fan out to (0 when there is no pool)
    #[inline]
    pub fn num_workers(&self) -> usize {
        self.fanout.as_ref().map_or(0, Fanout::num_workers)
    }

    /// Run one render cycle. Called by the driver on its realtime thread.
    ///
    /// `output` is the driver's prepared buffer, or the reason it couldn't
    /// prepare one; in the latter case the cycle is reported as failed without
    /// running any callback or waking any worker.
    ///
    /// Doesn't allocate and takes no lock other than the worker semaphores.
    pub fn render(
        &self,
        output: Result<StereoBuffer<'_>, BufferError>,
        host_time: u64,
        num_frames: usize,
    ) -> RenderStatus {
        let mut output = match output {
            Ok(output) => output,
            Err(e) => return RenderStatus::Failed(e),
        };

        let start_time = Instant::now();
        self.callbacks.render_started(num_frames);

        let fanned_out = match &self.fanout {
            Some(fanout) if !self.live.process_in_driver_thread() => fanout.run_cycle(num_frames),
            _ => false,
        };
        if !fanned_out {
            self.callbacks.process(ProcessThread::Driver, num_frames);
        }

        ensure_minimum_load(
            start_time,
            num_frames,
            self.sample_rate,
            self.live.minimum_load(),
        );

        self.callbacks.render_ended(&mut output, host_time, num_frames);
        RenderStatus::Ok
    }
}

/// Spin until `minimum_load` of the buffer's nominal duration has passed since
/// `buffer_start`.
///
/// The buffer lasts `num_frames / sample_rate` seconds. Returns immediately for
/// a load of zero or less, or when that much time has already elapsed. Never
/// sleeps or yields: the point is to keep the calling thread on the CPU.
pub fn ensure_minimum_load(
    buffer_start: Instant,
    num_frames: usize,
    sample_rate: u32,
    minimum_load: f64,
) {
    if minimum_load <= 0.0 || sample_rate == 0 {
        return;
    }
    let target = load_target(num_frames, sample_rate, minimum_load);
    while buffer_start.elapsed() < target {
        hint::spin_loop();
    }
}

/// `minimum_load` of a buffer's duration, saturating at [`Duration::MAX`].
fn load_target(num_frames: usize, sample_rate: u32, minimum_load: f64) -> Duration {
    let buffer_secs = num_frames as f64 / sample_rate as f64;
    Duration::try_from_secs_f64(buffer_secs * minimum_load.min(1.0)).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::WorkerPool;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Started(usize),
        Process(ProcessThread, usize),
        Ended(u64, usize),
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Event>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<Event> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    impl RenderCallbacks for Recorder {
        fn setup(&self, _num_worker_threads: usize) {}

        fn render_started(&self, num_frames: usize) {
            self.events.lock().unwrap().push(Event::Started(num_frames));
        }

        fn process(&self, thread: ProcessThread, num_frames: usize) {
            self.events.lock().unwrap().push(Event::Process(thread, num_frames));
        }

        fn render_ended(&self, output: &mut StereoBuffer<'_>, host_time: u64, num_frames: usize) {
            output.clear();
            self.events.lock().unwrap().push(Event::Ended(host_time, num_frames));
        }
    }

    fn render(renderer: &Renderer, frames: usize, host_time: u64) -> RenderStatus {
        let mut l = vec![1.0f32; frames];
        let mut r = vec![1.0f32; frames];
        let out = StereoBuffer::new(&mut l, &mut r).unwrap();
        renderer.render(Ok(out), host_time, frames)
    }

    #[test]
    fn serial_cycle_runs_process_on_driver_thread() {
        let recorder = Arc::new(Recorder::default());
        let pool = WorkerPool::spawn(3, recorder.clone(), None).unwrap();
        let live = Arc::new(LiveParams::new(true, 0.0));
        let renderer = Renderer::new(recorder.clone(), live, Some(pool.fanout()), 48_000);

        assert!(render(&renderer, 64, 7).is_ok());
        assert_eq!(
            recorder.take(),
            vec![
                Event::Started(64),
                Event::Process(ProcessThread::Driver, 64),
                Event::Ended(7, 64),
            ]
        );
        assert_eq!(pool.fanout().stats().start_signals, 0);
    }

    #[test]
    fn parallel_cycle_fans_out_before_render_ended() {
        let recorder = Arc::new(Recorder::default());
        let pool = WorkerPool::spawn(3, recorder.clone(), None).unwrap();
        let live = Arc::new(LiveParams::new(false, 0.0));
        let renderer = Renderer::new(recorder.clone(), live, Some(pool.fanout()), 48_000);
        assert_eq!(renderer.num_workers(), 3);

        for cycle in 0..5u64 {
            assert!(render(&renderer, 128, cycle).is_ok());
            let events = recorder.take();
            assert_eq!(events.first(), Some(&Event::Started(128)));
            assert_eq!(events.last(), Some(&Event::Ended(cycle, 128)));

            let mut workers: Vec<_> = events[1..events.len() - 1]
                .iter()
                .map(|e| match e {
                    Event::Process(thread, 128) => thread.index().unwrap(),
                    other => panic!("unexpected event {:?}", other),
                })
                .collect();
            workers.sort();
            assert_eq!(workers, vec![0, 1, 2]);
        }
    }

    #[test]
    fn live_flag_switches_on_next_cycle() {
        let recorder = Arc::new(Recorder::default());
        let pool = WorkerPool::spawn(2, recorder.clone(), None).unwrap();
        let live = Arc::new(LiveParams::new(false, 0.0));
        let renderer = Renderer::new(recorder.clone(), live.clone(), Some(pool.fanout()), 48_000);

        render(&renderer, 32, 0);
        assert_eq!(recorder.take().len(), 4);

        live.set_process_in_driver_thread(true);
        render(&renderer, 32, 1);
        assert_eq!(
            recorder.take(),
            vec![
                Event::Started(32),
                Event::Process(ProcessThread::Driver, 32),
                Event::Ended(1, 32),
            ]
        );
    }

    #[test]
    fn no_pool_degrades_to_serial() {
        let recorder = Arc::new(Recorder::default());
        let live = Arc::new(LiveParams::new(false, 0.0));
        let renderer = Renderer::new(recorder.clone(), live, None, 48_000);
        assert_eq!(renderer.num_workers(), 0);

        render(&renderer, 16, 3);
        assert_eq!(
            recorder.take(),
            vec![
                Event::Started(16),
                Event::Process(ProcessThread::Driver, 16),
                Event::Ended(3, 16),
            ]
        );
    }

    #[test]
    fn renderer_outliving_its_pool_processes_serially() {
        let recorder = Arc::new(Recorder::default());
        let pool = WorkerPool::spawn(2, recorder.clone(), None).unwrap();
        let live = Arc::new(LiveParams::new(false, 0.0));
        let renderer = Renderer::new(recorder.clone(), live, Some(pool.fanout()), 48_000);
        drop(pool);

        assert!(render(&renderer, 16, 5).is_ok());
        assert_eq!(
            recorder.take(),
            vec![
                Event::Started(16),
                Event::Process(ProcessThread::Driver, 16),
                Event::Ended(5, 16),
            ]
        );
    }

    #[test]
    fn buffer_failure_skips_callbacks_and_workers() {
        let recorder = Arc::new(Recorder::default());
        let pool = WorkerPool::spawn(2, recorder.clone(), None).unwrap();
        let live = Arc::new(LiveParams::new(false, 0.0));
        let renderer = Renderer::new(recorder.clone(), live, Some(pool.fanout()), 48_000);

        let err = BufferError::TooManyFrames {
            requested: 4096,
            capacity: 1024,
        };
        assert_eq!(renderer.render(Err(err), 0, 4096), RenderStatus::Failed(err));
        assert!(recorder.take().is_empty());

        let stats = pool.fanout().stats();
        assert_eq!(stats.start_signals, 0);
        assert_eq!(stats.finished_waits, 0);
    }

    #[test]
    fn render_ended_gets_the_driver_buffer() {
        let recorder = Arc::new(Recorder::default());
        let renderer = Renderer::new(recorder, Arc::new(LiveParams::new(true, 0.0)), None, 48_000);
        let mut l = [1.0f32; 8];
        let mut r = [1.0f32; 8];
        let out = StereoBuffer::new(&mut l, &mut r).unwrap();
        renderer.render(Ok(out), 0, 8);
        assert_eq!(l, [0.0; 8]);
        assert_eq!(r, [0.0; 8]);
    }

    #[test]
    fn minimum_load_holds_the_thread() {
        // 4800 frames at 48 kHz is 100 ms, half of it is 50 ms.
        let start = Instant::now();
        ensure_minimum_load(start, 4800, 48_000, 0.5);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(50), "returned after {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(500), "overshot to {:?}", elapsed);
    }

    #[test]
    fn load_target_saturates_for_huge_buffers() {
        assert_eq!(load_target(usize::MAX, 1, 1.0), Duration::MAX);
        assert_eq!(load_target(4800, 48_000, 0.5), Duration::from_millis(50));
    }

    #[test]
    fn zero_load_returns_immediately() {
        let start = Instant::now();
        ensure_minimum_load(start, 48_000, 48_000, 0.0);
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn elapsed_buffer_returns_immediately() {
        let start = Instant::now() - Duration::from_secs(1);
        let before = Instant::now();
        ensure_minimum_load(start, 4800, 48_000, 1.0);
        assert!(before.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn renderer_reads_minimum_load_every_cycle() {
        let recorder = Arc::new(Recorder::default());
        let live = Arc::new(LiveParams::new(true, 0.0));
        let renderer = Renderer::new(recorder, live.clone(), None, 1_000);

        // 100 frames at 1 kHz is 100 ms per buffer.
        let t = Instant::now();
        render(&renderer, 100, 0);
        assert!(t.elapsed() < Duration::from_millis(50));

        live.set_minimum_load(0.5);
        let t = Instant::now();
        render(&renderer, 100, 1);
        assert!(t.elapsed() >= Duration::from_millis(50));
    }
}
